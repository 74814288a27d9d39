//! Sub-configuration structs with their defaults.

use crate::action::Action;
use crate::error::ActionErrorKind;
use crate::pipeline::CheckKind;
use crate::types::Sorting;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::options::Mode;

/// Defaults for batches started from the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Rename preset used when none is given
    pub mode: Mode,

    /// Group numbering order
    pub sorting: Sorting,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Group,
            sorting: Sorting::Date,
        }
    }
}

/// Cooperative scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Work time before yielding to the runtime, in milliseconds
    pub slice_ms: u64,

    /// Delay before resuming after a yield (0 = plain yield)
    pub resume_delay_ms: u64,

    /// How often a running command checks for pause/cancel
    pub pause_poll_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slice_ms: 50,
            resume_delay_ms: 0,
            pause_poll_ms: 100,
        }
    }
}

impl SchedulerConfig {
    pub fn slice(&self) -> Duration {
        Duration::from_millis(self.slice_ms)
    }

    pub fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }

    pub fn pause_poll(&self) -> Duration {
        Duration::from_millis(self.pause_poll_ms)
    }
}

/// External programs used by the check actions.
///
/// Each tool is a program followed by fixed leading arguments. The program
/// path may start with `~`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Raw image converter, called with the raw file
    pub convert_raw: Vec<String>,

    /// Video recoder, called with the video file
    pub recode_video: Vec<String>,

    /// Lossless auto-rotation, called with the image
    pub rotate: Vec<String>,

    /// Panorama/HDR assembly, called with `-p|-h -o <output> <members...>`
    pub postprocess: Vec<String>,

    /// Metadata writer used by the default tag store
    pub exiftool: String,

    /// Prefix applied to every tool invocation (priority and process group)
    pub wrapper: Vec<String>,

    /// Keyword marking panorama source images
    pub panorama_tag: String,

    /// Keyword marking HDR source images
    pub hdr_tag: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            convert_raw: vec!["/usr/bin/convert-raw".to_string()],
            recode_video: vec!["/usr/bin/recodevideos".to_string()],
            rotate: vec!["/usr/bin/jhead".to_string(), "-autorot".to_string()],
            postprocess: vec!["/usr/bin/postprocess-photo".to_string()],
            exiftool: "exiftool".to_string(),
            wrapper: ["nice", "-n", "10", "ionice", "-c", "3", "setsid", "--wait"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            panorama_tag: "Panorama".to_string(),
            hdr_tag: "HDR".to_string(),
        }
    }
}

impl ToolsConfig {
    /// Expand `~` in the program of a tool command line.
    pub fn expand(command: &[String]) -> Vec<String> {
        command
            .iter()
            .enumerate()
            .map(|(i, part)| {
                if i == 0 {
                    shellexpand::tilde(part).into_owned()
                } else {
                    part.clone()
                }
            })
            .collect()
    }
}

/// A check/action/error combination whose failure aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FatalRule {
    pub check: CheckKind,

    /// Restrict the rule to one action; any action when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,

    /// Restrict the rule to one kind of failure; any failure when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionErrorKind>,
}

/// Check pipeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Failures matching one of these rules abort instead of being counted
    pub fatal: Vec<FatalRule>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
