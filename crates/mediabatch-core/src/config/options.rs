//! Per-run batch options and the built-in presets that produce them.

use crate::types::{Operation, Sorting};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default group pattern: everything up to an optional `(tag)` marker
/// before the final extension is the group, the rest is the index.
pub const DEFAULT_GROUP_PATTERN: &str = r"^(?P<group>.*?)(?P<index>(?:\([a-z]*\)?)?\.[^.]*)$";

/// Default base pattern: strip a trailing counter.
pub const DEFAULT_BASE_PATTERN: &str = r"^(?P<base>.*?)\s*[0-9]*$";

/// Base pattern for date naming: also strip a leading timestamp.
pub const DATE_BASE_PATTERN: &str = r"^([0-9]{2,4}\.?[0-9]{2}\.?[0-9]{2}[\s_]?[0-9]{2}[h:]?[0-9]{2}[m:]?[0-9]{2}s?|[0-9]*)\s*(?P<base>.*?)\s*[0-9]*$";

/// Default name template.
pub const DEFAULT_FORMAT: &str = "{directory:s}/{base:s}{alphacounter:s}{extension:s}";

/// Options of a single batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    pub command: Operation,

    /// Derive groups from the group pattern instead of the plain root
    pub allow_subgroups: bool,

    /// Keyword appended to every renamed file
    pub tag: Option<String>,

    /// First group number
    pub counter: u64,

    /// Destination name template
    pub format: String,

    /// Regex with a `base` capture applied to group basenames
    pub basepattern: String,

    /// Regex with `group` and `index` captures
    pub grouppattern: String,

    /// Descend into subdirectories of input directories
    pub recursive: bool,

    pub sorting: Sorting,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            command: Operation::Postprocess,
            allow_subgroups: true,
            tag: None,
            counter: 0,
            format: DEFAULT_FORMAT.to_string(),
            basepattern: DEFAULT_BASE_PATTERN.to_string(),
            grouppattern: DEFAULT_GROUP_PATTERN.to_string(),
            recursive: false,
            sorting: Sorting::Date,
        }
    }
}

/// Built-in batch presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Number panorama parts `a`, `b`, ... per group and tag them
    Panorama,
    /// Like panorama, tagged HDR
    Hdr,
    /// Number groups `001`, `002`, ...
    Group,
    /// Prefix names with the group creation time
    Date,
    /// Run the post-processing checks only
    Postprocess,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Panorama,
        Mode::Hdr,
        Mode::Group,
        Mode::Date,
        Mode::Postprocess,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Panorama => "panorama",
            Mode::Hdr => "hdr",
            Mode::Group => "group",
            Mode::Date => "date",
            Mode::Postprocess => "postprocess",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown mode '{s}'"))
    }
}

impl BatchOptions {
    /// Options for a built-in preset.
    pub fn preset(mode: Mode) -> Self {
        let defaults = Self::default();
        match mode {
            Mode::Panorama | Mode::Hdr => Self {
                command: Operation::Rename,
                allow_subgroups: false,
                tag: Some(if mode == Mode::Panorama { "Panorama" } else { "HDR" }.to_string()),
                counter: 0,
                format: DEFAULT_FORMAT.to_string(),
                ..defaults
            },
            Mode::Group => Self {
                command: Operation::Rename,
                allow_subgroups: true,
                counter: 1,
                format: "{directory:s}/{base:s} {counter:03d}{extension:s}".to_string(),
                ..defaults
            },
            Mode::Date => Self {
                command: Operation::Rename,
                allow_subgroups: true,
                counter: 1,
                format: "{directory:s}/{datetime:s} {base:s}{extension:s}".to_string(),
                basepattern: DATE_BASE_PATTERN.to_string(),
                ..defaults
            },
            Mode::Postprocess => Self {
                command: Operation::Postprocess,
                allow_subgroups: true,
                recursive: true,
                ..defaults
            },
        }
    }
}
