//! Core data types shared across the engine.
//!
//! Classification enums for media files, the canonical metadata keys the
//! engine reads and writes, and the serializable rows a rename preview
//! produces.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Keyword list keys the batch tag is appended to.
pub const TAG_KEYS: [&str; 2] = ["Iptc.Application2.Keywords", "Xmp.dc.subject"];

/// Orientation tag consulted by the rotate check.
pub const ORIENTATION_KEY: &str = "Exif.Image.Orientation";

/// Storage format of EXIF timestamps.
pub const EXIF_TIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Rendering of the `{datetime}` name placeholder.
pub const NAME_TIME_FORMAT: &str = "%Y.%m.%d %Hh%Mm%Ss";

/// Broad media type of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// Processing stage of a file within its group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Camera original (CR2, NEF, MOV)
    Raw,
    /// Working file between raw and result (TIF, THM)
    Intermediate,
    /// Final deliverable (JPG, MP4)
    Result,
}

/// What a batch run does after its checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Assign new names by group
    Rename,
    /// Only run the check actions
    #[default]
    Postprocess,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Rename => write!(f, "rename"),
            Operation::Postprocess => write!(f, "postprocess"),
        }
    }
}

/// Order in which groups receive their numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sorting {
    /// Lexicographic by group key
    Name,
    /// By group creation time, ties broken by group key
    #[default]
    Date,
}

/// Canonical creation-time keys, in lookup priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeKey {
    DateTimeOriginal,
    DateTimeDigitized,
    DateTime,
}

impl TimeKey {
    /// All keys, most authoritative first.
    pub const ALL: [TimeKey; 3] = [
        TimeKey::DateTimeOriginal,
        TimeKey::DateTimeDigitized,
        TimeKey::DateTime,
    ];

    /// Full metadata key.
    pub fn tag(&self) -> &'static str {
        match self {
            TimeKey::DateTimeOriginal => "Exif.Photo.DateTimeOriginal",
            TimeKey::DateTimeDigitized => "Exif.Photo.DateTimeDigitized",
            TimeKey::DateTime => "Exif.Image.DateTime",
        }
    }

    /// Parse a stored EXIF timestamp (`2019:05:04 13:21:07`).
    pub fn parse(value: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(value.trim(), EXIF_TIME_FORMAT).ok()
    }
}

impl fmt::Display for TimeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Outcome of one file in a rename preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// File will be moved to its destination
    Rename,
    /// Destination equals the current location
    Unchanged,
    /// File is trashed by one of the check actions
    Delete,
    /// Rename order could not include this file
    Error,
}

/// One row of a rename preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedRename {
    /// Current location
    pub source: PathBuf,

    /// Computed destination (absent for deleted files)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,

    pub status: PlanStatus,

    /// Rename issue text for `Error` rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Effective creation time of the file's group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDateTime>,
}

/// Counts reported after a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Files in the batch after the checks ran
    pub files: usize,
    /// Groups in the batch
    pub groups: usize,
    /// Files moved to a new location
    pub renamed: usize,
    /// Files removed by a trash action
    pub deleted: usize,
}
