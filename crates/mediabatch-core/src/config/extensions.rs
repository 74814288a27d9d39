//! Per-extension profiles: what each supported file kind is and how the
//! checks treat it by default.

use crate::action::Action;
use crate::pipeline::Decisions;
use crate::types::{MediaType, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Classification and default decisions for one file extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionProfile {
    pub media_type: MediaType,

    pub stage: Stage,

    /// Carries EXIF/IPTC/XMP tags the engine can read and write
    #[serde(default)]
    pub tags: bool,

    /// Supported by the auto-rotate tool
    #[serde(default)]
    pub rotate: bool,

    /// Can be assembled from a group by the panorama/HDR tool
    #[serde(default)]
    pub group_convert: bool,

    /// Lower values are more trustworthy for the group creation time
    pub date_priority: u32,

    /// Decision preselected when a check flags a file of this kind
    #[serde(default)]
    pub defaults: Decisions,
}

/// Supported extensions, keyed by lowercase extension without the dot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtensionTable(BTreeMap<String, ExtensionProfile>);

impl ExtensionTable {
    /// Build a table from `(extension, profile)` pairs.
    pub fn new(profiles: impl IntoIterator<Item = (String, ExtensionProfile)>) -> Self {
        Self(
            profiles
                .into_iter()
                .map(|(ext, profile)| (normalize(&ext), profile))
                .collect(),
        )
    }

    /// Look up an extension, with or without the leading dot, any case.
    pub fn lookup(&self, extension: &str) -> Option<&ExtensionProfile> {
        self.0.get(&normalize(extension))
    }

    /// Look up the profile for a path by its extension.
    pub fn lookup_path(&self, path: &Path) -> Option<&ExtensionProfile> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.lookup(ext))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ExtensionProfile)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize(extension: &str) -> String {
    extension.trim_start_matches('.').to_lowercase()
}

impl Default for ExtensionTable {
    fn default() -> Self {
        let raw_image = ExtensionProfile {
            media_type: MediaType::Image,
            stage: Stage::Raw,
            tags: true,
            rotate: false,
            group_convert: false,
            date_priority: 2,
            defaults: Decisions {
                unselected: Some(Action::Include),
                only_raw: Some(Action::Trash),
                creation_time: Some(Action::SetCreationTime),
                ..Decisions::default()
            },
        };

        Self::new([
            (
                "jpg".to_string(),
                ExtensionProfile {
                    media_type: MediaType::Image,
                    stage: Stage::Result,
                    tags: true,
                    rotate: true,
                    group_convert: true,
                    date_priority: 1,
                    defaults: Decisions {
                        unselected: Some(Action::Include),
                        rotate: Some(Action::Rotate),
                        new_file_group: Some(Action::ConvertGroup),
                        creation_time: Some(Action::SetCreationTime),
                        ..Decisions::default()
                    },
                },
            ),
            ("cr2".to_string(), raw_image.clone()),
            ("nef".to_string(), raw_image),
            (
                "tif".to_string(),
                ExtensionProfile {
                    media_type: MediaType::Image,
                    stage: Stage::Intermediate,
                    tags: true,
                    rotate: false,
                    group_convert: false,
                    date_priority: 3,
                    defaults: Decisions {
                        unselected: Some(Action::Include),
                        creation_time: Some(Action::SetCreationTime),
                        ..Decisions::default()
                    },
                },
            ),
            (
                "mov".to_string(),
                ExtensionProfile {
                    media_type: MediaType::Video,
                    stage: Stage::Raw,
                    tags: false,
                    rotate: false,
                    group_convert: false,
                    date_priority: 5,
                    defaults: Decisions {
                        unselected: Some(Action::Include),
                        only_raw: Some(Action::Convert),
                        ..Decisions::default()
                    },
                },
            ),
            (
                "mp4".to_string(),
                ExtensionProfile {
                    media_type: MediaType::Video,
                    stage: Stage::Result,
                    tags: false,
                    rotate: false,
                    group_convert: false,
                    date_priority: 4,
                    defaults: Decisions {
                        unselected: Some(Action::Include),
                        ..Decisions::default()
                    },
                },
            ),
            (
                "thm".to_string(),
                ExtensionProfile {
                    media_type: MediaType::Video,
                    stage: Stage::Intermediate,
                    tags: true,
                    rotate: false,
                    group_convert: false,
                    date_priority: 6,
                    defaults: Decisions {
                        unselected: Some(Action::Include),
                        ..Decisions::default()
                    },
                },
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::CheckKind;

    #[test]
    fn test_lookup_ignores_case_and_dot() {
        let table = ExtensionTable::default();
        assert_eq!(table.lookup(".JPG").unwrap().stage, Stage::Result);
        assert_eq!(table.lookup("cr2").unwrap().stage, Stage::Raw);
        assert!(table.lookup("png").is_none());
    }

    #[test]
    fn test_lookup_path() {
        let table = ExtensionTable::default();
        assert!(table.lookup_path(Path::new("/a/IMG_0001.NEF")).is_some());
        assert!(table.lookup_path(Path::new("/a/.jpg")).is_none());
        assert!(table.lookup_path(Path::new("/a/README")).is_none());
    }

    #[test]
    fn test_default_table_defaults() {
        let table = ExtensionTable::default();
        let jpg = table.lookup("jpg").unwrap();
        assert_eq!(jpg.defaults.get(CheckKind::NewFileGroup), Some(Action::ConvertGroup));
        assert_eq!(jpg.defaults.get(CheckKind::OnlyRaw), None);
        let mov = table.lookup("mov").unwrap();
        assert_eq!(mov.defaults.get(CheckKind::OnlyRaw), Some(Action::Convert));
        assert_eq!(table.len(), 7);
    }
}
