//! Grouping keys and file groups.

use regex::Regex;

use super::FileId;
use crate::config::require_captures;
use crate::error::ConfigError;

/// Keys derived from a file location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKeys {
    /// Location without the extension
    pub root: String,
    /// Extension including the dot, as written
    pub extension: String,
    /// Files with equal group keys form a group
    pub group: String,
    /// Distinguishes files within a group
    pub index: String,
}

/// Rule assigning group keys to locations. The default groups by root.
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    pattern: Option<Regex>,
}

impl Grouping {
    /// With `allow_subgroups`, keys come from `pattern` (captures `group`
    /// and `index`); otherwise the root is the group and the extension the
    /// index.
    pub fn new(allow_subgroups: bool, pattern: &str) -> Result<Self, ConfigError> {
        let pattern = if allow_subgroups {
            Some(require_captures("grouppattern", pattern, &["group", "index"])?)
        } else {
            None
        };
        Ok(Self { pattern })
    }

    pub fn allows_subgroups(&self) -> bool {
        self.pattern.is_some()
    }

    pub fn keys(&self, location: &str) -> GroupKeys {
        let (root, extension) = split_extension(location);
        let (group, index) = match &self.pattern {
            None => (root.to_string(), extension.to_string()),
            Some(pattern) => match pattern.captures(location) {
                Some(caps) => (
                    caps.name("group").map_or("", |m| m.as_str()).to_string(),
                    caps.name("index").map_or("", |m| m.as_str()).to_string(),
                ),
                None => (location.to_string(), String::new()),
            },
        };
        GroupKeys {
            root: root.to_string(),
            extension: extension.to_string(),
            group,
            index,
        }
    }
}

/// Split `a/b/name.ext` into `a/b/name` and `.ext`. Leading dots of the
/// file name do not start an extension.
pub fn split_extension(location: &str) -> (&str, &str) {
    let name_start = location.rfind('/').map_or(0, |i| i + 1);
    let name = &location[name_start..];
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].rfind('.') {
        Some(dot) => location.split_at(name_start + leading + dot),
        None => (location, ""),
    }
}

/// Files sharing a group key.
#[derive(Debug, Clone)]
pub struct FileGroup {
    key: String,
    members: Vec<FileId>,
    base: Option<String>,
    number: Option<u64>,
}

impl FileGroup {
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            members: Vec::new(),
            base: None,
            number: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[FileId] {
        &self.members
    }

    pub(crate) fn push(&mut self, id: FileId) {
        self.members.push(id);
    }

    /// Base name from the last numbering pass.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Number from the last numbering pass.
    pub fn number(&self) -> Option<u64> {
        self.number
    }

    pub(crate) fn assign(&mut self, base: String, number: u64) {
        self.base = Some(base);
        self.number = Some(number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_GROUP_PATTERN;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("/a/b/IMG_1.JPG"), ("/a/b/IMG_1", ".JPG"));
        assert_eq!(split_extension("/a.d/b"), ("/a.d/b", ""));
        assert_eq!(split_extension("/a/.hidden"), ("/a/.hidden", ""));
        assert_eq!(split_extension("/a/x.tar.gz"), ("/a/x.tar", ".gz"));
    }

    #[test]
    fn test_subgroup_keys() {
        let grouping = Grouping::new(true, DEFAULT_GROUP_PATTERN).unwrap();

        let keys = grouping.keys("/p/pano.jpg");
        assert_eq!(keys.group, "/p/pano");
        assert_eq!(keys.index, ".jpg");
        assert_eq!(keys.root, "/p/pano");

        let keys = grouping.keys("/p/pano(hdr).tif");
        assert_eq!(keys.group, "/p/pano");
        assert_eq!(keys.index, "(hdr).tif");
        assert_eq!(keys.root, "/p/pano(hdr)");
    }

    #[test]
    fn test_no_match_uses_whole_location() {
        let grouping = Grouping::new(true, DEFAULT_GROUP_PATTERN).unwrap();
        let keys = grouping.keys("/p/README");
        assert_eq!(keys.group, "/p/README");
        assert_eq!(keys.index, "");
    }

    #[test]
    fn test_without_subgroups() {
        let grouping = Grouping::new(false, "ignored").unwrap();
        let keys = grouping.keys("/p/pano(hdr).tif");
        assert_eq!(keys.group, "/p/pano(hdr)");
        assert_eq!(keys.index, ".tif");
        assert!(!grouping.allows_subgroups());
    }

    #[test]
    fn test_pattern_must_name_captures() {
        assert!(Grouping::new(true, r"^(.*)(\..*)$").is_err());
    }
}
