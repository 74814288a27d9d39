//! One media file and what the engine knows about it.

use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::group::GroupKeys;
use super::GroupId;
use crate::action::Action;
use crate::capability::{FileSystem, MetadataProvider, TagStore};
use crate::config::ExtensionProfile;
use crate::pipeline::{CheckKind, Decisions};
use crate::rename::RenameIssue;
use crate::types::{TimeKey, ORIENTATION_KEY, TAG_KEYS};

/// Index of a file in its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub(crate) usize);

/// A media file in (or found next to) the batch.
pub struct FileEntry {
    path: PathBuf,
    keys: GroupKeys,
    profile: ExtensionProfile,
    pub(crate) group: Option<GroupId>,
    pub(crate) decisions: Decisions,
    tags: Option<Box<dyn TagStore>>,
    times: BTreeMap<TimeKey, NaiveDateTime>,
    fallback_time: Option<NaiveDateTime>,
    orientation: Option<i64>,
    pub(crate) fill_times: BTreeMap<TimeKey, NaiveDateTime>,
    pub(crate) members: Vec<FileId>,
    pub(crate) rename_issue: Option<RenameIssue>,
    initialized: bool,
}

impl FileEntry {
    /// Create an entry. Decisions start from the profile defaults, with
    /// post-processing actions downgraded to Ignore unless `postprocessing`.
    pub fn new(path: PathBuf, keys: GroupKeys, profile: ExtensionProfile, postprocessing: bool) -> Self {
        let decisions = profile.defaults.for_mode(postprocessing);
        Self {
            path,
            keys,
            profile,
            group: None,
            decisions,
            tags: None,
            times: BTreeMap::new(),
            fallback_time: None,
            orientation: None,
            fill_times: BTreeMap::new(),
            members: Vec::new(),
            rename_issue: None,
            initialized: false,
        }
    }

    /// Read tags and the file time. Runs once; later calls are no-ops.
    pub fn init(&mut self, fs: &dyn FileSystem, metadata: &dyn MetadataProvider) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        if self.profile.tags {
            match metadata.open(&self.path) {
                Ok(store) => {
                    for key in TimeKey::ALL {
                        if let Some(time) = store.get_string(key.tag()).and_then(|v| TimeKey::parse(&v)) {
                            self.times.insert(key, time);
                        }
                    }
                    self.orientation = store.get_long(ORIENTATION_KEY);
                    self.tags = Some(store);
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }
        self.fallback_time = fs.modified(&self.path);
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn location(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Directory containing the file.
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("/"))
    }

    pub fn root(&self) -> &str {
        &self.keys.root
    }

    pub fn extension(&self) -> &str {
        &self.keys.extension
    }

    pub fn group_key(&self) -> &str {
        &self.keys.group
    }

    pub fn index(&self) -> &str {
        &self.keys.index
    }

    pub fn profile(&self) -> &ExtensionProfile {
        &self.profile
    }

    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Decision for a check; meaningful only while the check flags the file.
    pub fn decision(&self, check: CheckKind) -> Option<Action> {
        self.decisions.get(check)
    }

    pub fn decisions(&self) -> &Decisions {
        &self.decisions
    }

    /// Readable time stored under `key` in the file's own tags.
    pub fn exif_time(&self, key: TimeKey) -> Option<NaiveDateTime> {
        self.times.get(&key).copied()
    }

    /// Best known creation time, falling back to the modification time.
    pub fn creation_time(&self) -> Option<NaiveDateTime> {
        TimeKey::ALL
            .iter()
            .find_map(|key| self.exif_time(*key))
            .or(self.fallback_time)
    }

    pub fn orientation(&self) -> Option<i64> {
        self.orientation
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.as_ref().is_some_and(|t| t.has_tag(key))
    }

    pub fn tags(&self) -> Option<&dyn TagStore> {
        self.tags.as_deref()
    }

    pub(crate) fn tags_mut(&mut self) -> Option<&mut (dyn TagStore + 'static)> {
        self.tags.as_deref_mut()
    }

    /// Keywords from all keyword lists.
    pub fn keywords(&self) -> Vec<String> {
        self.tags
            .as_ref()
            .map(|t| TAG_KEYS.iter().flat_map(|key| t.get_multiple(key)).collect())
            .unwrap_or_default()
    }

    /// Times the creation-time check wants to write.
    pub fn fill_times(&self) -> &BTreeMap<TimeKey, NaiveDateTime> {
        &self.fill_times
    }

    /// Members a synthesized group result is built from.
    pub fn members(&self) -> &[FileId] {
        &self.members
    }

    pub fn rename_issue(&self) -> Option<&RenameIssue> {
        self.rename_issue.as_ref()
    }
}

impl fmt::Debug for FileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileEntry")
            .field("path", &self.path)
            .field("group", &self.keys.group)
            .field("index", &self.keys.index)
            .field("decisions", &self.decisions)
            .finish_non_exhaustive()
    }
}
