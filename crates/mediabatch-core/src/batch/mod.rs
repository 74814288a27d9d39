//! The batch: every file the engine knows about and the indices over them.
//!
//! Files live in an arena and are addressed by [`FileId`]. Files found by
//! the checks (unselected siblings, synthesized group results) are created
//! in the arena too, but only files added with [`Batch::add_file`] are part
//! of the root and group indices.

mod file;
mod group;
mod template;

pub use file::{FileEntry, FileId};
pub use group::{split_extension, FileGroup, GroupKeys, Grouping};
pub use template::{number_to_alpha, Field, NameTemplate, NameValues};

use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::action::Action;
use crate::pipeline::CheckKind;

/// Index of a group in its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(usize);

/// Files flagged by one check, by root.
pub type Flags = BTreeMap<String, Vec<FileId>>;

/// Files, groups and check results of one batch.
#[derive(Debug)]
pub struct Batch {
    grouping: Grouping,
    files: Vec<FileEntry>,
    groups: Vec<FileGroup>,
    by_root: BTreeMap<String, Vec<FileId>>,
    by_group: BTreeMap<String, GroupId>,
    flags: Vec<(CheckKind, Flags)>,
    len: usize,
}

impl Batch {
    pub fn new(grouping: Grouping) -> Self {
        Self {
            grouping,
            files: Vec::new(),
            groups: Vec::new(),
            by_root: BTreeMap::new(),
            by_group: BTreeMap::new(),
            flags: Vec::new(),
            len: 0,
        }
    }

    pub fn grouping(&self) -> &Grouping {
        &self.grouping
    }

    /// Store a file without adding it to the batch indices.
    pub fn create(&mut self, entry: FileEntry) -> FileId {
        let id = FileId(self.files.len());
        self.files.push(entry);
        id
    }

    /// Add a created file to the root and group indices.
    ///
    /// The first file of a group key creates the group. Adding a file twice
    /// is a no-op.
    pub fn add_file(&mut self, id: FileId) {
        if self.files[id.0].group.is_some() {
            return;
        }
        let root = self.files[id.0].root().to_string();
        let key = self.files[id.0].group_key().to_string();

        self.by_root.entry(root).or_default().push(id);
        let gid = match self.by_group.get(&key) {
            Some(gid) => *gid,
            None => {
                let gid = GroupId(self.groups.len());
                self.groups.push(FileGroup::new(key.clone()));
                self.by_group.insert(key, gid);
                gid
            }
        };
        self.groups[gid.0].push(id);
        self.files[id.0].group = Some(gid);
        self.len += 1;
    }

    /// Whether the file is part of the batch indices.
    pub fn contains(&self, id: FileId) -> bool {
        self.files[id.0].group.is_some()
    }

    pub fn file(&self, id: FileId) -> &FileEntry {
        &self.files[id.0]
    }

    pub(crate) fn file_mut(&mut self, id: FileId) -> &mut FileEntry {
        &mut self.files[id.0]
    }

    /// Number of files in the batch indices.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Batch files by root.
    pub fn roots(&self) -> &BTreeMap<String, Vec<FileId>> {
        &self.by_root
    }

    /// Find a batch file by location.
    pub fn find(&self, path: &Path) -> Option<FileId> {
        let keys = self.grouping.keys(&path.to_string_lossy());
        self.by_root
            .get(&keys.root)?
            .iter()
            .copied()
            .find(|id| self.file(*id).path() == path)
    }

    /// Groups in key order.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &FileGroup)> {
        self.by_group.values().map(|gid| (*gid, &self.groups[gid.0]))
    }

    pub fn group(&self, id: GroupId) -> &FileGroup {
        &self.groups[id.0]
    }

    pub(crate) fn group_mut(&mut self, id: GroupId) -> &mut FileGroup {
        &mut self.groups[id.0]
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Batch files in group key order.
    pub fn files(&self) -> impl Iterator<Item = (FileId, &FileEntry)> {
        self.groups()
            .flat_map(|(_, group)| group.members().iter())
            .map(|id| (*id, self.file(*id)))
    }

    pub(crate) fn record_flags(&mut self, check: CheckKind, flags: Flags) {
        self.flags.retain(|(kind, _)| *kind != check);
        self.flags.push((check, flags));
    }

    pub(crate) fn clear_flags(&mut self) {
        self.flags.clear();
    }

    /// Files a check flagged, by root.
    pub fn flags(&self, check: CheckKind) -> Option<&Flags> {
        self.flags
            .iter()
            .find(|(kind, _)| *kind == check)
            .map(|(_, flags)| flags)
    }

    /// Files a check flagged, in root order.
    pub fn flagged(&self, check: CheckKind) -> Vec<FileId> {
        self.flags(check)
            .map(|flags| flags.values().flatten().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_flagged(&self, check: CheckKind, id: FileId) -> bool {
        let root = self.file(id).root();
        self.flags(check)
            .and_then(|flags| flags.get(root))
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Whether a check flagged the file and decided to trash it.
    pub fn is_deleted(&self, id: FileId) -> bool {
        self.flags.iter().any(|(check, _)| {
            self.file(id).decision(*check) == Some(Action::Trash) && self.is_flagged(*check, id)
        })
    }

    /// Creation time of a group: the earliest time among the members with
    /// the most trustworthy date priority.
    pub fn group_creation_time(&self, id: GroupId) -> Option<NaiveDateTime> {
        let times: Vec<(u32, NaiveDateTime)> = self
            .group(id)
            .members()
            .iter()
            .filter_map(|m| {
                let file = self.file(*m);
                file.creation_time()
                    .map(|t| (file.profile().date_priority, t))
            })
            .collect();
        let best = times.iter().map(|(priority, _)| *priority).min()?;
        times
            .iter()
            .filter(|(priority, _)| *priority == best)
            .map(|(_, t)| *t)
            .min()
    }

    /// Base of the lexicographically first group, or `/` for an empty batch.
    pub fn default_base(&self, base_pattern: &Regex) -> String {
        self.by_group
            .keys()
            .next()
            .map(|key| base_of(key, base_pattern))
            .unwrap_or_else(|| "/".to_string())
    }

    /// Base derived from a group's own key.
    pub fn group_base(&self, id: GroupId, base_pattern: &Regex) -> String {
        base_of(self.group(id).key(), base_pattern)
    }

    /// Destination of a file under the current group numbering. Relative
    /// results are resolved against the file's directory.
    pub fn destination(&self, id: FileId, template: &NameTemplate) -> PathBuf {
        let file = self.file(id);
        let directory = file.directory().to_string_lossy();
        let (base, counter, datetime) = match file.group() {
            Some(gid) => {
                let group = self.group(gid);
                let datetime = if template.uses(Field::DateTime) {
                    self.group_creation_time(gid)
                } else {
                    None
                };
                (group.base().unwrap_or(""), group.number().unwrap_or(0), datetime)
            }
            None => ("", 0, None),
        };
        template.render_path(
            file.directory(),
            &NameValues {
                directory: &directory,
                base,
                counter,
                extension: file.index(),
                datetime,
            },
        )
    }
}

/// Apply the base pattern to the file name part of a group key.
fn base_of(key: &str, base_pattern: &Regex) -> String {
    let name = key.rsplit('/').next().unwrap_or(key);
    base_pattern
        .captures(name)
        .and_then(|caps| caps.name("base"))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| name.to_string())
}
