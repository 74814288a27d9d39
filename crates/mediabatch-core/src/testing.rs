//! In-memory stand-ins for the capabilities, shared by the unit tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::batch::{Batch, FileEntry, FileId, Grouping};
use crate::capability::{
    Capabilities, CommandRunner, Invocation, LocalFileSystem, MetadataProvider, TagStore,
};
use crate::config::{BatchOptions, Config};
use crate::error::{CommandError, MetadataError};
use crate::pipeline::Context;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::scheduler::{BatchControl, Scheduler};

#[derive(Debug, Clone, Default)]
struct Tags {
    strings: BTreeMap<String, String>,
    lists: BTreeMap<String, Vec<String>>,
    saves: usize,
}

/// Tag stores kept in a shared map; saving writes back into it.
#[derive(Debug, Default)]
pub(crate) struct MemoryMetadata {
    files: Arc<Mutex<HashMap<PathBuf, Tags>>>,
}

impl MemoryMetadata {
    pub fn set_string(&self, path: &Path, key: &str, value: &str) {
        let mut files = self.files.lock().unwrap();
        let tags = files.entry(path.to_path_buf()).or_default();
        tags.strings.insert(key.to_string(), value.to_string());
    }

    pub fn set_list(&self, path: &Path, key: &str, values: &[&str]) {
        let mut files = self.files.lock().unwrap();
        let tags = files.entry(path.to_path_buf()).or_default();
        tags.lists
            .insert(key.to_string(), values.iter().map(|v| v.to_string()).collect());
    }

    pub fn string(&self, path: &Path, key: &str) -> Option<String> {
        self.files.lock().unwrap().get(path)?.strings.get(key).cloned()
    }

    pub fn list(&self, path: &Path, key: &str) -> Vec<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .and_then(|tags| tags.lists.get(key).cloned())
            .unwrap_or_default()
    }

    pub fn saves(&self, path: &Path) -> usize {
        self.files.lock().unwrap().get(path).map_or(0, |t| t.saves)
    }
}

impl MetadataProvider for MemoryMetadata {
    fn open(&self, path: &Path) -> Result<Box<dyn TagStore>, MetadataError> {
        let tags = self
            .files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(MemoryStore {
            path: path.to_path_buf(),
            tags,
            files: self.files.clone(),
        }))
    }
}

struct MemoryStore {
    path: PathBuf,
    tags: Tags,
    files: Arc<Mutex<HashMap<PathBuf, Tags>>>,
}

#[async_trait]
impl TagStore for MemoryStore {
    fn has_tag(&self, key: &str) -> bool {
        self.tags.strings.contains_key(key) || self.tags.lists.contains_key(key)
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.tags.strings.get(key).cloned()
    }

    fn set_string(&mut self, key: &str, value: &str) {
        self.tags.strings.insert(key.to_string(), value.to_string());
    }

    fn get_long(&self, key: &str) -> Option<i64> {
        self.tags.strings.get(key)?.parse().ok()
    }

    fn get_multiple(&self, key: &str) -> Vec<String> {
        self.tags.lists.get(key).cloned().unwrap_or_default()
    }

    fn set_multiple(&mut self, key: &str, values: &[String]) {
        self.tags.lists.insert(key.to_string(), values.to_vec());
    }

    async fn save(&mut self) -> Result<(), MetadataError> {
        self.tags.saves += 1;
        self.files
            .lock()
            .unwrap()
            .insert(self.path.clone(), self.tags.clone());
        Ok(())
    }
}

/// Records invocations instead of running them. Invocations whose last
/// argument ends with a registered suffix fail.
#[derive(Debug, Default)]
pub(crate) struct RecordingRunner {
    invocations: Mutex<Vec<Invocation>>,
    failing: Mutex<Vec<String>>,
}

impl RecordingRunner {
    pub fn fail_on(&self, suffix: &str) {
        self.failing.lock().unwrap().push(suffix.to_string());
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        progress: &dyn ProgressSink,
        control: &BatchControl,
    ) -> Result<(), CommandError> {
        if control.is_cancelled() {
            return Err(CommandError::Cancelled {
                program: invocation.program.clone(),
            });
        }
        self.invocations.lock().unwrap().push(invocation.clone());
        progress.output(&format!("{invocation}\n"));

        let last = invocation.args.last().cloned().unwrap_or_default();
        if self.failing.lock().unwrap().iter().any(|s| last.ends_with(s)) {
            return Err(CommandError::Failed {
                program: invocation.program.clone(),
                code: 1,
            });
        }
        Ok(())
    }
}

/// Progress sink keeping every event.
#[derive(Debug, Default)]
pub(crate) struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Everything written with `output`, concatenated.
    pub fn output_text(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Output(text) => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingProgress {
    fn set_title(&self, title: &str) {
        self.events.lock().unwrap().push(ProgressEvent::Title(title.to_string()));
    }

    fn set_step(&self, text: &str, total: usize) {
        self.events.lock().unwrap().push(ProgressEvent::Step {
            text: text.to_string(),
            total,
        });
    }

    fn increase_step(&self, label: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push(ProgressEvent::Increase(label.map(str::to_string)));
    }

    fn set_visible(&self, visible: bool) {
        self.events.lock().unwrap().push(ProgressEvent::Visible(visible));
    }

    fn output(&self, text: &str) {
        self.events
            .lock()
            .unwrap()
            .push(ProgressEvent::Output(text.to_string()));
    }
}

/// Local file system with in-memory metadata and recorded commands.
pub(crate) fn capabilities() -> (Capabilities, Arc<MemoryMetadata>, Arc<RecordingRunner>) {
    let metadata = Arc::new(MemoryMetadata::default());
    let runner = Arc::new(RecordingRunner::default());
    let caps = Capabilities {
        fs: Arc::new(LocalFileSystem),
        metadata: metadata.clone(),
        commands: runner.clone(),
    };
    (caps, metadata, runner)
}

/// A batch over a temporary directory plus everything needed to build a
/// [`Context`] for it.
pub(crate) struct TestBed {
    pub dir: tempfile::TempDir,
    pub config: Config,
    pub options: BatchOptions,
    pub caps: Capabilities,
    pub metadata: Arc<MemoryMetadata>,
    pub runner: Arc<RecordingRunner>,
    pub progress: RecordingProgress,
    pub batch: Batch,
    pub scheduler: Scheduler,
}

impl TestBed {
    pub fn new(options: BatchOptions) -> Self {
        let config = Config::default();
        let (caps, metadata, runner) = capabilities();
        let grouping = Grouping::new(options.allow_subgroups, &options.grouppattern).unwrap();
        let scheduler = Scheduler::new(&config.scheduler, BatchControl::new());
        Self {
            dir: tempfile::tempdir().unwrap(),
            config,
            options,
            caps,
            metadata,
            runner,
            progress: RecordingProgress::default(),
            batch: Batch::new(grouping),
            scheduler,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn entry(&self, path: PathBuf) -> FileEntry {
        let keys = self.batch.grouping().keys(&path.to_string_lossy());
        let profile = self.config.extensions.lookup_path(&path).unwrap().clone();
        let postprocessing = self.options.command == crate::types::Operation::Postprocess;
        FileEntry::new(path, keys, profile, postprocessing)
    }

    /// Create `name` on disk, read its tags and add it to the batch.
    pub fn add(&mut self, name: &str) -> FileId {
        let path = self.path(name);
        std::fs::write(&path, name).unwrap();
        let mut entry = self.entry(path);
        entry.init(self.caps.fs.as_ref(), self.caps.metadata.as_ref());
        let id = self.batch.create(entry);
        self.batch.add_file(id);
        id
    }

    /// A synthesized group result built from `members`, outside the batch.
    pub fn virtual_group(&mut self, name: &str, members: Vec<FileId>) -> FileId {
        let mut entry = self.entry(self.path(name));
        entry.members = members;
        self.batch.create(entry)
    }

    pub fn context(&mut self) -> Context<'_> {
        Context {
            batch: &mut self.batch,
            caps: &self.caps,
            config: &self.config,
            options: &self.options,
            progress: &self.progress,
            scheduler: &mut self.scheduler,
        }
    }
}
