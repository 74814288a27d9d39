//! Services the engine calls into: file system, metadata and external tools.
//!
//! Each is a trait so tests and embedders can substitute their own; the
//! defaults work on the local machine.

pub mod command;
pub mod fs;
pub mod metadata;

pub use command::{CommandRunner, Invocation, ProcessRunner};
pub use fs::{EntryKind, FileSystem, LocalFileSystem};
pub use metadata::{ExifMetadata, MetadataProvider, TagStore};

use std::sync::Arc;

use crate::config::Config;

/// The set of services a batch runs against.
#[derive(Clone)]
pub struct Capabilities {
    pub fs: Arc<dyn FileSystem>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub commands: Arc<dyn CommandRunner>,
}

impl Capabilities {
    /// Local file system, EXIF metadata and child processes, set up from
    /// the configuration.
    pub fn local(config: &Config) -> Self {
        Self {
            fs: Arc::new(LocalFileSystem),
            metadata: Arc::new(ExifMetadata::new(
                shellexpand::tilde(&config.tools.exiftool).into_owned(),
            )),
            commands: Arc::new(ProcessRunner::new(
                config.tools.wrapper.clone(),
                config.scheduler.pause_poll(),
            )),
        }
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}
