//! Mediabatch Core - batch rename and post-processing engine for media files.
//!
//! A batch is a set of photos and videos selected by the user. The engine
//! groups related files (a raw image with its JPEG, the parts of a
//! panorama), runs a fixed list of checks over them and then either renames
//! every group by a name template or only runs the post-processing actions
//! the checks decided on.
//!
//! # Architecture
//!
//! ```text
//! Inputs → Discover → Read tags → Checks → (review decisions) → Actions
//!                                                   └→ Number → Order → Tag → Rename
//! ```
//!
//! File system, metadata and external tools are reached through the traits
//! in [`capability`], so the engine runs against fakes in tests.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mediabatch_core::{BatchEngine, BatchOptions, Capabilities, Config, Mode, NullProgress};
//!
//! #[tokio::main]
//! async fn main() -> mediabatch_core::Result<()> {
//!     let config = Config::load()?;
//!     let caps = Capabilities::local(&config);
//!     let mut engine = BatchEngine::new(config, caps, Arc::new(NullProgress), &["./photos".into()]);
//!
//!     engine.configure(BatchOptions::preset(Mode::Group))?;
//!     engine.prepare().await?;
//!     let summary = engine.execute().await?;
//!     println!("Renamed {} files", summary.renamed);
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod batch;
pub mod capability;
pub mod config;
pub mod engine;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod rename;
pub mod scheduler;
pub mod types;

#[cfg(test)]
mod testing;

pub use action::Action;
pub use batch::{Batch, FileEntry, FileId, NameTemplate};
pub use capability::Capabilities;
pub use config::{BatchOptions, Config, Mode};
pub use engine::{BatchEngine, BatchState};
pub use error::{
    ActionError, ActionErrorKind, BatchError, CommandError, ConfigError, MetadataError, Result,
};
pub use output::{OutputFormat, PlanWriter};
pub use pipeline::{CheckKind, CheckPipeline};
pub use progress::{ChannelProgress, NullProgress, ProgressEvent, ProgressSink};
pub use rename::{RenameIssue, RenameResolver};
pub use scheduler::{BatchControl, RunState};
pub use types::{BatchSummary, Operation, PlanStatus, PlannedRename, Sorting};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
