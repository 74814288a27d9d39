//! Error types for the mediabatch engine.
//!
//! Errors are organized by layer: configuration problems, per-file action
//! failures (recorded and counted), external command failures, metadata
//! access, and batch-level failures that end an operation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::engine::BatchState;
use crate::pipeline::CheckKind;
use crate::scheduler::Cancelled;

/// Top-level error type for batch operations.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Operation called in the wrong lifecycle state
    #[error("Cannot {operation} while the batch is {state}")]
    InvalidState {
        operation: &'static str,
        state: BatchState,
    },

    /// A decision override that the check does not offer
    #[error("{check} check does not offer the {action} action")]
    InvalidDecision { check: CheckKind, action: String },

    /// A decision override for a file the check did not flag
    #[error("{path} is not flagged by the {check} check")]
    NotFlagged { check: CheckKind, path: PathBuf },

    /// Non-fatal action failures of one check, aggregated
    #[error("{check} check: {count} action(s) failed")]
    CheckFailed { check: CheckKind, count: usize },

    /// An action failure the fatality policy escalated
    #[error("{check} action failed for {path}: {source}")]
    Action {
        check: CheckKind,
        path: PathBuf,
        #[source]
        source: ActionError,
    },

    /// Rename order could not be resolved; offending files carry the details
    #[error("Could not calculate rename order: {count} problem(s), see output above")]
    RenameOrder { count: usize },

    /// Several recoverable errors were encountered
    #[error("Encountered {count} errors")]
    Aggregate { count: usize },

    /// A physical rename failed
    #[error("Could not rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cooperative cancellation observed at a suspend point
    #[error("Aborted by user")]
    Cancelled,

    /// Metadata access errors
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

impl From<Cancelled> for BatchError {
    fn from(_: Cancelled) -> Self {
        BatchError::Cancelled
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Failure of a single file action.
#[derive(Error, Debug)]
pub enum ActionError {
    /// File system operation failed
    #[error("Could not {operation} {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External tool failed
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Reading or writing tags failed
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// No converter is configured for this kind of file
    #[error("Converting {extension} files is not supported")]
    Unsupported { extension: String },

    /// Group members disagree on panorama/HDR tagging
    #[error("File group {group} has inconsistent tags")]
    InconsistentTags { group: String },

    /// The file carries no tag store to write to
    #[error("No metadata available for {0}")]
    NoMetadata(PathBuf),

    /// Cancelled while the action was running
    #[error("Aborted by user")]
    Cancelled,
}

/// Kind of an [`ActionError`], as named in fatal rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionErrorKind {
    Io,
    Command,
    Metadata,
    Unsupported,
    InconsistentTags,
    NoMetadata,
    Cancelled,
}

impl ActionError {
    pub fn kind(&self) -> ActionErrorKind {
        match self {
            ActionError::Io { .. } => ActionErrorKind::Io,
            ActionError::Command(_) => ActionErrorKind::Command,
            ActionError::Metadata(_) => ActionErrorKind::Metadata,
            ActionError::Unsupported { .. } => ActionErrorKind::Unsupported,
            ActionError::InconsistentTags { .. } => ActionErrorKind::InconsistentTags,
            ActionError::NoMetadata(_) => ActionErrorKind::NoMetadata,
            ActionError::Cancelled => ActionErrorKind::Cancelled,
        }
    }

    /// Whether this failure is a user cancellation rather than a real error.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ActionError::Cancelled | ActionError::Command(CommandError::Cancelled { .. })
        )
    }
}

impl From<Cancelled> for ActionError {
    fn from(_: Cancelled) -> Self {
        ActionError::Cancelled
    }
}

/// Errors from running external programs.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The program could not be started
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O failure while supervising the child
    #[error("IO error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Non-zero exit status
    #[error("{program} terminated with return code {code}")]
    Failed { program: String, code: i32 },

    /// Terminated by a signal
    #[error("{program} was terminated by a signal")]
    Killed { program: String },

    /// Terminated because the batch was cancelled
    #[error("{program} aborted by user")]
    Cancelled { program: String },
}

/// Errors from the metadata capability.
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Tags could not be read
    #[error("Failed to read metadata of {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// Tags could not be written back
    #[error("Failed to write metadata of {path}: {message}")]
    Write { path: PathBuf, message: String },
}

/// Convenience type alias for batch results.
pub type Result<T> = std::result::Result<T, BatchError>;

/// Convenience type alias for per-file action results.
pub type ActionResult<T> = std::result::Result<T, ActionError>;
