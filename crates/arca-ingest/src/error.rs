//! Error types for the reconciliation engine
//!
//! Failures come in two levels. An [`IngestError`] is an ordinary failure:
//! a collaborator call failed, a package format could not be parsed, or an
//! operation is unsupported. When such a failure happens while a manifest or
//! object is being committed, the engine records it in the status index and
//! reports it through a `Disposition` instead of an error. If recording the
//! failure fails too, the engine raises a [`CompensationError`], which is
//! always fatal for the staging area that hit it.

use arca_common::ArcaError;
use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Ordinary ingest failure
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Content store error for {space}/{content_id}: {message}")]
    Store {
        space: String,
        content_id: String,
        message: String,
        not_found: bool,
    },

    #[error("Repository error: {message}")]
    Repository { message: String, not_found: bool },

    #[error("Index error: {0}")]
    Index(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unable to classify {content_id}: {message}")]
    Classification { content_id: String, message: String },

    #[error("Object {object_id} is not declared by manifest {manifest_id}")]
    UndeclaredObject {
        manifest_id: String,
        object_id: String,
    },

    #[error("Event for space {actual} delivered to the engine for {expected}")]
    MisroutedEvent { expected: String, actual: String },

    #[error("The worker for {0} has stopped")]
    WorkerStopped(String),

    #[error(transparent)]
    Common(#[from] ArcaError),
}

impl IngestError {
    pub fn store(space: &str, content_id: &str, message: impl Into<String>) -> Self {
        IngestError::Store {
            space: space.to_string(),
            content_id: content_id.to_string(),
            message: message.into(),
            not_found: false,
        }
    }

    pub fn store_not_found(space: &str, content_id: &str) -> Self {
        IngestError::Store {
            space: space.to_string(),
            content_id: content_id.to_string(),
            message: "content not found".to_string(),
            not_found: true,
        }
    }

    pub fn repository(message: impl Into<String>) -> Self {
        IngestError::Repository {
            message: message.into(),
            not_found: false,
        }
    }

    pub fn repository_not_found(what: impl std::fmt::Display) -> Self {
        IngestError::Repository {
            message: format!("{} not found", what),
            not_found: true,
        }
    }

    pub fn parse(message: impl std::fmt::Display) -> Self {
        IngestError::Parse(message.to_string())
    }

    /// Whether the failure means the addressed content or object is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            IngestError::Store { not_found: true, .. }
                | IngestError::Repository { not_found: true, .. }
        )
    }
}

/// A failure raised while recording an earlier failure.
///
/// The index and repository are in an unknown state when this happens, so
/// it is never swallowed.
#[derive(Error, Debug)]
#[error("Compensation failed ({failure}) while recovering from: {original}")]
pub struct CompensationError {
    /// The failure that triggered compensation
    pub original: IngestError,
    /// The failure of the compensating writes themselves
    #[source]
    pub failure: IngestError,
}

/// Error surfaced by the top-level event handler
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Compensation(#[from] CompensationError),
}

impl EngineError {
    /// Fatal errors stop the staging area's worker.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Compensation(_))
    }
}
