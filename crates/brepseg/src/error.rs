//! Error types for the binding engine.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result alias used throughout the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Fatal failures surfaced to the caller.
///
/// Recoverable conditions (label count mismatch, clamped labels) are not
/// errors; they are reported as [`BindWarning`](crate::BindWarning)s.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The input could not be parsed as a valid solid.
    #[error("failed to load geometry from {}: {message}", path.display())]
    GeometryLoad {
        /// Input file.
        path: PathBuf,
        /// Loader message.
        message: String,
    },

    /// The solid loaded but has no faces.
    #[error("no faces found in {}", path.display())]
    EmptyGeometry {
        /// Input file.
        path: PathBuf,
    },

    /// Binding needs at least one category to clamp into.
    #[error("label catalog is empty")]
    EmptyCatalog,

    /// The label-mapping file is malformed.
    #[error("invalid label mapping: {0}")]
    LabelMapping(String),

    /// The inference collaborator failed.
    #[error("inference failed for {}: {message}", path.display())]
    Inference {
        /// Input file being inferred.
        path: PathBuf,
        /// Collaborator message.
        message: String,
    },

    /// The render backend refused to create an actor.
    #[error("render backend error: {0}")]
    Render(String),

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An operation needs state the session does not have yet.
    #[error("not ready: {0}")]
    NotReady(String),

    /// A JSON document could not be written or read back.
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The configuration file is malformed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create an inference error.
    pub fn inference(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Inference {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }
}
