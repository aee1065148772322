use std::path::PathBuf;

use thiserror::Error;

/// Every failure a retrieval, ingestion or generation call can surface.
///
/// Errors are local to one request: nothing is retried internally and no
/// partial result is cached or persisted when one is returned.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid chunking (or other engine) parameters.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The request itself is malformed, or the artifacts it targets disagree.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The requested document has not been ingested.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An artifact was read but its content has the wrong shape.
    #[error("Inconsistent artifact: {0}")]
    Consistency(String),

    /// The embedding or generation collaborator failed or is misconfigured.
    #[error("Upstream failure: {0}")]
    Upstream(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound(path.display().to_string());
        }
        Self::Io { path, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Consistency(_) => ErrorKind::Consistency,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Payload-free discriminant of [`Error`], handy for matching at service
/// boundaries (e.g. mapping to status codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    NotFound,
    Consistency,
    Upstream,
    Io,
}

pub type Result<T> = std::result::Result<T, Error>;
