use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde_json::Value;

use crate::domain::bridge::{Failure, FailureKind, SourcePath};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable at `{path}`: {detail}")]
    Unavailable { path: String, detail: String },
    #[error("invalid path `{path}`: {detail}")]
    InvalidPath { path: String, detail: String },
}

impl SourceError {
    pub fn unavailable(path: &SourcePath, detail: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.to_string(),
            detail: detail.into(),
        }
    }

    pub fn invalid_path(path: &SourcePath, detail: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            detail: detail.into(),
        }
    }
}

impl From<SourceError> for Failure {
    fn from(err: SourceError) -> Self {
        let kind = match err {
            SourceError::Unavailable { .. } => FailureKind::SourceUnavailable,
            SourceError::InvalidPath { .. } => FailureKind::InvalidPath,
        };
        Failure::new(kind, err.to_string())
    }
}

/// Snapshots of one path. Dropping the stream detaches from the source.
pub type ValueStream = Pin<Box<dyn Stream<Item = Result<Value, SourceError>> + Send + 'static>>;

/// Path-addressed remote store.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Current value at `path`; absent values read as JSON `null`.
    async fn read_once(&self, path: &SourcePath) -> Result<Value, SourceError>;

    /// Current value at `path` followed by a snapshot after every change.
    async fn subscribe(&self, path: &SourcePath) -> Result<ValueStream, SourceError>;
}
