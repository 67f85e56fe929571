use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FamGraphError {
    #[error("connection error: {0}")]
    ConnectionError(String),
    #[error("schema error: {0}")]
    SchemaError(String),
    #[error("query error: {0}")]
    QueryError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("relation {parent_id} -> {child_id} references missing person {missing_id}")]
    DanglingReference {
        parent_id: i64,
        child_id: i64,
        missing_id: i64,
    },
    #[error("relation cycle detected: {}", format_cycle(.0))]
    CycleDetected(Vec<i64>),
    #[error("cannot load image {}: {reason}", .path.display())]
    AssetLoad { path: PathBuf, reason: String },
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("render error: {0}")]
    Render(String),
}

impl FamGraphError {
    pub fn connection<T: Into<String>>(msg: T) -> Self {
        FamGraphError::ConnectionError(msg.into())
    }

    pub fn schema<T: Into<String>>(msg: T) -> Self {
        FamGraphError::SchemaError(msg.into())
    }

    pub fn query<T: Into<String>>(msg: T) -> Self {
        FamGraphError::QueryError(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        FamGraphError::NotFound(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        FamGraphError::InvalidInput(msg.into())
    }

    pub fn asset_load<P: Into<PathBuf>, T: Into<String>>(path: P, reason: T) -> Self {
        FamGraphError::AssetLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn illegal_state<T: Into<String>>(msg: T) -> Self {
        FamGraphError::IllegalState(msg.into())
    }

    pub fn render<T: Into<String>>(msg: T) -> Self {
        FamGraphError::Render(msg.into())
    }

    /// True for errors that mean the stored data is inconsistent rather than
    /// that the storage or the engine failed.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            FamGraphError::DanglingReference { .. } | FamGraphError::CycleDetected(_)
        )
    }
}

fn format_cycle(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
