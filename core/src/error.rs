use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DefsyncErr>;

#[derive(Debug, Error)]
pub enum DefsyncErr {
    /// A setting the run cannot proceed without was not provided.
    #[error("missing required setting {0}")]
    MissingSetting(&'static str),

    #[error("invalid month `{0}`, expected YYYY-MM")]
    InvalidMonth(String),

    #[error("invalid date `{0}`, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Count, page read, or update against the document store failed.
    #[error("document store error: {0}")]
    Store(String),

    #[error("malformed record: {0}")]
    MalformedRecord(String),

    #[error("failed to write results to {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DefsyncErr {
    pub fn store(err: impl std::fmt::Display) -> Self {
        DefsyncErr::Store(err.to_string())
    }

    pub(crate) fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DefsyncErr::Output {
            path: path.into(),
            source,
        }
    }
}
