use crate::DefsyncErr;
use crate::Result;
use crate::stats::StatsBucket;
use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use tempfile::NamedTempFile;

/// Every range processed so far, keyed by range label in processing order.
pub type Results = IndexMap<String, RangeResult>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeResult {
    pub stats: StatsBucket,
    /// Drifted records keyed by identifier; only populated in verbose mode.
    #[serde(flatten)]
    pub invalid: IndexMap<String, InvalidEntry>,
}

impl RangeResult {
    pub fn new(total_documents: u64) -> Self {
        Self {
            stats: StatsBucket::new(total_documents),
            invalid: IndexMap::new(),
        }
    }
}

/// Pre-repair snapshot of both sides of a drifted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidEntry {
    pub db: SideSnapshot,
    pub blob: SideSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideSnapshot {
    pub licensed: Option<Value>,
    #[serde(rename = "_meta")]
    pub meta: Value,
}

/// The results document on disk. Each write replaces the whole file through
/// a temporary sibling and a rename, so readers only ever see a complete
/// document.
#[derive(Debug, Clone)]
pub struct ResultsFile {
    path: PathBuf,
}

impl ResultsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn write(&self, results: &Results) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let bytes = serde_json::to_vec_pretty(results)?;
        let mut tmp =
            NamedTempFile::new_in(dir).map_err(|err| DefsyncErr::output(&self.path, err))?;
        tmp.write_all(&bytes)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|err| DefsyncErr::output(&self.path, err))?;
        tmp.persist(&self.path)
            .map_err(|err| DefsyncErr::output(&self.path, err.error))?;
        Ok(())
    }

    pub fn load(&self) -> Result<Results> {
        let bytes = std::fs::read(&self.path).map_err(|err| DefsyncErr::output(&self.path, err))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
