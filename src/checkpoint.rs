//! On-disk checkpoint for the resumable document-list fetch.
//!
//! The token client writes the list fetched so far after every page. A later
//! run finds the file, resumes at `offset`, and deletes it once the full list
//! has been fetched. The file is advisory: every IO or parse failure is logged
//! and treated as "no checkpoint", and never fails the fetch itself.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TokenConfig;
use crate::model::DocSummary;

const FILE_PREFIX: &str = ".elog.";
const FILE_SUFFIX: &str = ".doc-list-cache.json";
const NAMESPACE_SEPARATOR: &str = "@";

/// Persisted progress of a paginated list fetch.
///
/// `offset` always equals `list.len()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Documents fetched so far, in page order.
    pub list: Vec<DocSummary>,
    /// Offset of the next page to request.
    pub offset: usize,
    /// Total reported by the latest page.
    pub total: usize,
    /// Capture time in epoch milliseconds.
    pub timestamp: i64,
}

impl Checkpoint {
    /// Captures `list` and `total` now.
    #[must_use]
    pub fn new(list: Vec<DocSummary>, total: usize) -> Self {
        Self {
            offset: list.len(),
            list,
            total,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Returns true when every reported document has been fetched.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.offset >= self.total
    }
}

/// Location of one configuration's checkpoint file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Creates a store for an explicit file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates the store a token client uses for `config`.
    ///
    /// The file lives in `checkpoint_dir`, or the working directory when unset.
    #[must_use]
    pub fn for_config(config: &TokenConfig) -> Self {
        let dir = config
            .checkpoint_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let name = file_name(config.cache_path.as_deref(), &config.namespace());
        Self::new(dir.join(name))
    }

    /// Returns the checkpoint file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the checkpoint, if a readable one exists.
    #[must_use]
    pub fn load(&self) -> Option<Checkpoint> {
        if !self.path.exists() {
            return None;
        }
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "cannot read list checkpoint");
                return None;
            }
        };
        let mut checkpoint: Checkpoint = match serde_json::from_str(&content) {
            Ok(checkpoint) => checkpoint,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "cannot parse list checkpoint");
                return None;
            }
        };
        if checkpoint.offset != checkpoint.list.len() {
            warn!(
                offset = checkpoint.offset,
                fetched = checkpoint.list.len(),
                "checkpoint offset disagrees with its list, resuming after the list"
            );
            checkpoint.offset = checkpoint.list.len();
        }
        info!(
            fetched = checkpoint.list.len(),
            total = checkpoint.total,
            "resuming unfinished document list fetch"
        );
        Some(checkpoint)
    }

    /// Persists `list` and `total`.
    pub fn save(&self, list: &[DocSummary], total: usize) {
        let checkpoint = Checkpoint::new(list.to_vec(), total);
        let json = match serde_json::to_string_pretty(&checkpoint) {
            Ok(json) => json,
            Err(error) => {
                warn!(%error, "cannot serialize list checkpoint");
                return;
            }
        };
        match fs::write(&self.path, json) {
            Ok(()) => debug!(
                path = %self.path.display(),
                offset = checkpoint.offset,
                total,
                "saved list checkpoint"
            ),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "cannot save list checkpoint");
            }
        }
    }

    /// Deletes the checkpoint file if it exists.
    pub fn clear(&self) {
        if !self.path.exists() {
            return;
        }
        if let Err(error) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), %error, "cannot delete list checkpoint");
        }
    }
}

/// Derives the checkpoint file name.
///
/// `cache_path = "elog-online.cache.json"` gives
/// `.elog.elog-online.cache.doc-list-cache.json`; without a cache path the
/// namespace `user/repo` gives `.elog.user@repo.doc-list-cache.json`. Slugs
/// never contain `@`, so distinct namespaces never share a file.
#[must_use]
pub fn file_name(cache_path: Option<&Path>, namespace: &str) -> String {
    let stem = cache_path
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .map(|name| name.strip_suffix(".json").unwrap_or(name).to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| namespace.replacen('/', NAMESPACE_SEPARATOR, 1));
    format!("{FILE_PREFIX}{stem}{FILE_SUFFIX}")
}
