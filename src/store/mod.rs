//! File-backed JSON repositories
//!
//! Every store keeps its records in memory behind a `tokio::sync::RwLock`
//! and persists each record to its own JSON file fire-and-forget. Layout:
//!
//! ```text
//! ~/.piiguard/
//! ├── sources/<id>.json
//! ├── scans/<id>.json
//! ├── inventories/<id>.json
//! ├── entities/<id>.json
//! ├── fields/<id>.json
//! ├── classifications/<id>.json
//! ├── dsrs/<id>.json
//! └── dsr_tasks/<id>.json
//! ```
//!
//! Single-record create/update is atomic under the store lock; multi-record
//! updates (inventory stats) are last-writer-wins. Corrupt files are
//! skipped with a warning at load time.

mod catalog;
mod dsr;
mod scans;
mod sources;

pub use catalog::CatalogStore;
pub use dsr::DsrStore;
pub use scans::ScanStore;
pub use sources::SourceStore;

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Load all JSON files from a directory into a Vec
pub(crate) fn load_json_files<T: serde::de::DeserializeOwned>(dir: &Path) -> Vec<T> {
    let mut items = Vec::new();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read directory {}: {}", dir.display(), e);
            }
            return items;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}", path.display(), e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
            }
        }
    }

    items
}

/// Persist one record to `<dir>/<id>.json` (fire-and-forget)
pub(crate) fn persist_record<T: Serialize + Send + 'static>(dir: PathBuf, id: String, record: T) {
    tokio::spawn(async move {
        let path = dir.join(format!("{}.json", id));
        match serde_json::to_string_pretty(&record) {
            Ok(json) => {
                if let Err(e) = tokio::fs::write(&path, json).await {
                    tracing::warn!("Failed to persist {}: {}", id, e);
                }
            }
            Err(e) => {
                tracing::warn!("Failed to serialize {}: {}", id, e);
            }
        }
    });
}
