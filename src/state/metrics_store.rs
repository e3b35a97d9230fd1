//! MetricsStore - single-slot snapshot persistence

use super::fsops::write_json_atomic;
use super::layout::StorageLayout;
use crate::error::LifecycleResult;
use crate::models::MetricSnapshot;
use std::fs;
use std::path::PathBuf;

/// Latest run snapshot for one codebase
pub struct MetricsStore {
    path: PathBuf,
    codebase: String,
}

impl MetricsStore {
    pub fn new(layout: &StorageLayout) -> Self {
        Self {
            path: layout.metrics_path(),
            codebase: layout.codebase().to_string(),
        }
    }

    /// Load the stored snapshot
    ///
    /// Returns `None` on first run. A document that cannot be read or parsed is
    /// logged, moved aside to `metrics.json.bak`, and also treated as `None`.
    /// Callers must hold the codebase lock.
    pub fn load(&self) -> Option<MetricSnapshot> {
        self.read(true)
    }

    /// Like `load`, but leaves a corrupt document where it is
    pub fn peek(&self) -> Option<MetricSnapshot> {
        self.read(false)
    }

    fn read(&self, back_up_corrupt: bool) -> Option<MetricSnapshot> {
        if !self.path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(
                    codebase = %self.codebase,
                    path = %self.path.display(),
                    error = %e,
                    "failed to read metrics, treating as first run"
                );
                return None;
            }
        };

        match serde_json::from_str::<MetricSnapshot>(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(
                    codebase = %self.codebase,
                    error = %e,
                    "failed to parse metrics.json, treating as first run"
                );

                if back_up_corrupt {
                    let backup_path = self.path.with_extension("json.bak");
                    if let Err(backup_err) = fs::rename(&self.path, &backup_path) {
                        tracing::warn!(error = %backup_err, "failed to back up corrupt metrics file");
                    }
                }
                None
            }
        }
    }

    /// Overwrite the stored snapshot
    pub fn save(&self, snapshot: &MetricSnapshot) -> LifecycleResult<()> {
        write_json_atomic(&self.path, snapshot)?;
        tracing::debug!(codebase = %self.codebase, "saved metrics snapshot");
        Ok(())
    }

    /// Store `current` and hand back what it superseded
    pub fn replace(&self, current: &MetricSnapshot) -> LifecycleResult<Option<MetricSnapshot>> {
        let previous = self.load();
        self.save(current)?;
        Ok(previous)
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}
