//! Per-codebase storage layout
//!
//! ```text
//! <root>/<codebase>/
//!   metrics.json            latest run snapshot
//!   versions.json           version ledger
//!   .lock                   single-writer advisory lock
//!   versions/v<N>/source/   stored source tree
//!   versions/v<N>/bin/      stored binary
//!   current/                live workspace artifact directory
//!   bin/                    live executable
//! ```

use crate::error::{LifecycleError, LifecycleResult};
use crate::models::StorageConfig;
use std::path::{Path, PathBuf};

const METRICS_FILE: &str = "metrics.json";
const LEDGER_FILE: &str = "versions.json";
const LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    codebase: String,
    codebase_dir: PathBuf,
    workspace_dir: PathBuf,
}

impl StorageLayout {
    /// Layout rooted at `root` with the default workspace location
    pub fn new(root: impl AsRef<Path>, codebase: &str) -> LifecycleResult<Self> {
        validate_codebase_name(codebase)?;
        let codebase_dir = root.as_ref().join(codebase);
        Ok(Self {
            codebase: codebase.to_string(),
            workspace_dir: codebase_dir.join("current"),
            codebase_dir,
        })
    }

    pub fn from_config(config: &StorageConfig, codebase: &str) -> LifecycleResult<Self> {
        let mut layout = Self::new(&config.root, codebase)?;
        if let Some(workspace) = &config.workspace_dir {
            layout.workspace_dir = workspace.join(codebase);
        }
        Ok(layout)
    }

    pub fn codebase(&self) -> &str {
        &self.codebase
    }

    pub fn codebase_dir(&self) -> &Path {
        &self.codebase_dir
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.codebase_dir.join(METRICS_FILE)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.codebase_dir.join(LEDGER_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.codebase_dir.join(LOCK_FILE)
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.codebase_dir.join("versions")
    }

    pub fn version_dir(&self, version: u32) -> PathBuf {
        self.versions_dir().join(format!("v{}", version))
    }

    pub fn version_source_dir(&self, version: u32) -> PathBuf {
        self.version_dir(version).join("source")
    }

    pub fn version_bin_dir(&self, version: u32) -> PathBuf {
        self.version_dir(version).join("bin")
    }

    /// Live artifact directory, replaced wholesale on registration and rollback
    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }

    /// Live executable directory
    pub fn workspace_bin_dir(&self) -> PathBuf {
        self.codebase_dir.join("bin")
    }
}

fn validate_codebase_name(codebase: &str) -> LifecycleResult<()> {
    let valid = !codebase.is_empty()
        && codebase != "."
        && codebase != ".."
        && !codebase.contains(['/', '\\'])
        && !codebase.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(LifecycleError::Configuration(format!(
            "invalid codebase name '{}'",
            codebase
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths() {
        let layout = StorageLayout::new("/state", "docs").unwrap();
        assert_eq!(layout.metrics_path(), PathBuf::from("/state/docs/metrics.json"));
        assert_eq!(layout.ledger_path(), PathBuf::from("/state/docs/versions.json"));
        assert_eq!(
            layout.version_source_dir(3),
            PathBuf::from("/state/docs/versions/v3/source")
        );
        assert_eq!(layout.workspace_dir(), Path::new("/state/docs/current"));
        assert_eq!(layout.workspace_bin_dir(), PathBuf::from("/state/docs/bin"));
    }

    #[test]
    fn test_workspace_override() {
        let config = StorageConfig {
            root: PathBuf::from("/state"),
            workspace_dir: Some(PathBuf::from("/srv/tools")),
        };
        let layout = StorageLayout::from_config(&config, "docs").unwrap();
        assert_eq!(layout.workspace_dir(), Path::new("/srv/tools/docs"));
    }

    #[test]
    fn test_rejects_path_like_names() {
        for name in ["", "..", "a/b", "a\\b", ".hidden"] {
            assert!(
                StorageLayout::new("/state", name).is_err(),
                "'{}' should be rejected",
                name
            );
        }
    }
}
