//! Live workspace materialization

use crate::error::{LifecycleError, LifecycleResult};
use crate::models::VersionMetadata;
use crate::state::fsops::{self, StagedDir};
use crate::state::StorageLayout;
use std::path::PathBuf;

/// Replace the live workspace with a stored version
///
/// The artifact directory is swapped wholesale. The live `bin/` directory is
/// rebuilt to hold only this version's executable (or removed when the version
/// has none). Returns the live executable path.
pub fn materialize(
    metadata: &VersionMetadata,
    layout: &StorageLayout,
) -> LifecycleResult<Option<PathBuf>> {
    if !metadata.source_path.is_dir() {
        return Err(LifecycleError::Integrity(format!(
            "stored source for version {} is missing: {}",
            metadata.version,
            metadata.source_path.display()
        )));
    }

    fsops::replace_dir(&metadata.source_path, layout.workspace_dir())?;

    let bin_dir = layout.workspace_bin_dir();
    let live_binary = match &metadata.binary_path {
        Some(stored) => {
            let file_name = stored.file_name().ok_or_else(|| {
                LifecycleError::Integrity(format!(
                    "stored binary path has no file name: {}",
                    stored.display()
                ))
            })?;
            let staged = StagedDir::beside(&bin_dir)?;
            fsops::copy_executable(stored, &staged.path().join(file_name))?;
            staged.commit(&bin_dir)?;
            Some(bin_dir.join(file_name))
        }
        None => {
            fsops::remove_dir_if_exists(&bin_dir)?;
            None
        }
    };

    tracing::info!(
        codebase = layout.codebase(),
        version = metadata.version,
        workspace = %layout.workspace_dir().display(),
        "materialized version into workspace"
    );
    Ok(live_binary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerationProvenance;
    use crate::registry::VersionRegistry;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_materialize_copies_source_and_binary() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path().join("state"), "docs").unwrap();
        let mut registry = VersionRegistry::open(layout.clone()).unwrap();

        let work = temp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(work.join("README.md"), "generated").unwrap();
        let binary = temp.path().join("docgen");
        fs::write(&binary, "bin").unwrap();

        let v1 = registry
            .register_version(&work, Some(&binary), GenerationProvenance::default(), true, None)
            .unwrap();

        let live = materialize(&v1, &layout).unwrap().unwrap();

        assert_eq!(live, layout.workspace_bin_dir().join("docgen"));
        assert!(live.exists());
        assert_eq!(
            fsops::tree_digest(layout.workspace_dir()).unwrap(),
            v1.source_digest.unwrap()
        );
    }

    #[test]
    fn test_materialize_without_binary_clears_live_bin() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path().join("state"), "docs").unwrap();
        let mut registry = VersionRegistry::open(layout.clone()).unwrap();

        let work = temp.path().join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(work.join("README.md"), "generated").unwrap();

        fs::create_dir_all(layout.workspace_bin_dir()).unwrap();
        fs::write(layout.workspace_bin_dir().join("old-tool"), "stale").unwrap();

        let v1 = registry
            .register_version(&work, None, GenerationProvenance::default(), true, None)
            .unwrap();

        assert!(materialize(&v1, &layout).unwrap().is_none());
        assert!(!layout.workspace_bin_dir().exists());
    }
}
