//! RollbackController - move the active pointer back through the ledger

use super::version_registry::VersionRegistry;
use super::workspace;
use crate::error::{LifecycleError, LifecycleResult};
use crate::models::{VersionMetadata, VersionStatus};
use crate::state::fsops;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One ledger entry with a human-readable description of what it changed
#[derive(Debug, Clone, Serialize)]
pub struct RollbackHistoryEntry {
    pub version: u32,
    pub status: VersionStatus,
    pub created_at: DateTime<Utc>,
    pub description: String,
}

/// Rollback operations over a registry
pub struct RollbackController<'a> {
    registry: &'a mut VersionRegistry,
}

impl<'a> RollbackController<'a> {
    pub fn new(registry: &'a mut VersionRegistry) -> Self {
        Self { registry }
    }

    /// True when some archived (and therefore non-active) version exists
    pub fn can_rollback(&self) -> bool {
        self.registry
            .list_versions()
            .iter()
            .any(|v| v.status == VersionStatus::Archived)
    }

    /// Archived and active versions, newest first
    pub fn list_rollback_targets(&self) -> Vec<&VersionMetadata> {
        self.registry
            .list_versions()
            .iter()
            .rev()
            .filter(|v| matches!(v.status, VersionStatus::Archived | VersionStatus::Active))
            .collect()
    }

    /// Activate `version`, optionally restoring its files into the live workspace
    ///
    /// Fails with an integrity error when the version's stored files are gone
    /// or no longer match the digest recorded at registration.
    pub fn rollback_to_version(
        &mut self,
        version: u32,
        restore_to_workspace: bool,
    ) -> LifecycleResult<VersionMetadata> {
        let metadata = self.registry.get_version(version)?.clone();
        verify_storage(&metadata)?;

        let previous_active = self.registry.active_version().map(|v| v.version);
        let before = self.registry.ledger().clone();
        self.registry.set_active_version(version)?;

        if restore_to_workspace {
            if let Err(e) = workspace::materialize(&metadata, self.registry.layout()) {
                if let Err(revert) = self.registry.restore_ledger(before) {
                    tracing::error!(
                        codebase = self.registry.layout().codebase(),
                        version,
                        error = %revert,
                        "failed to restore ledger after aborted rollback"
                    );
                }
                return Err(e);
            }
        }

        tracing::info!(
            codebase = self.registry.layout().codebase(),
            from = ?previous_active,
            to = version,
            restored = restore_to_workspace,
            "rolled back"
        );
        self.registry.get_version(version).cloned()
    }

    /// Roll back to the newest non-failed version older than the active one
    pub fn rollback_to_previous(
        &mut self,
        restore_to_workspace: bool,
    ) -> LifecycleResult<VersionMetadata> {
        let active = self
            .registry
            .active_version()
            .map(|v| v.version)
            .ok_or_else(|| LifecycleError::NotFound("no active version".to_string()))?;

        let target = self
            .registry
            .list_versions()
            .iter()
            .rev()
            .find(|v| v.version < active && v.status != VersionStatus::Failed)
            .map(|v| v.version)
            .ok_or_else(|| {
                LifecycleError::NotFound(format!(
                    "no version older than {} (already at the oldest version)",
                    active
                ))
            })?;

        self.rollback_to_version(target, restore_to_workspace)
    }

    /// Annotate the active version as a checkpoint; no new version is created
    pub fn create_rollback_point(&mut self, notes: &str) -> LifecycleResult<VersionMetadata> {
        let active = self
            .registry
            .active_version()
            .map(|v| v.version)
            .ok_or_else(|| LifecycleError::NotFound("no active version".to_string()))?;

        let updated = self.registry.add_checkpoint(active, notes)?;
        tracing::info!(
            codebase = self.registry.layout().codebase(),
            version = active,
            "created rollback point"
        );
        Ok(updated)
    }

    /// Every version with a description of the change it introduced
    pub fn get_rollback_history(&self) -> Vec<RollbackHistoryEntry> {
        let mut history = Vec::new();
        let mut previous: Option<u32> = None;

        for metadata in self.registry.list_versions() {
            let description = match previous {
                None => "Initial version".to_string(),
                Some(prior) => metadata
                    .notes
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| format!("Regenerated from version {}", prior)),
            };

            history.push(RollbackHistoryEntry {
                version: metadata.version,
                status: metadata.status,
                created_at: metadata.created_at,
                description,
            });
            previous = Some(metadata.version);
        }

        history
    }
}

fn verify_storage(metadata: &VersionMetadata) -> LifecycleResult<()> {
    if !metadata.source_path.is_dir() {
        return Err(LifecycleError::Integrity(format!(
            "storage for version {} is missing: {}",
            metadata.version,
            metadata.source_path.display()
        )));
    }

    if let Some(binary) = &metadata.binary_path {
        if !binary.is_file() {
            return Err(LifecycleError::Integrity(format!(
                "binary for version {} is missing: {}",
                metadata.version,
                binary.display()
            )));
        }
    }

    if let Some(expected) = &metadata.source_digest {
        let actual = fsops::tree_digest(&metadata.source_path)?;
        if &actual != expected {
            return Err(LifecycleError::Integrity(format!(
                "stored source for version {} was modified (expected {}, found {})",
                metadata.version, expected, actual
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GenerationProvenance;
    use crate::state::StorageLayout;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn setup_with_versions(count: u32) -> (TempDir, VersionRegistry, PathBuf) {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path().join("state"), "docs").unwrap();
        let mut registry = VersionRegistry::open(layout).unwrap();
        let work = temp.path().join("work");
        fs::create_dir_all(&work).unwrap();

        for n in 1..=count {
            write_generation(&work, n);
            registry
                .register_version(&work, None, GenerationProvenance::default(), true, None)
                .unwrap();
        }
        (temp, registry, work)
    }

    fn write_generation(work: &Path, n: u32) {
        fs::write(work.join("main.rs"), format!("// generation {}\n", n)).unwrap();
    }

    #[test]
    fn test_can_rollback_requires_archived_version() {
        let (_temp, mut registry, _work) = setup_with_versions(1);
        assert!(!RollbackController::new(&mut registry).can_rollback());

        let (_temp, mut registry, _work) = setup_with_versions(2);
        assert!(RollbackController::new(&mut registry).can_rollback());
    }

    #[test]
    fn test_rollback_targets_newest_first() {
        let (_temp, mut registry, work) = setup_with_versions(3);
        registry
            .record_failed_version(&work, None, GenerationProvenance::default(), None)
            .unwrap();

        let controller = RollbackController::new(&mut registry);
        let targets: Vec<u32> = controller
            .list_rollback_targets()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(targets, vec![3, 2, 1]);
    }

    #[test]
    fn test_rollback_to_previous_walks_back_then_stops() {
        let (_temp, mut registry, _work) = setup_with_versions(3);
        let mut controller = RollbackController::new(&mut registry);

        assert_eq!(controller.rollback_to_previous(false).unwrap().version, 2);
        assert_eq!(controller.rollback_to_previous(false).unwrap().version, 1);
        let err = controller.rollback_to_previous(false).unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));

        assert_eq!(registry.active_version().unwrap().version, 1);
    }

    #[test]
    fn test_rollback_skips_failed_versions() {
        let (_temp, mut registry, work) = setup_with_versions(1);
        registry
            .record_failed_version(&work, None, GenerationProvenance::default(), None)
            .unwrap();
        registry
            .register_version(&work, None, GenerationProvenance::default(), true, None)
            .unwrap();

        let mut controller = RollbackController::new(&mut registry);
        assert_eq!(controller.rollback_to_previous(false).unwrap().version, 1);
    }

    #[test]
    fn test_rollback_with_missing_storage_is_fatal() {
        let (_temp, mut registry, _work) = setup_with_versions(2);
        let v1_source = registry.get_version(1).unwrap().source_path.clone();
        fs::remove_dir_all(&v1_source).unwrap();

        let err = RollbackController::new(&mut registry)
            .rollback_to_version(1, false)
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Integrity(_)));
        assert_eq!(registry.active_version().unwrap().version, 2);
    }

    #[test]
    fn test_rollback_with_tampered_storage_is_fatal() {
        let (_temp, mut registry, _work) = setup_with_versions(2);
        let v1_source = registry.get_version(1).unwrap().source_path.clone();
        fs::write(v1_source.join("main.rs"), "// edited by hand\n").unwrap();

        let err = RollbackController::new(&mut registry)
            .rollback_to_version(1, true)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Integrity(_)));
    }

    #[test]
    fn test_rollback_unknown_version() {
        let (_temp, mut registry, _work) = setup_with_versions(1);
        let err = RollbackController::new(&mut registry)
            .rollback_to_version(7, false)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(_)));
    }

    #[test]
    fn test_rollback_restores_workspace() {
        let (_temp, mut registry, _work) = setup_with_versions(2);
        let layout = registry.layout().clone();

        RollbackController::new(&mut registry)
            .rollback_to_version(1, true)
            .unwrap();

        assert_eq!(
            fs::read_to_string(layout.workspace_dir().join("main.rs")).unwrap(),
            "// generation 1\n"
        );
    }

    #[test]
    fn test_failed_restore_keeps_previous_active_version() {
        let (_temp, mut registry, _work) = setup_with_versions(2);
        let layout = registry.layout().clone();
        // A plain file where the workspace directory should be
        fs::write(layout.workspace_dir(), "not a directory").unwrap();

        let err = RollbackController::new(&mut registry)
            .rollback_to_version(1, true)
            .unwrap_err();

        assert!(matches!(err, LifecycleError::TransientIo { .. }));
        assert_eq!(registry.active_version().unwrap().version, 2);
        let reopened = VersionRegistry::open(layout).unwrap();
        assert_eq!(reopened.active_version().unwrap().version, 2);
    }

    #[test]
    fn test_rollback_with_missing_binary_is_fatal() {
        let (temp, mut registry, work) = setup_with_versions(1);
        let binary = temp.path().join("docgen");
        fs::write(&binary, "binary").unwrap();
        registry
            .register_version(&work, Some(&binary), GenerationProvenance::default(), true, None)
            .unwrap();
        registry
            .register_version(&work, None, GenerationProvenance::default(), true, None)
            .unwrap();

        let stored = registry.get_version(2).unwrap().binary_path.clone().unwrap();
        fs::remove_file(&stored).unwrap();

        let err = RollbackController::new(&mut registry)
            .rollback_to_version(2, true)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Integrity(ref m) if m.contains("binary")));
        assert_eq!(registry.active_version().unwrap().version, 3);
    }

    #[test]
    fn test_create_rollback_point_annotates_active() {
        let (_temp, mut registry, _work) = setup_with_versions(2);
        let updated = RollbackController::new(&mut registry)
            .create_rollback_point("known good")
            .unwrap();

        assert_eq!(updated.version, 2);
        assert_eq!(updated.checkpoints[0].notes, "known good");
        assert_eq!(registry.list_versions().len(), 2);
    }

    #[test]
    fn test_history_descriptions() {
        let (_temp, mut registry, work) = setup_with_versions(2);
        registry
            .register_version(
                &work,
                None,
                GenerationProvenance::default(),
                true,
                Some("Added Go support".to_string()),
            )
            .unwrap();

        let history = RollbackController::new(&mut registry).get_rollback_history();
        let descriptions: Vec<&str> = history.iter().map(|h| h.description.as_str()).collect();
        assert_eq!(
            descriptions,
            vec![
                "Initial version",
                "Regenerated from version 1",
                "Added Go support"
            ]
        );
    }
}
