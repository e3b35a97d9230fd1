//! VersionRegistry - ledger of generated artifact versions

use crate::error::{IoContext, LifecycleError, LifecycleResult};
use crate::models::{
    Checkpoint, GenerationProvenance, VersionLedger, VersionMetadata, VersionStatus,
};
use crate::state::fsops::{self, StagedDir};
use crate::state::StorageLayout;
use chrono::Utc;
use std::path::Path;

/// Authoritative record of every artifact version for one codebase
///
/// Every mutation is applied to a copy of the ledger, written to disk, and only
/// then adopted in memory, so a failed write never leaves the two out of step.
pub struct VersionRegistry {
    layout: StorageLayout,
    ledger: VersionLedger,
}

impl VersionRegistry {
    /// Load the ledger for a codebase, starting empty if none exists yet
    pub fn open(layout: StorageLayout) -> LifecycleResult<Self> {
        let path = layout.ledger_path();
        let ledger = if path.exists() {
            let content = std::fs::read_to_string(&path).at_path(&path)?;
            let mut ledger: VersionLedger = serde_json::from_str(&content).map_err(|e| {
                LifecycleError::Integrity(format!(
                    "version ledger {} is unreadable: {}",
                    path.display(),
                    e
                ))
            })?;
            ledger.sort();
            ledger
        } else {
            VersionLedger::new(layout.codebase())
        };

        let active_count = ledger.versions.iter().filter(|v| v.is_active()).count();
        if active_count > 1 {
            tracing::warn!(
                codebase = layout.codebase(),
                active_count,
                "ledger has more than one active version; the next activation will repair it"
            );
        }

        Ok(Self { layout, ledger })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn ledger(&self) -> &VersionLedger {
        &self.ledger
    }

    /// Next unused version number, derived from the ledger alone
    pub fn get_next_version(&self) -> u32 {
        self.ledger.next_version()
    }

    /// All versions in ascending order
    pub fn list_versions(&self) -> &[VersionMetadata] {
        &self.ledger.versions
    }

    pub fn get_version(&self, version: u32) -> LifecycleResult<&VersionMetadata> {
        self.ledger
            .find(version)
            .ok_or_else(|| LifecycleError::NotFound(format!("version {}", version)))
    }

    pub fn active_version(&self) -> Option<&VersionMetadata> {
        self.ledger.active()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Store a validated generation and make it the active version
    pub fn register_version(
        &mut self,
        source_tree: &Path,
        binary: Option<&Path>,
        provenance: GenerationProvenance,
        validation_passed: bool,
        notes: Option<String>,
    ) -> LifecycleResult<VersionMetadata> {
        let metadata = self.store_version(
            source_tree,
            binary,
            provenance,
            validation_passed,
            notes,
            VersionStatus::Archived,
        )?;
        let version = metadata.version;

        let mut next = self.ledger.clone();
        next.insert(metadata);
        next.activate(version);

        if let Err(e) = self.commit(next) {
            self.discard_storage(version);
            return Err(e);
        }

        tracing::info!(codebase = self.layout.codebase(), version, "registered new active version");
        self.get_version(version).cloned()
    }

    /// Keep a generation that failed validation for inspection, without activating it
    pub fn record_failed_version(
        &mut self,
        source_tree: &Path,
        binary: Option<&Path>,
        provenance: GenerationProvenance,
        notes: Option<String>,
    ) -> LifecycleResult<VersionMetadata> {
        let metadata = self.store_version(
            source_tree,
            binary,
            provenance,
            false,
            notes,
            VersionStatus::Failed,
        )?;
        let version = metadata.version;

        let mut next = self.ledger.clone();
        next.insert(metadata);

        if let Err(e) = self.commit(next) {
            self.discard_storage(version);
            return Err(e);
        }

        tracing::warn!(codebase = self.layout.codebase(), version, "recorded failed generation");
        self.get_version(version).cloned()
    }

    /// Copy source (and binary) into version-scoped storage
    fn store_version(
        &self,
        source_tree: &Path,
        binary: Option<&Path>,
        provenance: GenerationProvenance,
        validation_passed: bool,
        notes: Option<String>,
        status: VersionStatus,
    ) -> LifecycleResult<VersionMetadata> {
        let version = self.get_next_version();
        let version_dir = self.layout.version_dir(version);

        let staged = StagedDir::beside(&version_dir)?;
        let staged_source = staged.path().join("source");
        fsops::copy_dir_all(source_tree, &staged_source)?;
        let source_digest = fsops::tree_digest(&staged_source)?;

        let binary_path = match binary {
            Some(binary) => {
                let file_name = binary.file_name().ok_or_else(|| {
                    LifecycleError::Integrity(format!(
                        "binary path has no file name: {}",
                        binary.display()
                    ))
                })?;
                fsops::copy_executable(binary, &staged.path().join("bin").join(file_name))?;
                Some(self.layout.version_bin_dir(version).join(file_name))
            }
            None => None,
        };

        staged.commit(&version_dir)?;

        Ok(VersionMetadata {
            version,
            created_at: Utc::now(),
            source_path: self.layout.version_source_dir(version),
            binary_path,
            status,
            provenance,
            validation_passed,
            notes,
            source_digest: Some(source_digest),
            checkpoints: Vec::new(),
        })
    }

    // =========================================================================
    // Status Management
    // =========================================================================

    /// Make `version` the only active version; repeated calls are no-ops
    pub fn set_active_version(&mut self, version: u32) -> LifecycleResult<()> {
        let target = self.get_version(version)?;
        if target.status == VersionStatus::Failed {
            tracing::warn!(
                codebase = self.layout.codebase(),
                version,
                "activating a version that failed validation"
            );
        }

        let mut next = self.ledger.clone();
        if next.activate(version) {
            self.commit(next)?;
            tracing::info!(codebase = self.layout.codebase(), version, "activated version");
        }
        Ok(())
    }

    /// Force `version` to archived
    ///
    /// Archiving the active version hands the active pointer to the newest other
    /// archived version; with no such version the call fails instead of leaving
    /// the codebase without an active artifact.
    pub fn archive_version(&mut self, version: u32) -> LifecycleResult<()> {
        let target = self.get_version(version)?;
        if target.status == VersionStatus::Archived {
            return Ok(());
        }

        let successor = if target.is_active() {
            let successor = self
                .ledger
                .versions
                .iter()
                .rev()
                .find(|v| v.version != version && v.status == VersionStatus::Archived)
                .map(|v| v.version)
                .ok_or_else(|| {
                    LifecycleError::Integrity(format!(
                        "version {} is the only activatable version and cannot be archived",
                        version
                    ))
                })?;
            Some(successor)
        } else {
            None
        };

        let mut next = self.ledger.clone();
        if let Some(entry) = next.find_mut(version) {
            entry.status = VersionStatus::Archived;
        }
        if let Some(successor) = successor {
            next.activate(successor);
        }
        self.commit(next)?;

        tracing::info!(
            codebase = self.layout.codebase(),
            version,
            promoted = ?successor,
            "archived version"
        );
        Ok(())
    }

    /// Permanently remove a non-active version and its storage
    pub fn delete_version(&mut self, version: u32) -> LifecycleResult<()> {
        if self.get_version(version)?.is_active() {
            return Err(LifecycleError::Integrity(format!(
                "version {} is active and cannot be deleted",
                version
            )));
        }

        fsops::remove_dir_if_exists(&self.layout.version_dir(version))?;

        let mut next = self.ledger.clone();
        next.remove(version);
        self.commit(next)?;

        tracing::info!(codebase = self.layout.codebase(), version, "deleted version");
        Ok(())
    }

    /// Attach a checkpoint note to a version
    pub fn add_checkpoint(
        &mut self,
        version: u32,
        notes: impl Into<String>,
    ) -> LifecycleResult<VersionMetadata> {
        self.get_version(version)?;

        let mut next = self.ledger.clone();
        if let Some(entry) = next.find_mut(version) {
            entry.checkpoints.push(Checkpoint {
                created_at: Utc::now(),
                notes: notes.into(),
            });
        }
        self.commit(next)?;
        self.get_version(version).cloned()
    }

    /// Put back a ledger captured before a multi-step operation that failed
    pub(crate) fn restore_ledger(&mut self, ledger: VersionLedger) -> LifecycleResult<()> {
        if ledger == self.ledger {
            return Ok(());
        }
        self.commit(ledger)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    fn commit(&mut self, next: VersionLedger) -> LifecycleResult<()> {
        fsops::write_json_atomic(&self.layout.ledger_path(), &next)?;
        self.ledger = next;
        Ok(())
    }

    fn discard_storage(&self, version: u32) {
        let dir = self.layout.version_dir(version);
        if let Err(e) = fsops::remove_dir_if_exists(&dir) {
            tracing::warn!(path = %dir.display(), error = %e, "failed to clean up version storage");
        }
    }
}
