//! Version ledger data model
//!
//! The ledger is the single source of truth for which artifact versions exist
//! and which one is active. The active version is never cached anywhere else;
//! it is resolved by scanning `versions`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lifecycle status of a generated artifact version
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Active,
    Archived,
    Failed,
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            VersionStatus::Active => "active",
            VersionStatus::Archived => "archived",
            VersionStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Where a version came from
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationProvenance {
    /// Model identifier used by the generation step
    #[serde(default)]
    pub model: Option<String>,

    /// Generation cost in USD, when the generator reports it
    #[serde(default)]
    pub cost_usd: Option<f64>,
}

impl GenerationProvenance {
    pub fn new(model: impl Into<String>, cost_usd: Option<f64>) -> Self {
        Self {
            model: Some(model.into()),
            cost_usd,
        }
    }
}

/// Lightweight checkpoint note attached to a version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub created_at: DateTime<Utc>,
    pub notes: String,
}

/// One artifact generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionMetadata {
    /// Monotonic version number, never reused
    pub version: u32,

    pub created_at: DateTime<Utc>,

    /// Stored copy of the generated source tree
    pub source_path: PathBuf,

    /// Stored copy of the compiled binary
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    pub status: VersionStatus,

    #[serde(default)]
    pub provenance: GenerationProvenance,

    pub validation_passed: bool,

    #[serde(default)]
    pub notes: Option<String>,

    /// Digest of the stored source tree (see `fsops::tree_digest`)
    #[serde(default)]
    pub source_digest: Option<String>,

    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
}

impl VersionMetadata {
    pub fn is_active(&self) -> bool {
        self.status == VersionStatus::Active
    }
}

/// Persisted ledger document for one codebase
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VersionLedger {
    #[serde(default)]
    pub codebase: String,

    /// Every known version, kept in ascending version order
    #[serde(default)]
    pub versions: Vec<VersionMetadata>,

    /// Numbers of deleted versions, so they are never handed out again
    #[serde(default)]
    pub retired_versions: Vec<u32>,
}

impl VersionLedger {
    pub fn new(codebase: impl Into<String>) -> Self {
        Self {
            codebase: codebase.into(),
            versions: Vec::new(),
            retired_versions: Vec::new(),
        }
    }

    /// `1 + max(known version numbers)`, including retired ones
    pub fn next_version(&self) -> u32 {
        self.versions
            .iter()
            .map(|v| v.version)
            .chain(self.retired_versions.iter().copied())
            .max()
            .map_or(1, |max| max + 1)
    }

    pub fn find(&self, version: u32) -> Option<&VersionMetadata> {
        self.versions.iter().find(|v| v.version == version)
    }

    pub fn find_mut(&mut self, version: u32) -> Option<&mut VersionMetadata> {
        self.versions.iter_mut().find(|v| v.version == version)
    }

    /// The active version, resolved by scanning the ledger
    pub fn active(&self) -> Option<&VersionMetadata> {
        self.versions.iter().find(|v| v.is_active())
    }

    /// Make `version` the only active entry. Returns whether anything changed.
    ///
    /// Callers must check that `version` exists first.
    pub fn activate(&mut self, version: u32) -> bool {
        let mut changed = false;
        for entry in &mut self.versions {
            if entry.version == version {
                if entry.status != VersionStatus::Active {
                    entry.status = VersionStatus::Active;
                    changed = true;
                }
            } else if entry.status == VersionStatus::Active {
                entry.status = VersionStatus::Archived;
                changed = true;
            }
        }
        changed
    }

    /// Insert keeping ascending order
    pub fn insert(&mut self, metadata: VersionMetadata) {
        let position = self
            .versions
            .iter()
            .position(|v| v.version > metadata.version)
            .unwrap_or(self.versions.len());
        self.versions.insert(position, metadata);
    }

    /// Remove an entry and retire its number
    pub fn remove(&mut self, version: u32) -> Option<VersionMetadata> {
        let index = self.versions.iter().position(|v| v.version == version)?;
        let removed = self.versions.remove(index);
        if !self.retired_versions.contains(&version) {
            self.retired_versions.push(version);
            self.retired_versions.sort_unstable();
        }
        Some(removed)
    }

    pub fn sort(&mut self) {
        self.versions.sort_by_key(|v| v.version);
    }
}
