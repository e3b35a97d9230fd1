//! LifecycleDriver - one detection/approval/regeneration cycle for a codebase

use super::collaborators::{
    ArtifactBuilder, ArtifactGenerator, ArtifactRunner, BuildOutcome, GeneratedArtifact,
    GenerationRequest,
};
use crate::approval::{format_approval_summary, ApprovalGate};
use crate::detector::{known_languages, staleness_since, ObsolescenceDetector, ObsolescenceResult};
use crate::error::{LifecycleError, LifecycleResult};
use crate::models::{
    ApprovalDecision, ApprovalRequest, ApprovalResult, LifecycleConfig, MetricSnapshot,
    MetricsComparison, RiskLevel, VersionMetadata,
};
use crate::registry::{workspace, VersionRegistry};
use crate::state::{fsops, CodebaseLock, MetricsStore, StorageLayout};
use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Input for one cycle
#[derive(Debug, Clone)]
pub struct CycleInput {
    /// Telemetry from the run that just finished
    pub snapshot: MetricSnapshot,
    /// Target codebase the artifact documents
    pub target_path: PathBuf,
    /// Whether a reviewer can be asked right now
    pub interactive: bool,
}

/// What the cycle ended up doing
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Nothing to do: first run, fresh, or suppressed
    NoAction,
    /// Regeneration deferred to an out-of-band reviewer
    AwaitingReview,
    Rejected,
    /// A new version was registered, activated and materialized
    Regenerated { version: VersionMetadata },
    /// Generated source did not build; kept as a failed version
    BuildFailed { version: VersionMetadata, output: String },
    /// Built artifact failed its validation run; kept as a failed version
    ValidationFailed { version: VersionMetadata, output: String },
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub detection: ObsolescenceResult,
    pub request: Option<ApprovalRequest>,
    pub approval: Option<ApprovalResult>,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    /// Surface validation failures as an error for callers that want one
    pub fn validation_error(&self) -> Option<LifecycleError> {
        match &self.outcome {
            CycleOutcome::BuildFailed { version, output }
            | CycleOutcome::ValidationFailed { version, output } => {
                Some(LifecycleError::ValidationFailure(format!(
                    "version {}: {}",
                    version.version, output
                )))
            }
            _ => None,
        }
    }
}

/// Drives detection, approval and regeneration for a single codebase
pub struct LifecycleDriver {
    config: LifecycleConfig,
    layout: StorageLayout,
    detector: ObsolescenceDetector,
    gate: ApprovalGate,
    generator: Box<dyn ArtifactGenerator>,
    builder: Box<dyn ArtifactBuilder>,
    runner: Box<dyn ArtifactRunner>,
}

impl LifecycleDriver {
    pub fn new(
        config: LifecycleConfig,
        codebase: &str,
        gate: ApprovalGate,
        generator: Box<dyn ArtifactGenerator>,
        builder: Box<dyn ArtifactBuilder>,
        runner: Box<dyn ArtifactRunner>,
    ) -> LifecycleResult<Self> {
        config.validate()?;
        let layout = StorageLayout::from_config(&config.storage, codebase)?;
        let detector = ObsolescenceDetector::new(config.thresholds.clone())?;
        Ok(Self {
            config,
            layout,
            detector,
            gate,
            generator,
            builder,
            runner,
        })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Run one full cycle under the codebase lock
    pub async fn run_cycle(&mut self, input: CycleInput) -> Result<CycleReport> {
        let _lock = CodebaseLock::acquire_async(&self.layout).await?;

        let store = MetricsStore::new(&self.layout);
        let previous = store.load();

        let mut snapshot = input.snapshot;
        snapshot.codebase = self.layout.codebase().to_string();
        snapshot.staleness = staleness_since(previous.as_ref(), snapshot.captured_at);
        snapshot.changes.known_languages = known_languages(&snapshot, previous.as_ref());

        let mut registry = VersionRegistry::open(self.layout.clone())?;
        let last_regeneration = registry.active_version().map(|v| v.created_at);

        let detection = self
            .detector
            .detect(&snapshot, previous.as_ref(), last_regeneration);
        tracing::info!(
            codebase = self.layout.codebase(),
            obsolete = detection.is_obsolete,
            regenerate = detection.should_regenerate,
            reasons = ?detection.reasons,
            "obsolescence check"
        );

        if !detection.should_regenerate {
            store.save(&snapshot)?;
            return Ok(CycleReport {
                detection,
                request: None,
                approval: None,
                outcome: CycleOutcome::NoAction,
            });
        }

        let request = build_request(&detection, &snapshot, previous.as_ref(), &registry);
        let approval = self.gate.request_approval(&request, input.interactive);
        tracing::info!(
            codebase = self.layout.codebase(),
            "{}",
            format_approval_summary(&request, &approval)
        );

        let outcome = match approval.decision {
            ApprovalDecision::NeedsReview => CycleOutcome::AwaitingReview,
            ApprovalDecision::Rejected => CycleOutcome::Rejected,
            ApprovalDecision::Approved => {
                self.regenerate(&mut registry, &detection, &approval, &input.target_path)
                    .await?
            }
        };

        store.save(&snapshot)?;
        Ok(CycleReport {
            detection,
            request: Some(request),
            approval: Some(approval),
            outcome,
        })
    }

    async fn regenerate(
        &self,
        registry: &mut VersionRegistry,
        detection: &ObsolescenceResult,
        approval: &ApprovalResult,
        target_path: &Path,
    ) -> Result<CycleOutcome> {
        let limit = self.config.commands.timeout();
        let scratch = tempfile::Builder::new()
            .prefix(".generate-")
            .tempdir_in(self.layout.codebase_dir())
            .context("Failed to create generation scratch directory")?;
        let output_dir = scratch.path().join("generated");
        std::fs::create_dir_all(&output_dir)?;

        let generation = GenerationRequest {
            codebase: self.layout.codebase().to_string(),
            target_path: target_path.to_path_buf(),
            output_dir,
            reasons: detection.reasons.clone(),
            parameters: approval.modifications.clone().unwrap_or_default(),
            base_version: registry.active_version().map(|v| v.version),
        };

        let GeneratedArtifact {
            source_tree,
            provenance,
        } = with_timeout("generate", limit, self.generator.generate(&generation)).await??;

        // Keep the tree as generated, before build output lands in it
        let pristine = scratch.path().join("pristine");
        fsops::copy_dir_all(&source_tree, &pristine)?;

        let executable = match with_timeout("build", limit, self.builder.build(&source_tree))
            .await??
        {
            BuildOutcome::Built { executable } => executable,
            BuildOutcome::Failed { output } => {
                let version = registry.record_failed_version(
                    &pristine,
                    None,
                    provenance,
                    Some(format!("Build failed: {}", output)),
                )?;
                return Ok(CycleOutcome::BuildFailed { version, output });
            }
        };

        let run = with_timeout(
            "validation run",
            limit,
            self.runner.run(&executable, target_path),
        )
        .await??;

        if !run.success {
            let version = registry.record_failed_version(
                &pristine,
                Some(&executable),
                provenance,
                Some(format!("Validation failed: {}", run.output)),
            )?;
            return Ok(CycleOutcome::ValidationFailed {
                version,
                output: run.output,
            });
        }

        let notes = format!("Regenerated: {}", detection.reasons.join("; "));
        let version = registry.register_version(
            &pristine,
            Some(&executable),
            provenance,
            true,
            Some(notes),
        )?;
        workspace::materialize(&version, registry.layout())?;

        Ok(CycleOutcome::Regenerated { version })
    }
}

/// Assemble the approval request for an obsolete verdict
pub fn build_request(
    detection: &ObsolescenceResult,
    current: &MetricSnapshot,
    previous: Option<&MetricSnapshot>,
    registry: &VersionRegistry,
) -> ApprovalRequest {
    let risk_level = RiskLevel::assess(&detection.reasons, current, previous);
    let current_version = registry.active_version().map(|v| v.version);

    let mut changes_summary = format!(
        "{} changed, {} added, {} deleted",
        current.changes.files_changed, current.changes.files_added, current.changes.files_deleted
    );
    if !current.changes.new_languages.is_empty() {
        changes_summary.push_str(&format!(
            "; new languages: {}",
            current.changes.new_languages.join(", ")
        ));
    }
    if !current.patterns.new_patterns.is_empty() {
        changes_summary.push_str(&format!(
            "; new patterns: {}",
            current.patterns.new_patterns.join(", ")
        ));
    }

    ApprovalRequest {
        current_version,
        proposed_version: registry.get_next_version(),
        reason: detection.reasons.join("; "),
        changes_summary,
        metrics_comparison: previous.map(|p| MetricsComparison::between(p, current)),
        risk_level,
        // Only when an active version exists to roll back to
        auto_approve: current_version.is_some(),
    }
}

async fn with_timeout<F, T>(step: &str, limit: Duration, future: F) -> LifecycleResult<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| LifecycleError::Timeout {
            step: step.to_string(),
            limit,
        })
}
