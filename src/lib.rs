// evolvd - Generation lifecycle controller
// Decides when a generated code artifact is obsolete, gates regeneration behind
// approval, and keeps every generated version around for rollback.

pub mod approval;
pub mod cli;
pub mod detector;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod state;

pub use anyhow::{Context, Result};
pub use colored::Colorize;

// Re-export commonly used types
pub use approval::ApprovalGate;
pub use detector::{ObsolescenceDetector, ObsolescenceResult};
pub use error::{LifecycleError, LifecycleResult};
pub use models::{LifecycleConfig, MetricSnapshot, VersionMetadata, VersionStatus};
pub use orchestrator::LifecycleDriver;
pub use registry::{RollbackController, VersionRegistry};
pub use state::{MetricsStore, StorageLayout};
