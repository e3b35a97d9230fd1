pub mod approval;
pub mod config;
pub mod metrics;
pub mod version;

pub use approval::{
    ApprovalDecision, ApprovalRequest, ApprovalResult, MetricDelta, MetricsComparison, RiskLevel,
};
pub use config::{
    ApprovalConfig, CommandsConfig, CooldownAnchor, LifecycleConfig, ObsolescenceThresholds,
    StorageConfig, CONFIG_FILE,
};
pub use metrics::{
    ChangeMetrics, CoverageMetrics, FeedbackOverrides, MetricSnapshot, PatternMetrics,
    PerformanceMetrics, QualityMetrics, StalenessMetrics, TestMetrics, UserFeedback,
};
pub use version::{
    Checkpoint, GenerationProvenance, VersionLedger, VersionMetadata, VersionStatus,
};
