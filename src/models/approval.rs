//! Approval request/result types
//!
//! Both are ephemeral: they live for one decision point and are never persisted
//! by the gate itself.

use super::metrics::MetricSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Coverage drop (percentage points) that makes a regeneration high risk
const HIGH_RISK_COVERAGE_DROP: f64 = 10.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Derive the risk of regenerating from the trigger reasons and the snapshots
    ///
    /// - High: regression tests failing, a large coverage drop, or three or more triggers
    /// - Medium: two triggers, or a newly introduced language
    /// - Low: everything else
    pub fn assess(
        reasons: &[String],
        current: &MetricSnapshot,
        previous: Option<&MetricSnapshot>,
    ) -> Self {
        let coverage_drop = previous
            .map(|p| p.coverage.coverage_percent - current.coverage.coverage_percent)
            .unwrap_or(0.0);

        if current.tests.regression_failed > 0
            || coverage_drop > HIGH_RISK_COVERAGE_DROP
            || reasons.len() >= 3
        {
            RiskLevel::High
        } else if reasons.len() == 2 || !current.changes.new_languages.is_empty() {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// One metric's movement between two snapshots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricDelta {
    pub name: String,
    pub previous: f64,
    pub current: f64,
}

impl MetricDelta {
    pub fn delta(&self) -> f64 {
        self.current - self.previous
    }
}

/// Side-by-side view of the headline metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsComparison {
    pub deltas: Vec<MetricDelta>,
}

impl MetricsComparison {
    pub fn between(previous: &MetricSnapshot, current: &MetricSnapshot) -> Self {
        let rows = [
            (
                "coverage_percent",
                previous.coverage.coverage_percent,
                current.coverage.coverage_percent,
            ),
            (
                "files_changed_percent",
                previous.changes.files_changed_percent,
                current.changes.files_changed_percent,
            ),
            (
                "error_rate_percent",
                previous.quality.error_rate_percent,
                current.quality.error_rate_percent,
            ),
            (
                "false_positive_estimate",
                previous.quality.false_positive_estimate,
                current.quality.false_positive_estimate,
            ),
            (
                "avg_runtime_seconds",
                previous.performance.avg_runtime_seconds,
                current.performance.avg_runtime_seconds,
            ),
        ];

        Self {
            deltas: rows
                .into_iter()
                .map(|(name, previous, current)| MetricDelta {
                    name: name.to_string(),
                    previous,
                    current,
                })
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetricDelta> {
        self.deltas.iter().find(|d| d.name == name)
    }
}

/// A request to authorize regeneration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRequest {
    /// Currently active version, if any
    pub current_version: Option<u32>,
    pub proposed_version: u32,
    pub reason: String,
    pub changes_summary: String,
    #[serde(default)]
    pub metrics_comparison: Option<MetricsComparison>,
    pub risk_level: RiskLevel,
    /// Whether this request may be approved without a reviewer
    pub auto_approve: bool,
}

/// Terminal outcome of one approval request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Rejected,
    /// Deferred to an out-of-band reviewer; the caller must not proceed
    NeedsReview,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalResult {
    pub decision: ApprovalDecision,
    #[serde(default)]
    pub notes: Option<String>,
    /// Parameter overrides for the next generation attempt
    #[serde(default)]
    pub modifications: Option<BTreeMap<String, String>>,
}

impl ApprovalResult {
    pub fn approved(notes: impl Into<String>) -> Self {
        Self {
            decision: ApprovalDecision::Approved,
            notes: Some(notes.into()),
            modifications: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            decision: ApprovalDecision::Rejected,
            notes: Some(reason.into()),
            modifications: None,
        }
    }

    pub fn needs_review(notes: impl Into<String>) -> Self {
        Self {
            decision: ApprovalDecision::NeedsReview,
            notes: Some(notes.into()),
            modifications: None,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.decision == ApprovalDecision::Approved
    }
}
