//! Run telemetry snapshot
//!
//! One `MetricSnapshot` is produced per run of the generated artifact. The
//! metrics store keeps only the latest one per codebase; whatever it replaces
//! becomes the "previous" snapshot for the next obsolescence check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One measurement of run telemetry for a target codebase
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricSnapshot {
    /// Codebase identifier this snapshot belongs to
    #[serde(default)]
    pub codebase: String,

    /// When the snapshot was captured
    pub captured_at: DateTime<Utc>,

    #[serde(default)]
    pub coverage: CoverageMetrics,

    #[serde(default)]
    pub changes: ChangeMetrics,

    #[serde(default)]
    pub quality: QualityMetrics,

    #[serde(default)]
    pub performance: PerformanceMetrics,

    #[serde(default)]
    pub staleness: StalenessMetrics,

    #[serde(default)]
    pub patterns: PatternMetrics,

    #[serde(default)]
    pub tests: TestMetrics,

    #[serde(default)]
    pub user_feedback: UserFeedback,
}

impl MetricSnapshot {
    /// Create an empty snapshot captured now, with the last-run timestamp set to now
    pub fn new(codebase: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            codebase: codebase.into(),
            captured_at: now,
            coverage: CoverageMetrics::default(),
            changes: ChangeMetrics::default(),
            quality: QualityMetrics::default(),
            performance: PerformanceMetrics::default(),
            staleness: StalenessMetrics {
                last_run_timestamp: now.to_rfc3339(),
                days_since_last_run: 0,
            },
            patterns: PatternMetrics::default(),
            tests: TestMetrics::default(),
            user_feedback: UserFeedback::default(),
        }
    }

    /// Parsed last-run timestamp, `None` when the stored text is corrupt
    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.staleness.last_run_timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Format snapshot for display
    pub fn format_summary(&self) -> String {
        format!(
            r#"Snapshot for {} ({})
  Coverage:  {:.1}% ({}/{} files documented)
  Changes:   {:.1}% ({} changed, {} added, {} deleted)
  Quality:   {} errors ({:.1}%), {} warnings, ~{} false positives
  Staleness: {} days since last run
  Tests:     {} passed, {} failed
"#,
            self.codebase,
            self.captured_at.format("%Y-%m-%d %H:%M:%S"),
            self.coverage.coverage_percent,
            self.coverage.files_documented,
            self.coverage.files_total,
            self.changes.files_changed_percent,
            self.changes.files_changed,
            self.changes.files_added,
            self.changes.files_deleted,
            self.quality.error_count,
            self.quality.error_rate_percent,
            self.quality.warning_count,
            self.quality.false_positive_estimate,
            self.staleness.days_since_last_run,
            self.tests.regression_passed,
            self.tests.regression_failed,
        )
    }
}

/// Documentation coverage of the target codebase
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CoverageMetrics {
    pub files_total: u64,
    pub files_analyzed: u64,
    pub files_documented: u64,
    pub coverage_percent: f64,
}

impl CoverageMetrics {
    /// Build coverage counts and derive the percentage (0 when nothing was analyzed)
    pub fn from_counts(files_total: u64, files_analyzed: u64, files_documented: u64) -> Self {
        let coverage_percent = if files_analyzed == 0 {
            0.0
        } else {
            files_documented as f64 / files_analyzed as f64 * 100.0
        };
        Self {
            files_total,
            files_analyzed,
            files_documented,
            coverage_percent,
        }
    }
}

/// How much of the codebase moved since the previous run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeMetrics {
    pub files_changed: u64,
    pub files_added: u64,
    pub files_deleted: u64,
    pub files_changed_percent: f64,

    /// Languages detected for the first time in this run
    #[serde(default)]
    pub new_languages: Vec<String>,

    /// Every language seen across runs so far, sorted
    #[serde(default)]
    pub known_languages: Vec<String>,
}

/// Error/warning telemetry from running the artifact
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QualityMetrics {
    pub error_count: u64,
    pub error_rate_percent: f64,
    pub warning_count: u64,
    pub false_positive_estimate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PerformanceMetrics {
    pub avg_runtime_seconds: f64,
    pub memory_mb: f64,
}

/// Time since the artifact last ran
///
/// The timestamp is kept as text so a hand-edited or truncated document still
/// deserializes; consumers fall back to "0 days" when it cannot be parsed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StalenessMetrics {
    pub last_run_timestamp: String,
    pub days_since_last_run: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PatternMetrics {
    #[serde(default)]
    pub detected: Vec<String>,
    #[serde(default)]
    pub new_patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TestMetrics {
    pub regression_passed: u32,
    pub regression_failed: u32,
}

/// Reviewer input carried with a run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserFeedback {
    #[serde(default)]
    pub overrides: FeedbackOverrides,

    #[serde(default)]
    pub notes: Vec<String>,
}

/// Explicit reviewer overrides of the automatic verdict
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackOverrides {
    /// Regenerate even when no threshold tripped; bypasses cooldown
    #[serde(default)]
    pub force_regeneration: bool,

    /// Never regenerate on this run, whatever the checks say
    #[serde(default)]
    pub hold_regeneration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_snapshot_has_parsable_last_run() {
        let snapshot = MetricSnapshot::new("docs");
        assert_eq!(snapshot.codebase, "docs");
        assert!(snapshot.last_run_at().is_some());
        assert_eq!(snapshot.staleness.days_since_last_run, 0);
    }

    #[test]
    fn test_corrupt_last_run_is_none() {
        let mut snapshot = MetricSnapshot::new("docs");
        snapshot.staleness.last_run_timestamp = "yesterday-ish".to_string();
        assert!(snapshot.last_run_at().is_none());
    }

    #[test]
    fn test_coverage_from_counts() {
        let coverage = CoverageMetrics::from_counts(200, 100, 90);
        assert!((coverage.coverage_percent - 90.0).abs() < f64::EPSILON);

        let empty = CoverageMetrics::from_counts(10, 0, 0);
        assert_eq!(empty.coverage_percent, 0.0);
    }

    #[test]
    fn test_sparse_document_deserializes_with_defaults() {
        let json = r#"{
            "captured_at": "2026-01-01T00:00:00Z",
            "coverage": {"files_total": 10, "files_analyzed": 10, "files_documented": 9, "coverage_percent": 90.0}
        }"#;
        let snapshot: MetricSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.coverage.files_documented, 9);
        assert!(snapshot.changes.new_languages.is_empty());
        assert!(!snapshot.user_feedback.overrides.force_regeneration);
    }

    #[test]
    fn test_format_summary_mentions_coverage() {
        let mut snapshot = MetricSnapshot::new("docs");
        snapshot.coverage = CoverageMetrics::from_counts(4, 4, 3);
        let summary = snapshot.format_summary();
        assert!(summary.contains("75.0%"));
        assert!(summary.contains("3/4 files documented"));
    }
}
