use crate::error::LifecycleResult;
use crate::models::{CooldownAnchor, MetricSnapshot, ObsolescenceThresholds, StalenessMetrics};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Reason recorded when there is nothing to compare against
pub const FIRST_RUN_REASON: &str = "First run - no previous metrics";

/// Where a codebase sits in the freshness lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FreshnessState {
    /// No previous snapshot to compare with
    Unknown,
    Fresh,
    Stale,
    /// Stale, but regeneration is held back (cooldown or reviewer hold)
    SuppressedStale,
}

/// Verdict of one obsolescence check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObsolescenceResult {
    pub is_obsolete: bool,

    /// Trigger descriptions, in check order
    pub reasons: Vec<String>,

    /// Final answer after suppression
    pub should_regenerate: bool,

    pub suppressed: bool,

    pub suppression_reason: Option<String>,

    /// First run: no previous snapshot existed
    #[serde(default)]
    pub first_run: bool,
}

impl ObsolescenceResult {
    fn first_run() -> Self {
        Self {
            is_obsolete: false,
            reasons: vec![FIRST_RUN_REASON.to_string()],
            should_regenerate: false,
            suppressed: false,
            suppression_reason: None,
            first_run: true,
        }
    }

    pub fn state(&self) -> FreshnessState {
        if self.first_run {
            FreshnessState::Unknown
        } else if !self.is_obsolete {
            FreshnessState::Fresh
        } else if self.suppressed {
            FreshnessState::SuppressedStale
        } else {
            FreshnessState::Stale
        }
    }

    /// Format verdict for display
    pub fn format_summary(&self) -> String {
        let mut out = String::new();
        let verdict = match self.state() {
            FreshnessState::Unknown => "unknown (first run)",
            FreshnessState::Fresh => "fresh",
            FreshnessState::Stale => "stale - regeneration recommended",
            FreshnessState::SuppressedStale => "stale - regeneration suppressed",
        };
        out.push_str(&format!("Verdict: {}\n", verdict));
        for reason in &self.reasons {
            out.push_str(&format!("  - {}\n", reason));
        }
        if let Some(suppression) = &self.suppression_reason {
            out.push_str(&format!("  Suppressed: {}\n", suppression));
        }
        out
    }
}

/// Pure obsolescence decision over two snapshots
#[derive(Debug, Clone)]
pub struct ObsolescenceDetector {
    thresholds: ObsolescenceThresholds,
}

impl ObsolescenceDetector {
    /// Validates thresholds up front so detection itself cannot fail
    pub fn new(thresholds: ObsolescenceThresholds) -> LifecycleResult<Self> {
        thresholds.validate()?;
        Ok(Self { thresholds })
    }


    /// Detect against the current wall clock
    pub fn detect(
        &self,
        current: &MetricSnapshot,
        previous: Option<&MetricSnapshot>,
        last_regeneration: Option<DateTime<Utc>>,
    ) -> ObsolescenceResult {
        self.detect_at(current, previous, last_regeneration, Utc::now())
    }

    /// Run every check and apply suppression as of `now`
    ///
    /// `last_regeneration` is the creation time of the active version, used as
    /// the cooldown anchor when configured for it.
    pub fn detect_at(
        &self,
        current: &MetricSnapshot,
        previous: Option<&MetricSnapshot>,
        last_regeneration: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> ObsolescenceResult {
        let Some(previous) = previous else {
            return ObsolescenceResult::first_run();
        };

        let t = &self.thresholds;
        let mut reasons = Vec::new();

        if current.changes.files_changed_percent >= t.files_changed_percent {
            reasons.push(format!(
                "Files changed: {:.1}% (previous {:.1}%, threshold {:.1}%)",
                current.changes.files_changed_percent,
                previous.changes.files_changed_percent,
                t.files_changed_percent
            ));
        }

        if t.new_languages_trigger {
            let new_languages: Vec<&str> = current
                .changes
                .new_languages
                .iter()
                .filter(|lang| {
                    !previous.changes.known_languages.contains(lang)
                        && !previous.changes.new_languages.contains(lang)
                })
                .map(String::as_str)
                .collect();
            if !new_languages.is_empty() {
                reasons.push(format!(
                    "New languages detected: {}",
                    new_languages.join(", ")
                ));
            }
        }

        if current.coverage.coverage_percent < t.coverage_min_percent {
            reasons.push(format!(
                "Coverage below minimum: {:.1}% < {:.1}%",
                current.coverage.coverage_percent, t.coverage_min_percent
            ));
        }

        if current.staleness.days_since_last_run > t.stale_run_days_max {
            reasons.push(format!(
                "Last run {} days ago (max {})",
                current.staleness.days_since_last_run, t.stale_run_days_max
            ));
        }

        if current.quality.error_rate_percent > t.error_rate_max_percent {
            reasons.push(format!(
                "Error rate too high: {:.1}% > {:.1}%",
                current.quality.error_rate_percent, t.error_rate_max_percent
            ));
        }

        let previous_fp = previous.quality.false_positive_estimate;
        let current_fp = current.quality.false_positive_estimate;
        if previous_fp > 0.0 && current_fp > previous_fp * t.false_positive_spike_factor {
            reasons.push(format!(
                "False positives spiked: {:.1} vs {:.1} previously (>{:.1}x)",
                current_fp, previous_fp, t.false_positive_spike_factor
            ));
        }

        let overrides = current.user_feedback.overrides;
        if overrides.force_regeneration {
            reasons.push("Regeneration requested by user feedback".to_string());
        }

        let is_obsolete = !reasons.is_empty();
        let mut result = ObsolescenceResult {
            is_obsolete,
            reasons,
            should_regenerate: is_obsolete,
            suppressed: false,
            suppression_reason: None,
            first_run: false,
        };

        if !is_obsolete {
            return result;
        }

        if overrides.hold_regeneration {
            result.suppress("Regeneration held by user feedback".to_string());
        } else if !overrides.force_regeneration {
            if let Some(cooldown_end) = self.cooldown_end(previous, last_regeneration) {
                if now < cooldown_end {
                    result.suppress(format!(
                        "In cooldown period until {}",
                        cooldown_end.to_rfc3339()
                    ));
                }
            }
        }

        result
    }

    /// End of the cooldown window, `None` when no usable anchor exists
    fn cooldown_end(
        &self,
        previous: &MetricSnapshot,
        last_regeneration: Option<DateTime<Utc>>,
    ) -> Option<DateTime<Utc>> {
        if self.thresholds.cooldown_days == 0 {
            return None;
        }

        let anchor = match self.thresholds.cooldown_anchor {
            CooldownAnchor::LastDetection => {
                let anchor = previous.last_run_at();
                if anchor.is_none() {
                    tracing::warn!(
                        codebase = %previous.codebase,
                        timestamp = %previous.staleness.last_run_timestamp,
                        "unparsable last-run timestamp, skipping cooldown"
                    );
                }
                anchor
            }
            CooldownAnchor::LastRegeneration => last_regeneration,
        };

        anchor.map(|at| at + Duration::days(i64::from(self.thresholds.cooldown_days)))
    }
}

impl ObsolescenceResult {
    fn suppress(&mut self, reason: String) {
        self.should_regenerate = false;
        self.suppressed = true;
        self.suppression_reason = Some(reason);
    }
}

/// Staleness block for a new snapshot taken at `now`
///
/// A missing previous snapshot or an unparsable timestamp yields 0 days.
pub fn staleness_since(previous: Option<&MetricSnapshot>, now: DateTime<Utc>) -> StalenessMetrics {
    let days = previous
        .and_then(MetricSnapshot::last_run_at)
        .map(|last| (now - last).num_days().max(0))
        .unwrap_or(0);

    StalenessMetrics {
        last_run_timestamp: now.to_rfc3339(),
        days_since_last_run: u32::try_from(days).unwrap_or(u32::MAX),
    }
}

/// Languages seen so far: the previous snapshot's set plus this run's new ones
pub fn known_languages(current: &MetricSnapshot, previous: Option<&MetricSnapshot>) -> Vec<String> {
    let mut known: BTreeSet<String> = current.changes.known_languages.iter().cloned().collect();
    if let Some(previous) = previous {
        known.extend(previous.changes.known_languages.iter().cloned());
        known.extend(previous.changes.new_languages.iter().cloned());
    }
    known.extend(current.changes.new_languages.iter().cloned());
    known.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ObsolescenceThresholds {
        ObsolescenceThresholds {
            files_changed_percent: 30.0,
            new_languages_trigger: true,
            coverage_min_percent: 85.0,
            stale_run_days_max: 30,
            error_rate_max_percent: 5.0,
            cooldown_days: 7,
            cooldown_anchor: CooldownAnchor::LastDetection,
            false_positive_spike_factor: 1.5,
        }
    }

    fn detector() -> ObsolescenceDetector {
        ObsolescenceDetector::new(thresholds()).unwrap()
    }

    /// A healthy snapshot whose last run was `days_ago` before `now`
    fn healthy(now: DateTime<Utc>, days_ago: i64) -> MetricSnapshot {
        let mut snapshot = MetricSnapshot::new("docs");
        snapshot.captured_at = now - Duration::days(days_ago);
        snapshot.staleness.last_run_timestamp = (now - Duration::days(days_ago)).to_rfc3339();
        snapshot.coverage.coverage_percent = 95.0;
        snapshot.changes.files_changed_percent = 5.0;
        snapshot.quality.error_rate_percent = 1.0;
        snapshot
    }

    #[test]
    fn test_first_run_is_not_obsolete() {
        let now = Utc::now();
        let result = detector().detect_at(&healthy(now, 0), None, None, now);

        assert!(!result.is_obsolete);
        assert!(!result.should_regenerate);
        assert_eq!(result.reasons, vec![FIRST_RUN_REASON.to_string()]);
        assert_eq!(result.state(), FreshnessState::Unknown);
    }

    #[test]
    fn test_healthy_run_is_fresh() {
        let now = Utc::now();
        let previous = healthy(now, 10);
        let result = detector().detect_at(&healthy(now, 0), Some(&previous), None, now);

        assert!(!result.is_obsolete);
        assert!(result.reasons.is_empty());
        assert_eq!(result.state(), FreshnessState::Fresh);
    }

    #[test]
    fn test_change_magnitude_cites_values() {
        let now = Utc::now();
        let mut previous = healthy(now, 10);
        previous.changes.files_changed_percent = 10.0;
        let mut current = healthy(now, 0);
        current.changes.files_changed_percent = 35.0;

        let result = detector().detect_at(&current, Some(&previous), None, now);

        assert!(result.is_obsolete);
        assert!(result.should_regenerate);
        let reason = &result.reasons[0];
        assert!(reason.contains("35.0%"), "{}", reason);
        assert!(reason.contains("10.0%"), "{}", reason);
        assert!(reason.contains("30.0%"), "{}", reason);
    }

    #[test]
    fn test_threshold_is_inclusive_for_change_magnitude() {
        let now = Utc::now();
        let previous = healthy(now, 10);
        let mut current = healthy(now, 0);
        current.changes.files_changed_percent = 30.0;

        assert!(detector().detect_at(&current, Some(&previous), None, now).is_obsolete);
    }

    #[test]
    fn test_new_language_only_when_enabled_and_unseen() {
        let now = Utc::now();
        let mut previous = healthy(now, 10);
        previous.changes.new_languages = vec!["python".to_string()];
        let mut current = healthy(now, 0);
        current.changes.new_languages = vec!["python".to_string(), "go".to_string()];

        let result = detector().detect_at(&current, Some(&previous), None, now);
        assert_eq!(result.reasons, vec!["New languages detected: go".to_string()]);

        let mut quiet = thresholds();
        quiet.new_languages_trigger = false;
        let result = ObsolescenceDetector::new(quiet)
            .unwrap()
            .detect_at(&current, Some(&previous), None, now);
        assert!(!result.is_obsolete);
    }

    #[test]
    fn test_every_trigger_is_reported_in_order() {
        let now = Utc::now();
        let mut previous = healthy(now, 40);
        previous.quality.false_positive_estimate = 10.0;

        let mut current = healthy(now, 0);
        current.changes.files_changed_percent = 50.0;
        current.changes.new_languages = vec!["kotlin".to_string()];
        current.coverage.coverage_percent = 70.0;
        current.staleness.days_since_last_run = 40;
        current.quality.error_rate_percent = 9.0;
        current.quality.false_positive_estimate = 16.0;

        let result = detector().detect_at(&current, Some(&previous), None, now);

        assert_eq!(result.reasons.len(), 6);
        assert!(result.reasons[0].starts_with("Files changed"));
        assert!(result.reasons[1].starts_with("New languages"));
        assert!(result.reasons[2].starts_with("Coverage below minimum"));
        assert!(result.reasons[3].starts_with("Last run 40 days ago"));
        assert!(result.reasons[4].starts_with("Error rate too high"));
        assert!(result.reasons[5].starts_with("False positives spiked"));
    }

    #[test]
    fn test_false_positive_spike_needs_positive_previous() {
        let now = Utc::now();
        let previous = healthy(now, 10);
        let mut current = healthy(now, 0);
        current.quality.false_positive_estimate = 100.0;

        assert!(!detector().detect_at(&current, Some(&previous), None, now).is_obsolete);
    }

    #[test]
    fn test_cooldown_suppresses_recent_trigger() {
        let now = Utc::now();
        let previous = healthy(now, 2);
        let mut current = healthy(now, 0);
        current.changes.files_changed_percent = 35.0;

        let result = detector().detect_at(&current, Some(&previous), None, now);

        assert!(result.is_obsolete);
        assert!(!result.should_regenerate);
        assert!(result.suppressed);
        let expected_end = (now - Duration::days(2) + Duration::days(7)).to_rfc3339();
        assert!(result
            .suppression_reason
            .as_deref()
            .unwrap()
            .contains(&expected_end));
        assert_eq!(result.state(), FreshnessState::SuppressedStale);
    }

    #[test]
    fn test_cooldown_elapsed_allows_regeneration() {
        let now = Utc::now();
        let previous = healthy(now, 8);
        let mut current = healthy(now, 0);
        current.changes.files_changed_percent = 35.0;

        let result = detector().detect_at(&current, Some(&previous), None, now);
        assert!(result.should_regenerate);
        assert!(!result.suppressed);
        assert_eq!(result.state(), FreshnessState::Stale);
    }

    #[test]
    fn test_regeneration_anchor_prefers_active_version_time() {
        let now = Utc::now();
        let mut config = thresholds();
        config.cooldown_anchor = CooldownAnchor::LastRegeneration;
        let detector = ObsolescenceDetector::new(config).unwrap();

        // Previous run was 2 days ago but the last regeneration was 20 days ago
        let previous = healthy(now, 2);
        let mut current = healthy(now, 0);
        current.changes.files_changed_percent = 35.0;

        let result =
            detector.detect_at(&current, Some(&previous), Some(now - Duration::days(20)), now);
        assert!(result.should_regenerate);

        // A regeneration 2 days ago still holds the window
        let result =
            detector.detect_at(&current, Some(&previous), Some(now - Duration::days(2)), now);
        assert!(result.suppressed);
    }

    #[test]
    fn test_regeneration_anchor_without_version_never_blocks_first_generation() {
        let mut config = thresholds();
        config.cooldown_anchor = CooldownAnchor::LastRegeneration;
        let detector = ObsolescenceDetector::new(config).unwrap();

        // Daily runs, each obsolete, with nothing generated yet
        let start = Utc::now() - Duration::days(30);
        let mut previous = healthy(start, 0);
        for day in 1..=3 {
            let now = start + Duration::days(day);
            let mut current = healthy(now, 0);
            current.changes.files_changed_percent = 35.0;

            let result = detector.detect_at(&current, Some(&previous), None, now);
            assert!(result.should_regenerate, "day {} was suppressed", day);
            previous = current;
        }
    }

    #[test]
    fn test_default_anchor_suppresses_despite_old_regeneration() {
        let now = Utc::now();
        let detector = ObsolescenceDetector::new(ObsolescenceThresholds::default()).unwrap();
        let previous = healthy(now, 2);
        let mut current = healthy(now, 0);
        current.changes.files_changed_percent = 35.0;

        let result =
            detector.detect_at(&current, Some(&previous), Some(now - Duration::days(20)), now);
        assert!(result.is_obsolete);
        assert!(!result.should_regenerate);
        assert!(result.suppressed);
    }

    #[test]
    fn test_corrupt_previous_timestamp_skips_cooldown() {
        let now = Utc::now();
        let mut previous = healthy(now, 1);
        previous.staleness.last_run_timestamp = "not-a-date".to_string();
        let mut current = healthy(now, 0);
        current.coverage.coverage_percent = 50.0;

        let result = detector().detect_at(&current, Some(&previous), None, now);
        assert!(result.should_regenerate);
    }

    #[test]
    fn test_force_override_bypasses_cooldown() {
        let now = Utc::now();
        let previous = healthy(now, 1);
        let mut current = healthy(now, 0);
        current.user_feedback.overrides.force_regeneration = true;

        let result = detector().detect_at(&current, Some(&previous), None, now);
        assert!(result.is_obsolete);
        assert!(result.should_regenerate);
        assert!(!result.suppressed);
    }

    #[test]
    fn test_hold_override_suppresses() {
        let now = Utc::now();
        let previous = healthy(now, 30);
        let mut current = healthy(now, 0);
        current.coverage.coverage_percent = 40.0;
        current.user_feedback.overrides.hold_regeneration = true;

        let result = detector().detect_at(&current, Some(&previous), None, now);
        assert!(result.is_obsolete);
        assert!(!result.should_regenerate);
        assert_eq!(
            result.suppression_reason.as_deref(),
            Some("Regeneration held by user feedback")
        );
    }

    #[test]
    fn test_invalid_thresholds_rejected_at_construction() {
        let mut bad = thresholds();
        bad.coverage_min_percent = f64::NAN;
        assert!(ObsolescenceDetector::new(bad).is_err());
    }

    #[test]
    fn test_language_seen_in_any_earlier_run_is_not_new() {
        let now = Utc::now();
        let mut previous = healthy(now, 8);
        previous.changes.known_languages = vec!["go".to_string(), "rust".to_string()];
        let mut current = healthy(now, 0);
        current.changes.new_languages = vec!["go".to_string()];

        assert!(!detector().detect_at(&current, Some(&previous), None, now).is_obsolete);

        current.changes.new_languages = vec!["go".to_string(), "kotlin".to_string()];
        let result = detector().detect_at(&current, Some(&previous), None, now);
        assert_eq!(result.reasons, vec!["New languages detected: kotlin".to_string()]);
    }

    #[test]
    fn test_known_languages_accumulate() {
        let now = Utc::now();
        let mut previous = healthy(now, 1);
        previous.changes.known_languages = vec!["rust".to_string()];
        previous.changes.new_languages = vec!["go".to_string()];
        let mut current = healthy(now, 0);
        current.changes.new_languages = vec!["python".to_string()];

        assert_eq!(
            known_languages(&current, Some(&previous)),
            vec!["go".to_string(), "python".to_string(), "rust".to_string()]
        );
        assert_eq!(known_languages(&current, None), vec!["python".to_string()]);
    }

    #[test]
    fn test_staleness_since_previous() {
        let now = Utc::now();
        let previous = healthy(now, 12);
        let staleness = staleness_since(Some(&previous), now);
        assert_eq!(staleness.days_since_last_run, 12);
        assert_eq!(staleness.last_run_timestamp, now.to_rfc3339());
    }

    #[test]
    fn test_staleness_degrades_to_zero_on_corrupt_timestamp() {
        let now = Utc::now();
        let mut previous = healthy(now, 12);
        previous.staleness.last_run_timestamp = "garbage".to_string();

        assert_eq!(staleness_since(Some(&previous), now).days_since_last_run, 0);
        assert_eq!(staleness_since(None, now).days_since_last_run, 0);
    }
}
