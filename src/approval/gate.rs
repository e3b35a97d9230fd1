use super::reviewer::{ReviewDecider, ReviewResponse};
use crate::models::{ApprovalConfig, ApprovalDecision, ApprovalRequest, ApprovalResult, RiskLevel};

/// Note attached to automatic approvals
pub const AUTO_APPROVAL_NOTE: &str = "Auto-approved: low risk change";

/// Decision point between an obsolescence verdict and regeneration
///
/// The gate owns no persistent state and never touches the registry; it only
/// returns a decision.
pub struct ApprovalGate {
    config: ApprovalConfig,
    reviewer: Option<Box<dyn ReviewDecider>>,
}

impl ApprovalGate {
    /// Gate without a reviewer: interactive requests fall back to `NeedsReview`
    pub fn new(config: ApprovalConfig) -> Self {
        Self {
            config,
            reviewer: None,
        }
    }

    pub fn with_reviewer(config: ApprovalConfig, reviewer: Box<dyn ReviewDecider>) -> Self {
        Self {
            config,
            reviewer: Some(reviewer),
        }
    }

    /// Decide one request
    ///
    /// 1. Low risk, eligible, and auto-approval enabled: approved immediately.
    /// 2. Not interactive: deferred to an out-of-band reviewer.
    /// 3. Otherwise the reviewer is asked until it gives a usable answer or the
    ///    attempt budget runs out.
    pub fn request_approval(
        &mut self,
        request: &ApprovalRequest,
        interactive: bool,
    ) -> ApprovalResult {
        if request.risk_level == RiskLevel::Low
            && request.auto_approve
            && self.config.auto_approve_low_risk
        {
            tracing::info!(
                proposed_version = request.proposed_version,
                "auto-approved low risk regeneration"
            );
            return ApprovalResult::approved(AUTO_APPROVAL_NOTE);
        }

        if !interactive {
            return ApprovalResult::needs_review(
                "Manual review required; run interactively to decide",
            );
        }

        let Some(reviewer) = self.reviewer.as_mut() else {
            return ApprovalResult::needs_review("No reviewer available");
        };

        let max_attempts = self.config.max_review_attempts.max(1);
        for attempt in 1..=max_attempts {
            let response = match reviewer.review(request, attempt) {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "reviewer unavailable, deferring decision");
                    return ApprovalResult::needs_review(format!("Reviewer unavailable: {}", e));
                }
            };

            match response {
                ReviewResponse::Approve {
                    notes,
                    modifications,
                } => {
                    return ApprovalResult {
                        decision: ApprovalDecision::Approved,
                        notes,
                        modifications: if modifications.is_empty() {
                            None
                        } else {
                            Some(modifications)
                        },
                    };
                }
                ReviewResponse::Reject { reason } => return ApprovalResult::rejected(reason),
                ReviewResponse::Invalid(message) => {
                    tracing::debug!(attempt, %message, "invalid review input, asking again");
                }
            }
        }

        ApprovalResult::needs_review(format!(
            "No valid answer after {} attempts",
            max_attempts
        ))
    }
}

/// Plain-text rendering of a decision for audit logs
pub fn format_approval_summary(request: &ApprovalRequest, result: &ApprovalResult) -> String {
    let decision = match result.decision {
        ApprovalDecision::Approved => "APPROVED",
        ApprovalDecision::Rejected => "REJECTED",
        ApprovalDecision::NeedsReview => "NEEDS REVIEW",
    };
    let current = request
        .current_version
        .map_or_else(|| "none".to_string(), |v| format!("v{}", v));

    let mut out = format!(
        "Regeneration {}\n  Version: {} -> v{}\n  Risk: {}{}\n  Reason: {}\n",
        decision,
        current,
        request.proposed_version,
        request.risk_level.name(),
        if request.auto_approve {
            " (auto-approve eligible)"
        } else {
            ""
        },
        request.reason,
    );

    if !request.changes_summary.is_empty() {
        out.push_str(&format!("  Changes: {}\n", request.changes_summary));
    }

    if let Some(comparison) = &request.metrics_comparison {
        out.push_str("  Metrics:\n");
        for delta in &comparison.deltas {
            out.push_str(&format!(
                "    {}: {:.1} -> {:.1} ({:+.1})\n",
                delta.name,
                delta.previous,
                delta.current,
                delta.delta()
            ));
        }
    }

    if let Some(notes) = &result.notes {
        out.push_str(&format!("  Notes: {}\n", notes));
    }

    if let Some(modifications) = &result.modifications {
        let pairs: Vec<String> = modifications
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        out.push_str(&format!("  Modifications: {}\n", pairs.join(", ")));
    }

    out
}
