//! Reviewer callbacks for the approval gate
//!
//! The gate asks a `ReviewDecider` for an answer and never talks to a terminal
//! itself, so the same policy can be driven by a console, a web form or an
//! automated rule.

use crate::models::ApprovalRequest;
use anyhow::Result;
use colored::Colorize;
use std::collections::{BTreeMap, VecDeque};

/// One answer from a reviewer
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewResponse {
    Approve {
        notes: Option<String>,
        /// Parameter overrides for the next generation attempt (may be empty)
        modifications: BTreeMap<String, String>,
    },
    Reject {
        reason: String,
    },
    /// Unusable input; the gate asks again
    Invalid(String),
}

/// Synchronous decision callback
pub trait ReviewDecider {
    /// `attempt` starts at 1 and increases each time the gate re-prompts
    fn review(&mut self, request: &ApprovalRequest, attempt: u32) -> Result<ReviewResponse>;
}

// =============================================================================
// Console Reviewer
// =============================================================================

/// Interactive reviewer on the controlling terminal
#[derive(Debug, Default)]
pub struct ConsoleReviewer;

impl ConsoleReviewer {
    pub fn new() -> Self {
        Self
    }

    fn print_request(request: &ApprovalRequest) {
        println!();
        println!("{}", "Regeneration approval required".cyan().bold());
        let current = request
            .current_version
            .map_or_else(|| "none".to_string(), |v| format!("v{}", v));
        println!("   Version: {} → v{}", current, request.proposed_version);

        let risk = match request.risk_level {
            crate::models::RiskLevel::Low => request.risk_level.name().green(),
            crate::models::RiskLevel::Medium => request.risk_level.name().yellow(),
            crate::models::RiskLevel::High => request.risk_level.name().red(),
        };
        println!("   Risk:    {}", risk);
        println!("   Reason:  {}", request.reason);
        if !request.changes_summary.is_empty() {
            println!("   Changes: {}", request.changes_summary);
        }
        if let Some(comparison) = &request.metrics_comparison {
            for delta in &comparison.deltas {
                println!(
                    "     {:<24} {:>8.1} → {:>8.1} ({:+.1})",
                    delta.name,
                    delta.previous,
                    delta.current,
                    delta.delta()
                );
            }
        }
        println!();
    }
}

impl ReviewDecider for ConsoleReviewer {
    fn review(&mut self, request: &ApprovalRequest, attempt: u32) -> Result<ReviewResponse> {
        if attempt == 1 {
            Self::print_request(request);
        }

        let answer: String = dialoguer::Input::new()
            .with_prompt("Approve regeneration? [y]es / [n]o / [m]odify parameters")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| anyhow::anyhow!("Terminal not available: {}", e))?;

        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => Ok(ReviewResponse::Approve {
                notes: Some("Approved by reviewer".to_string()),
                modifications: BTreeMap::new(),
            }),
            "n" | "no" => {
                let reason: String = dialoguer::Input::new()
                    .with_prompt("Reason for rejection")
                    .allow_empty(true)
                    .interact_text()
                    .map_err(|e| anyhow::anyhow!("Terminal not available: {}", e))?;
                let reason = if reason.trim().is_empty() {
                    "Rejected by reviewer".to_string()
                } else {
                    reason.trim().to_string()
                };
                Ok(ReviewResponse::Reject { reason })
            }
            "m" | "modify" => {
                let raw: String = dialoguer::Input::new()
                    .with_prompt("Parameter changes (key=value, comma separated)")
                    .interact_text()
                    .map_err(|e| anyhow::anyhow!("Terminal not available: {}", e))?;
                match parse_modifications(&raw) {
                    Ok(modifications) => Ok(ReviewResponse::Approve {
                        notes: Some("Approved with parameter changes".to_string()),
                        modifications,
                    }),
                    Err(message) => Ok(ReviewResponse::Invalid(message)),
                }
            }
            other => Ok(ReviewResponse::Invalid(format!(
                "'{}' is not one of y, n, m",
                other
            ))),
        }
    }
}

/// Parse `key=value` pairs separated by commas
pub fn parse_modifications(input: &str) -> std::result::Result<BTreeMap<String, String>, String> {
    let mut modifications = BTreeMap::new();
    for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("'{}' is not a key=value pair", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("'{}' has an empty key", pair));
        }
        modifications.insert(key.to_string(), value.trim().to_string());
    }

    if modifications.is_empty() {
        return Err("no parameter changes given".to_string());
    }
    Ok(modifications)
}

// =============================================================================
// Policy Reviewer
// =============================================================================

/// Non-interactive reviewer answering from a fixed script
///
/// Once the script runs out, the last answer repeats.
#[derive(Debug, Clone)]
pub struct PolicyReviewer {
    script: VecDeque<ReviewResponse>,
    last: ReviewResponse,
    calls: u32,
}

impl PolicyReviewer {
    pub fn scripted(responses: Vec<ReviewResponse>) -> Self {
        let last = responses
            .last()
            .cloned()
            .unwrap_or_else(|| ReviewResponse::Invalid("no scripted answer".to_string()));
        Self {
            script: responses.into(),
            last,
            calls: 0,
        }
    }

    pub fn always_approve() -> Self {
        Self::scripted(vec![ReviewResponse::Approve {
            notes: Some("Approved by policy".to_string()),
            modifications: BTreeMap::new(),
        }])
    }

    pub fn always_reject(reason: impl Into<String>) -> Self {
        Self::scripted(vec![ReviewResponse::Reject {
            reason: reason.into(),
        }])
    }

    /// How many times the gate asked
    pub fn calls(&self) -> u32 {
        self.calls
    }
}

impl ReviewDecider for PolicyReviewer {
    fn review(&mut self, _request: &ApprovalRequest, _attempt: u32) -> Result<ReviewResponse> {
        self.calls += 1;
        Ok(self.script.pop_front().unwrap_or_else(|| self.last.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modifications() {
        let parsed = parse_modifications("model = large, max_rules=40").unwrap();
        assert_eq!(parsed.get("model").map(String::as_str), Some("large"));
        assert_eq!(parsed.get("max_rules").map(String::as_str), Some("40"));
    }

    #[test]
    fn test_parse_modifications_rejects_bad_pairs() {
        assert!(parse_modifications("model").is_err());
        assert!(parse_modifications("=x").is_err());
        assert!(parse_modifications(" , ").is_err());
    }

    #[test]
    fn test_scripted_reviewer_repeats_last_answer() {
        let request = crate::approval::gate::tests::sample_request(crate::models::RiskLevel::High);
        let mut reviewer = PolicyReviewer::scripted(vec![
            ReviewResponse::Invalid("typo".to_string()),
            ReviewResponse::Reject {
                reason: "not now".to_string(),
            },
        ]);

        assert!(matches!(
            reviewer.review(&request, 1).unwrap(),
            ReviewResponse::Invalid(_)
        ));
        for attempt in 2..4 {
            assert!(matches!(
                reviewer.review(&request, attempt).unwrap(),
                ReviewResponse::Reject { .. }
            ));
        }
        assert_eq!(reviewer.calls(), 3);
    }
}
