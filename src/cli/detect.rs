//! Dry-run obsolescence check

use super::{load_context, read_snapshot};
use crate::detector::{known_languages, staleness_since, FreshnessState, ObsolescenceDetector};
use crate::registry::VersionRegistry;
use crate::state::{CodebaseLock, MetricsStore};
use crate::Result;
use colored::Colorize;
use std::path::Path;

/// Compare a snapshot against the stored one; `save` makes it the new current snapshot
pub async fn run(project_root: &Path, codebase: &str, metrics: &Path, save: bool, json: bool) -> Result<()> {
    let (config, layout) = load_context(project_root, codebase)?;
    let _lock = if save {
        Some(CodebaseLock::acquire_async(&layout).await?)
    } else {
        None
    };

    let store = MetricsStore::new(&layout);
    let previous = if save { store.load() } else { store.peek() };

    let mut snapshot = read_snapshot(metrics)?;
    snapshot.codebase = codebase.to_string();
    snapshot.staleness = staleness_since(previous.as_ref(), snapshot.captured_at);
    snapshot.changes.known_languages = known_languages(&snapshot, previous.as_ref());

    let registry = VersionRegistry::open(layout.clone())?;
    let detector = ObsolescenceDetector::new(config.thresholds)?;
    let result = detector.detect(
        &snapshot,
        previous.as_ref(),
        registry.active_version().map(|v| v.created_at),
    );

    if save {
        store.save(&snapshot)?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let headline = match result.state() {
        FreshnessState::Unknown => "First run: nothing to compare against".bright_black(),
        FreshnessState::Fresh => "Artifact is up to date".green(),
        FreshnessState::Stale => "Artifact is obsolete: regeneration recommended".red(),
        FreshnessState::SuppressedStale => "Artifact is obsolete, regeneration suppressed".yellow(),
    };
    println!("{}", headline.bold());
    for reason in &result.reasons {
        println!("   • {}", reason);
    }
    if let Some(suppression) = &result.suppression_reason {
        println!("   {} {}", "⏸".yellow(), suppression);
    }
    if save {
        println!("   {} snapshot saved", "✓".green());
    }

    Ok(())
}
