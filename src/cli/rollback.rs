use super::load_context;
use crate::registry::{RollbackController, VersionRegistry};
use crate::state::CodebaseLock;
use crate::Result;
use colored::Colorize;
use std::path::Path;

/// Roll back to `to`, or to the previous good version when not given
pub fn run(project_root: &Path, codebase: &str, to: Option<u32>, restore: bool) -> Result<()> {
    let (_config, layout) = load_context(project_root, codebase)?;
    let _lock = CodebaseLock::acquire(&layout)?;
    let mut registry = VersionRegistry::open(layout)?;
    let from = registry.active_version().map(|v| v.version);

    let mut controller = RollbackController::new(&mut registry);
    let target = match to {
        Some(version) => controller.rollback_to_version(version, restore)?,
        None => controller.rollback_to_previous(restore)?,
    };

    let from = from.map(|v| format!("v{}", v)).unwrap_or_else(|| "none".to_string());
    println!(
        "{}",
        format!("✓ Rolled back {} -> v{}", from, target.version).green().bold()
    );
    if restore {
        println!("   Workspace restored: {}", registry.layout().workspace_dir().display());
    }
    Ok(())
}

pub fn history(project_root: &Path, codebase: &str, json: bool) -> Result<()> {
    let (_config, layout) = load_context(project_root, codebase)?;
    let mut registry = VersionRegistry::open(layout)?;
    let controller = RollbackController::new(&mut registry);
    let history = controller.get_rollback_history();

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    println!("{}", format!("History of {}", codebase).cyan().bold());
    for entry in history {
        println!(
            "   v{:<4} {:<9} {}  {}",
            entry.version,
            entry.status.to_string(),
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.description
        );
    }
    Ok(())
}

pub fn checkpoint(project_root: &Path, codebase: &str, notes: &str) -> Result<()> {
    let (_config, layout) = load_context(project_root, codebase)?;
    let _lock = CodebaseLock::acquire(&layout)?;
    let mut registry = VersionRegistry::open(layout)?;
    let version = RollbackController::new(&mut registry).create_rollback_point(notes)?;
    println!(
        "{}",
        format!("✓ Checkpoint added to v{}", version.version).green()
    );
    Ok(())
}
