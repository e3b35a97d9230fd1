use super::load_context;
use crate::models::VersionStatus;
use crate::registry::VersionRegistry;
use crate::state::MetricsStore;
use crate::Result;
use colored::Colorize;
use std::path::Path;

pub async fn run(project_root: &Path, codebase: &str, json: bool) -> Result<()> {
    let (_config, layout) = load_context(project_root, codebase)?;
    let registry = VersionRegistry::open(layout.clone())?;
    let snapshot = MetricsStore::new(&layout).peek();
    let active = registry.active_version();

    if json {
        let value = serde_json::json!({
            "codebase": codebase,
            "active_version": active.map(|v| v.version),
            "versions": registry.list_versions().len(),
            "next_version": registry.get_next_version(),
            "last_snapshot": snapshot.as_ref().map(|s| s.captured_at),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", format!("Status for: {}", codebase).cyan().bold());
    println!();

    match active {
        Some(version) => {
            println!(
                "   Active:    {} (created {})",
                format!("v{}", version.version).green(),
                version.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if let Some(model) = &version.provenance.model {
                println!("   Model:     {}", model);
            }
        }
        None => println!("   Active:    {}", "none".yellow()),
    }

    let failed = registry
        .list_versions()
        .iter()
        .filter(|v| v.status == VersionStatus::Failed)
        .count();
    println!(
        "   Versions:  {} ({} failed)",
        registry.list_versions().len(),
        failed
    );

    match snapshot {
        Some(snapshot) => {
            println!();
            print!("{}", snapshot.format_summary());
        }
        None => println!("   Metrics:   {}", "no run recorded yet".bright_black()),
    }

    Ok(())
}
