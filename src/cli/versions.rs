use super::load_context;
use crate::models::{VersionMetadata, VersionStatus};
use crate::registry::{RollbackController, VersionRegistry};
use crate::state::CodebaseLock;
use crate::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use std::path::Path;

#[derive(Subcommand)]
pub enum VersionCommands {
    /// List every recorded version
    List {
        codebase: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single version
    Show {
        codebase: String,
        version: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Make a version active without touching the live workspace
    Activate {
        codebase: String,
        version: u32,

        /// Also restore its files into the live workspace
        #[arg(long)]
        restore: bool,
    },

    /// Archive a version
    Archive { codebase: String, version: u32 },

    /// Delete a non-active version and its stored files
    Delete {
        codebase: String,
        version: u32,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },
}

impl VersionCommands {
    fn codebase(&self) -> &str {
        match self {
            VersionCommands::List { codebase, .. }
            | VersionCommands::Show { codebase, .. }
            | VersionCommands::Activate { codebase, .. }
            | VersionCommands::Archive { codebase, .. }
            | VersionCommands::Delete { codebase, .. } => codebase,
        }
    }
}

pub fn run(project_root: &Path, cmd: VersionCommands) -> Result<()> {
    let codebase = cmd.codebase().to_string();
    let (_config, layout) = load_context(project_root, &codebase)?;

    match cmd {
        VersionCommands::List { json, .. } => {
            let registry = VersionRegistry::open(layout)?;
            if json {
                println!("{}", serde_json::to_string_pretty(registry.list_versions())?);
                return Ok(());
            }
            if registry.list_versions().is_empty() {
                println!("{}", "No versions recorded".bright_black());
                return Ok(());
            }
            println!("{}", format!("Versions of {}", codebase).cyan().bold());
            for version in registry.list_versions() {
                print_row(version);
            }
        }

        VersionCommands::Show { version, json, .. } => {
            let registry = VersionRegistry::open(layout)?;
            let metadata = registry.get_version(version)?;
            if json {
                println!("{}", serde_json::to_string_pretty(metadata)?);
                return Ok(());
            }
            print_details(metadata);
        }

        VersionCommands::Activate { version, restore, .. } => {
            let _lock = CodebaseLock::acquire(&layout)?;
            let mut registry = VersionRegistry::open(layout)?;
            if restore {
                RollbackController::new(&mut registry).rollback_to_version(version, true)?;
            } else {
                registry.set_active_version(version)?;
            }
            println!("{}", format!("✓ v{} is now active", version).green());
        }

        VersionCommands::Archive { version, .. } => {
            let _lock = CodebaseLock::acquire(&layout)?;
            let mut registry = VersionRegistry::open(layout)?;
            registry.archive_version(version)?;
            println!("{}", format!("✓ v{} archived", version).green());
            if let Some(active) = registry.active_version() {
                println!("   Active: v{}", active.version);
            }
        }

        VersionCommands::Delete { version, force, .. } => {
            let _lock = CodebaseLock::acquire(&layout)?;
            let mut registry = VersionRegistry::open(layout)?;
            registry.get_version(version)?;

            if !force {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete v{} and its stored files?", version))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("{}", "Cancelled".yellow());
                    return Ok(());
                }
            }

            registry.delete_version(version)?;
            println!("{}", format!("✓ v{} deleted", version).green());
        }
    }

    Ok(())
}

fn status_label(status: VersionStatus) -> colored::ColoredString {
    match status {
        VersionStatus::Active => "active".green().bold(),
        VersionStatus::Archived => "archived".normal(),
        VersionStatus::Failed => "failed".red(),
    }
}

fn print_row(version: &VersionMetadata) {
    println!(
        "   {:>4}  {:<9} {}  {}",
        format!("v{}", version.version),
        status_label(version.status),
        version.created_at.format("%Y-%m-%d %H:%M"),
        version.notes.as_deref().unwrap_or("").bright_black()
    );
}

fn print_details(version: &VersionMetadata) {
    println!("{}", format!("v{}", version.version).cyan().bold());
    println!("   Status:     {}", status_label(version.status));
    println!("   Created:    {}", version.created_at.to_rfc3339());
    println!("   Source:     {}", version.source_path.display());
    if let Some(binary) = &version.binary_path {
        println!("   Binary:     {}", binary.display());
    }
    if let Some(digest) = &version.source_digest {
        println!("   Digest:     {}", digest);
    }
    println!("   Validated:  {}", version.validation_passed);
    if let Some(model) = &version.provenance.model {
        println!("   Model:      {}", model);
    }
    if let Some(cost) = version.provenance.cost_usd {
        println!("   Cost:       ${:.2}", cost);
    }
    if let Some(notes) = &version.notes {
        println!("   Notes:      {}", notes);
    }
    for checkpoint in &version.checkpoints {
        println!(
            "   Checkpoint: {} {}",
            checkpoint.created_at.format("%Y-%m-%d %H:%M"),
            checkpoint.notes
        );
    }
}
