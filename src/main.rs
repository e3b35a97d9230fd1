use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use evolvd::cli::cycle::CycleOptions;
use evolvd::cli::versions::VersionCommands;
use evolvd::models::{LifecycleConfig, CONFIG_FILE};
use evolvd::Result;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "evolvd")]
#[command(author = "Chris Cheng <chris.cheng@shopee.com>")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lifecycle controller for generated code artifacts", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project root holding evolvd.toml
    #[arg(long, global = true, default_value = ".")]
    project: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default evolvd.toml into the project root
    Init {
        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show active version and last recorded metrics for a codebase
    Status {
        codebase: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a metrics snapshot for obsolescence without regenerating
    Detect {
        codebase: String,

        /// Snapshot JSON from the run that just finished
        #[arg(short, long)]
        metrics: PathBuf,

        /// Store the snapshot as the codebase's current metrics
        #[arg(long)]
        save: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one detect → approve → regenerate cycle
    Cycle {
        codebase: String,

        /// Snapshot JSON from the run that just finished
        #[arg(short, long)]
        metrics: PathBuf,

        /// Target codebase the artifact analyzes
        #[arg(short, long, default_value = ".")]
        target: PathBuf,

        /// Ask for approval on the console
        #[arg(short, long)]
        interactive: bool,

        /// Approve any regeneration that needs review
        #[arg(short, long)]
        yes: bool,
    },

    /// Manage stored versions
    #[command(subcommand)]
    Versions(VersionCommands),

    /// Roll back to a previous version
    Rollback {
        codebase: String,

        /// Version to roll back to (default: previous good version)
        #[arg(long)]
        to: Option<u32>,

        /// Only move the active pointer; leave the live workspace as is
        #[arg(long)]
        no_restore: bool,
    },

    /// Show version history
    History {
        codebase: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Attach a checkpoint note to the active version
    Checkpoint {
        codebase: String,

        /// Checkpoint notes
        notes: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("EVOLVD_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", format!("Error: failed to create tokio runtime: {}", e).red());
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_async(cli)) {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

async fn run_async(cli: Cli) -> Result<()> {
    let project = cli.project;

    match cli.command {
        Commands::Init { force } => {
            let path = project.join(CONFIG_FILE);
            if path.exists() && !force {
                println!(
                    "{}",
                    format!("{} already exists (use --force to overwrite)", path.display()).yellow()
                );
                return Ok(());
            }
            LifecycleConfig::default().save(&project)?;
            println!("{}", format!("✓ Wrote {}", path.display()).green());
        }

        Commands::Status { codebase, json } => {
            evolvd::cli::status::run(&project, &codebase, json).await?;
        }

        Commands::Detect {
            codebase,
            metrics,
            save,
            json,
        } => {
            evolvd::cli::detect::run(&project, &codebase, &metrics, save, json).await?;
        }

        Commands::Cycle {
            codebase,
            metrics,
            target,
            interactive,
            yes,
        } => {
            let options = CycleOptions {
                metrics: &metrics,
                target: &target,
                interactive,
                yes,
            };
            evolvd::cli::cycle::run(&project, &codebase, options).await?;
        }

        Commands::Versions(cmd) => {
            evolvd::cli::versions::run(&project, cmd)?;
        }

        Commands::Rollback {
            codebase,
            to,
            no_restore,
        } => {
            evolvd::cli::rollback::run(&project, &codebase, to, !no_restore)?;
        }

        Commands::History { codebase, json } => {
            evolvd::cli::rollback::history(&project, &codebase, json)?;
        }

        Commands::Checkpoint { codebase, notes } => {
            evolvd::cli::rollback::checkpoint(&project, &codebase, &notes)?;
        }

        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "evolvd", &mut io::stdout());
        }
    }

    Ok(())
}
