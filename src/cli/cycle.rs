use super::{load_context, read_snapshot};
use crate::approval::{ApprovalGate, ConsoleReviewer, PolicyReviewer, ReviewDecider};
use crate::orchestrator::{
    BinaryRunner, CommandBuilder, CommandGenerator, CycleInput, CycleOutcome, LifecycleDriver,
};
use crate::Result;
use colored::Colorize;
use std::path::Path;
use tracing::Instrument;

pub struct CycleOptions<'a> {
    pub metrics: &'a Path,
    pub target: &'a Path,
    pub interactive: bool,
    pub yes: bool,
}

pub async fn run(project_root: &Path, codebase: &str, options: CycleOptions<'_>) -> Result<()> {
    let (config, _layout) = load_context(project_root, codebase)?;
    let snapshot = read_snapshot(options.metrics)?;

    let reviewer: Option<Box<dyn ReviewDecider>> = if options.yes {
        Some(Box::new(PolicyReviewer::always_approve()))
    } else if options.interactive {
        Some(Box::new(ConsoleReviewer::new()))
    } else {
        None
    };
    let gate = match reviewer {
        Some(reviewer) => ApprovalGate::with_reviewer(config.approval.clone(), reviewer),
        None => ApprovalGate::new(config.approval.clone()),
    };

    let show_progress = options.interactive;
    let commands = config.commands.clone();
    let mut driver = LifecycleDriver::new(
        config,
        codebase,
        gate,
        Box::new(CommandGenerator::new(&commands, show_progress)),
        Box::new(CommandBuilder::new(&commands, show_progress)),
        Box::new(BinaryRunner::new(&commands, show_progress)),
    )?;

    let run_id = uuid::Uuid::new_v4();
    println!("{}", format!("Lifecycle cycle for: {}", codebase).cyan().bold());
    let report = driver
        .run_cycle(CycleInput {
            snapshot,
            target_path: options.target.to_path_buf(),
            interactive: options.interactive || options.yes,
        })
        .instrument(tracing::info_span!("cycle", %run_id, codebase))
        .await?;

    print!("{}", report.detection.format_summary());
    if let Some(approval) = &report.approval {
        if let Some(notes) = &approval.notes {
            println!("   Notes: {}", notes);
        }
    }

    match &report.outcome {
        CycleOutcome::NoAction => println!("{}", "✓ No regeneration needed".green()),
        CycleOutcome::AwaitingReview => println!(
            "{}",
            "⏸ Regeneration needs review; rerun with --interactive".yellow()
        ),
        CycleOutcome::Rejected => println!("{}", "✗ Regeneration rejected".yellow()),
        CycleOutcome::Regenerated { version } => println!(
            "{}",
            format!("✓ Regenerated and activated v{}", version.version)
                .green()
                .bold()
        ),
        CycleOutcome::BuildFailed { version, .. } | CycleOutcome::ValidationFailed { version, .. } => {
            println!(
                "{}",
                format!("✗ v{} recorded as failed; active version unchanged", version.version).red()
            );
        }
    }

    if let Some(err) = report.validation_error() {
        return Err(err.into());
    }
    Ok(())
}
