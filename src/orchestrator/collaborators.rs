//! External collaborators: generation, build, and validation run
//!
//! These steps are outside the lifecycle core. The core only depends on the
//! traits; the `Command*` types drive them through external processes.

use super::process::ProcessRunner;
use crate::models::{CommandsConfig, GenerationProvenance};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Everything a generator needs to produce a new artifact source tree
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub codebase: String,
    /// Target codebase the artifact will document
    pub target_path: PathBuf,
    /// Empty directory to generate into
    pub output_dir: PathBuf,
    /// Why regeneration was triggered
    pub reasons: Vec<String>,
    /// Reviewer parameter overrides
    pub parameters: BTreeMap<String, String>,
    /// Version being replaced, if any
    pub base_version: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct GeneratedArtifact {
    pub source_tree: PathBuf,
    pub provenance: GenerationProvenance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Built { executable: PathBuf },
    Failed { output: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub success: bool,
    pub output: String,
}

#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedArtifact>;
}

/// Source tree → executable path or build failure
#[async_trait]
pub trait ArtifactBuilder: Send + Sync {
    async fn build(&self, source_tree: &Path) -> Result<BuildOutcome>;
}

/// Executable + target path → success/failure plus captured output
#[async_trait]
pub trait ArtifactRunner: Send + Sync {
    async fn run(&self, executable: &Path, target: &Path) -> Result<RunOutcome>;
}

// =============================================================================
// Command-backed implementations
// =============================================================================

/// Generator that pipes a short brief to an external code-generation CLI
pub struct CommandGenerator {
    command: Vec<String>,
    runner: ProcessRunner,
}

impl CommandGenerator {
    pub fn new(config: &CommandsConfig, show_progress: bool) -> Self {
        Self {
            command: config.generate.clone(),
            runner: ProcessRunner::new(show_progress),
        }
    }

    fn brief(request: &GenerationRequest) -> String {
        let mut brief = format!(
            "Regenerate the documentation tool for codebase '{}' at {}.\n",
            request.codebase,
            request.target_path.display()
        );
        if let Some(base) = request.base_version {
            brief.push_str(&format!("It replaces version {}.\n", base));
        }
        brief.push_str("Triggers:\n");
        for reason in &request.reasons {
            brief.push_str(&format!("- {}\n", reason));
        }
        if !request.parameters.is_empty() {
            brief.push_str("Parameters:\n");
            for (key, value) in &request.parameters {
                brief.push_str(&format!("- {} = {}\n", key, value));
            }
        }
        brief.push_str(&format!(
            "Write the complete source tree into {}.\n",
            request.output_dir.display()
        ));
        brief
    }
}

#[async_trait]
impl ArtifactGenerator for CommandGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedArtifact> {
        let (program, args) = self
            .command
            .split_first()
            .context("commands.generate is empty")?;

        let mut env = HashMap::new();
        env.insert(
            "EVOLVD_OUTPUT_DIR".to_string(),
            request.output_dir.display().to_string(),
        );
        env.insert(
            "EVOLVD_TARGET".to_string(),
            request.target_path.display().to_string(),
        );
        for (key, value) in &request.parameters {
            env.insert(format!("EVOLVD_PARAM_{}", key.to_uppercase()), value.clone());
        }

        let output = self
            .runner
            .run(program, args, &request.output_dir, &env, Some(&Self::brief(request)))
            .await?;

        if !output.success {
            bail!(
                "Generator '{}' failed with exit code {:?}\n{}",
                program,
                output.exit_code,
                output.tail(20)
            );
        }

        let model = request
            .parameters
            .get("model")
            .cloned()
            .unwrap_or_else(|| program.clone());

        Ok(GeneratedArtifact {
            source_tree: request.output_dir.clone(),
            provenance: GenerationProvenance {
                model: Some(model),
                cost_usd: None,
            },
        })
    }
}

/// Builder running the configured build command inside the source tree
pub struct CommandBuilder {
    command: Vec<String>,
    binary: Option<PathBuf>,
    runner: ProcessRunner,
}

impl CommandBuilder {
    pub fn new(config: &CommandsConfig, show_progress: bool) -> Self {
        Self {
            command: config.build.clone(),
            binary: config.binary.clone(),
            runner: ProcessRunner::new(show_progress),
        }
    }
}

#[async_trait]
impl ArtifactBuilder for CommandBuilder {
    async fn build(&self, source_tree: &Path) -> Result<BuildOutcome> {
        let (program, args) = self
            .command
            .split_first()
            .context("commands.build is empty")?;
        let binary = self
            .binary
            .as_ref()
            .context("commands.binary must name the built executable")?;

        let output = self
            .runner
            .run(program, args, source_tree, &HashMap::new(), None)
            .await?;

        if !output.success {
            return Ok(BuildOutcome::Failed {
                output: output.tail(40),
            });
        }

        let executable = source_tree.join(binary);
        if !executable.is_file() {
            return Ok(BuildOutcome::Failed {
                output: format!(
                    "build succeeded but {} was not produced",
                    executable.display()
                ),
            });
        }

        Ok(BuildOutcome::Built { executable })
    }
}

/// Runner invoking the built executable against the target codebase
pub struct BinaryRunner {
    args: Vec<String>,
    runner: ProcessRunner,
}

impl BinaryRunner {
    pub fn new(config: &CommandsConfig, show_progress: bool) -> Self {
        Self {
            args: config.run_args.clone(),
            runner: ProcessRunner::new(show_progress),
        }
    }
}

#[async_trait]
impl ArtifactRunner for BinaryRunner {
    async fn run(&self, executable: &Path, target: &Path) -> Result<RunOutcome> {
        let mut args = self.args.clone();
        args.push(target.display().to_string());

        let program = executable.to_string_lossy();
        let output = self
            .runner
            .run(&program, &args, target, &HashMap::new(), None)
            .await?;

        Ok(RunOutcome {
            success: output.success,
            output: output.tail(40),
        })
    }
}
