use crate::error::{LifecycleError, LifecycleResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name looked up in the project root
pub const CONFIG_FILE: &str = "evolvd.toml";

// =============================================================================
// Obsolescence Thresholds
// =============================================================================

/// Which instant the regeneration cooldown window starts from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CooldownAnchor {
    /// Previous snapshot's last-run time
    #[default]
    LastDetection,
    /// Creation time of the active version; no cooldown before the first one
    LastRegeneration,
}

/// Trip points for the obsolescence checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObsolescenceThresholds {
    pub files_changed_percent: f64,
    pub new_languages_trigger: bool,
    pub coverage_min_percent: f64,
    pub stale_run_days_max: u32,
    pub error_rate_max_percent: f64,
    pub cooldown_days: u32,
    pub cooldown_anchor: CooldownAnchor,
    pub false_positive_spike_factor: f64,
}

impl Default for ObsolescenceThresholds {
    fn default() -> Self {
        Self {
            files_changed_percent: 30.0,
            new_languages_trigger: true,
            coverage_min_percent: 85.0,
            stale_run_days_max: 30,
            error_rate_max_percent: 5.0,
            cooldown_days: 7,
            cooldown_anchor: CooldownAnchor::default(),
            false_positive_spike_factor: 1.5,
        }
    }
}

impl ObsolescenceThresholds {
    /// Reject values the detector cannot reason about
    pub fn validate(&self) -> LifecycleResult<()> {
        let percents = [
            ("files_changed_percent", self.files_changed_percent),
            ("coverage_min_percent", self.coverage_min_percent),
            ("error_rate_max_percent", self.error_rate_max_percent),
        ];
        for (name, value) in percents {
            if !value.is_finite() || !(0.0..=100.0).contains(&value) {
                return Err(LifecycleError::Configuration(format!(
                    "thresholds.{} must be between 0 and 100, got {}",
                    name, value
                )));
            }
        }

        if !self.false_positive_spike_factor.is_finite() || self.false_positive_spike_factor < 1.0
        {
            return Err(LifecycleError::Configuration(format!(
                "thresholds.false_positive_spike_factor must be at least 1.0, got {}",
                self.false_positive_spike_factor
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Approval
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApprovalConfig {
    /// Approve low-risk, auto-approve-eligible requests without asking
    pub auto_approve_low_risk: bool,

    /// How many invalid reviewer answers are tolerated before deferring
    pub max_review_attempts: u32,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            auto_approve_low_risk: true,
            max_review_attempts: 3,
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per target codebase
    pub root: PathBuf,

    /// Override for the live workspace directory (defaults to `<codebase>/current`)
    pub workspace_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".evolvd"),
            workspace_dir: None,
        }
    }
}

// =============================================================================
// External Commands
// =============================================================================

/// Command lines for the generation, build and validation collaborators
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Generator command; the prompt is piped to stdin
    pub generate: Vec<String>,

    /// Build command, run inside the generated source tree
    pub build: Vec<String>,

    /// Path of the built executable, relative to the source tree
    pub binary: Option<PathBuf>,

    /// Extra arguments passed to the executable before the target path
    pub run_args: Vec<String>,

    /// Limit for each external step
    pub timeout_secs: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            generate: vec!["claude".to_string(), "-p".to_string()],
            build: vec![
                "cargo".to_string(),
                "build".to_string(),
                "--release".to_string(),
            ],
            binary: None,
            run_args: Vec::new(),
            timeout_secs: 900,
        }
    }
}

impl CommandsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Lifecycle Configuration
// =============================================================================

/// Top-level evolvd configuration, loaded once per run
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub thresholds: ObsolescenceThresholds,

    #[serde(default)]
    pub approval: ApprovalConfig,

    #[serde(default)]
    pub commands: CommandsConfig,
}

impl LifecycleConfig {
    /// Load config from `evolvd.toml` in the project root, defaults if absent
    pub fn load(project_root: &Path) -> LifecycleResult<Self> {
        let config_path = project_root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| LifecycleError::io(&config_path, e))?;
        let mut config = Self::from_toml(&content)?;

        if config.storage.root.is_relative() {
            config.storage.root = project_root.join(&config.storage.root);
        }
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> LifecycleResult<Self> {
        let config: LifecycleConfig = toml::from_str(content)
            .map_err(|e| LifecycleError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LifecycleResult<()> {
        self.thresholds.validate()?;

        if self.approval.max_review_attempts == 0 {
            return Err(LifecycleError::Configuration(
                "approval.max_review_attempts must be at least 1".to_string(),
            ));
        }
        if self.commands.timeout_secs == 0 {
            return Err(LifecycleError::Configuration(
                "commands.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Save config to `evolvd.toml`
    pub fn save(&self, project_root: &Path) -> anyhow::Result<()> {
        let config_path = project_root.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }
}
