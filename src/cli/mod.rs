pub mod cycle;
pub mod detect;
pub mod rollback;
pub mod status;
pub mod versions;

use crate::models::{LifecycleConfig, MetricSnapshot};
use crate::state::StorageLayout;
use crate::Result;
use anyhow::Context;
use std::path::Path;

/// Load `evolvd.toml` from the project root and resolve the codebase layout
pub(crate) fn load_context(project_root: &Path, codebase: &str) -> Result<(LifecycleConfig, StorageLayout)> {
    let config = LifecycleConfig::load(project_root)
        .with_context(|| format!("Failed to load config from {}", project_root.display()))?;
    let layout = StorageLayout::from_config(&config.storage, codebase)?;
    Ok((config, layout))
}

/// Read a run snapshot from a JSON file
pub(crate) fn read_snapshot(path: &Path) -> Result<MetricSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read metrics file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse metrics file {}", path.display()))
}
