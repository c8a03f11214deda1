pub mod env;
pub mod prepare;
pub mod process;

use anyhow::{Context, Result};

use mdsphinx_core::{Layout, Settings};

/// Resolve the configuration root and read `config.yaml`.
pub fn load_config() -> Result<(Layout, Settings)> {
    let layout = Layout::discover().context("failed to resolve configuration root")?;
    let settings = layout
        .settings()
        .with_context(|| format!("failed to read {}", layout.settings_path().display()))?;
    Ok((layout, settings))
}
