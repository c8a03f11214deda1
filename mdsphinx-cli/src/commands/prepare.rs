//! `mdsphinx prepare`: render the input into a job directory.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mdsphinx_build::{Pipeline, PrepareOptions};
use mdsphinx_core::{EnvName, Layout, Settings, SystemRunner};

use super::load_config;

/// Arguments shared by `prepare` and `process`.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Markdown file or directory to render.
    pub input: PathBuf,

    /// Template context file (`.yml`, `.yaml` or `.json`).
    #[arg(long)]
    pub context: Option<PathBuf>,

    /// Root for output job directories.
    #[arg(long)]
    pub tmp_root: Option<PathBuf>,

    /// Reuse and clear the latest job directory for this input.
    #[arg(long)]
    pub overwrite: bool,
}

impl InputArgs {
    pub fn options(&self, settings: &Settings, reconfigure: bool) -> PrepareOptions {
        PrepareOptions {
            input: self.input.clone(),
            context: self.context.clone(),
            tmp_root: self.tmp_root.clone().unwrap_or_else(|| settings.tmp_root()),
            overwrite: self.overwrite,
            reconfigure,
        }
    }
}

/// Arguments for `mdsphinx prepare`.
#[derive(Args, Debug)]
pub struct PrepareArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Also generate the project configuration with this environment.
    #[arg(long)]
    pub env_name: Option<String>,
}

impl PrepareArgs {
    pub fn run(self) -> Result<()> {
        let (layout, settings) = load_config()?;
        let pipeline = pipeline(&layout, &settings)?;

        let venv = match self.env_name {
            Some(name) => Some(pipeline.environment(&EnvName::from(name))?),
            None => None,
        };
        let opts = self.input.options(&settings, false);
        let prepared = pipeline
            .prepare(&opts, venv.as_ref())
            .with_context(|| format!("failed to prepare {}", opts.input.display()))?;

        println!(
            "{} {} file(s) into {}",
            "Prepared".green(),
            prepared.outcomes.len(),
            prepared.out_root.display()
        );
        Ok(())
    }
}

/// Pipeline over the real process runner and working directory.
pub fn pipeline<'a>(layout: &'a Layout, settings: &Settings) -> Result<Pipeline<'a>> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(Pipeline::new(layout, Arc::new(SystemRunner), cwd).with_interpreter(&settings.interpreter))
}
