//! `mdsphinx process`: render, build, and optionally open the result.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mdsphinx_build::{BuilderVariant, OutputFormat, ProcessOptions};
use mdsphinx_core::EnvName;

use super::load_config;
use super::prepare::{pipeline, InputArgs};

/// Arguments for `mdsphinx process`.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output format: pdf, html or confluence.
    #[arg(long, default_value = "pdf")]
    pub to: OutputFormat,

    /// Builder variant: default or single.
    #[arg(long, default_value = "default")]
    pub using: BuilderVariant,

    /// Environment to build with (defaults to the configured default).
    #[arg(long)]
    pub env_name: Option<String>,

    /// Regenerate the project configuration even if present.
    #[arg(long)]
    pub reconfigure: bool,

    /// Open the built output with the platform viewer.
    #[arg(long)]
    pub show_output: bool,
}

impl ProcessArgs {
    pub fn run(self) -> Result<()> {
        let (layout, settings) = load_config()?;
        let pipeline = pipeline(&layout, &settings)?;

        let opts = ProcessOptions {
            prepare: self.input.options(&settings, self.reconfigure),
            format: self.to,
            variant: self.using,
            env_name: self
                .env_name
                .map(EnvName::from)
                .unwrap_or_else(|| settings.default_env_name()),
            show_output: self.show_output,
        };
        let processed = pipeline.process(&opts).with_context(|| {
            format!("failed to build {} as {}", opts.prepare.input.display(), opts.format)
        })?;

        match processed.artifact {
            Some(path) => println!("{} {}", "Built".green(), path.display()),
            None => println!("{} {}", "Built".green(), processed.build_dir.display()),
        }
        Ok(())
    }
}
