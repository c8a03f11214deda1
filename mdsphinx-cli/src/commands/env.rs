//! `mdsphinx env`: register, create, list and remove environments.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use mdsphinx_core::{EnvName, EnvRecord, SystemRunner};
use mdsphinx_env::{CreateOptions, EnvManager, StdinConfirm};

use super::load_config;

/// Bootstrap interpreter used by `env create` when `--python` is omitted.
const DEFAULT_BASE_PYTHON: &str = "python3";

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// Register an existing environment directory.
    Add(AddArgs),
    /// Forget a registered environment without deleting it.
    Del(DelArgs),
    /// List registered environments.
    List,
    /// Create and register a new environment.
    Create(CreateArgs),
    /// Delete an environment directory and its registry entry.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct AddArgs {
    #[arg(long)]
    pub name: String,

    /// Root directory of the environment.
    #[arg(long)]
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct DelArgs {
    #[arg(long)]
    pub name: String,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Environment name (defaults to the configured default environment).
    #[arg(long)]
    pub name: Option<String>,

    /// Interpreter used to bootstrap the environment.
    #[arg(long, default_value = DEFAULT_BASE_PYTHON)]
    pub python: PathBuf,

    /// Extra package to install; repeatable. Replaces the configured defaults.
    #[arg(long = "package", value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Replace the environment if it already exists.
    #[arg(long)]
    pub recreate: bool,

    /// Do not ask before removing an existing environment.
    #[arg(long)]
    pub no_prompt: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    #[arg(long)]
    pub name: Option<String>,

    /// Do not ask for confirmation.
    #[arg(long)]
    pub no_prompt: bool,
}

#[derive(Tabled)]
struct EnvRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Exists")]
    exists: String,
}

pub fn run(command: EnvCommand) -> Result<()> {
    let (layout, settings) = load_config()?;
    let runner = SystemRunner;
    let confirm = StdinConfirm;
    let manager = EnvManager::new(&layout, &runner, &confirm).with_interpreter(&settings.interpreter);
    let name_or_default = |name: Option<String>| name.map(EnvName::from).unwrap_or_else(|| settings.default_env_name());

    match command {
        EnvCommand::Add(args) => {
            let name = EnvName::from(args.name);
            manager
                .add(&name, &args.path)
                .with_context(|| format!("failed to register environment '{name}'"))?;
            println!("{} {} -> {}", "Registered".green(), name, args.path.display());
        }
        EnvCommand::Del(args) => {
            let name = EnvName::from(args.name);
            manager
                .delete(&name)
                .with_context(|| format!("failed to delete environment '{name}'"))?;
            println!("{} {}", "Deleted".green(), name);
        }
        EnvCommand::List => {
            let records = manager.list().context("failed to read environment registry")?;
            if !records.is_empty() {
                print_table(&records);
            }
        }
        EnvCommand::Create(args) => {
            let name = name_or_default(args.name);
            let packages = if args.packages.is_empty() {
                settings.default_packages.clone()
            } else {
                args.packages
            };
            let opts = CreateOptions {
                base_python: args.python,
                recreate: args.recreate,
                prompt: !args.no_prompt,
                packages,
            };
            let venv = manager
                .create(&name, &opts)
                .with_context(|| format!("failed to create environment '{name}'"))?;
            println!("{} {} at {}", "Created".green(), name, venv.path.display());
        }
        EnvCommand::Remove(args) => {
            let name = name_or_default(args.name);
            let removed = manager
                .remove(&name, !args.no_prompt)
                .with_context(|| format!("failed to remove environment '{name}'"))?;
            if !removed {
                bail!("removal of environment '{name}' was cancelled");
            }
            println!("{} {}", "Removed".green(), name);
        }
    }
    Ok(())
}

fn print_table(records: &[EnvRecord]) {
    let rows: Vec<EnvRow> = records
        .iter()
        .enumerate()
        .map(|(index, record)| EnvRow {
            index,
            name: record.name.to_string(),
            path: record.path.display().to_string(),
            exists: if record.path.is_dir() {
                "yes".green().to_string()
            } else {
                "no".red().to_string()
            },
        })
        .collect();
    println!("{}", Table::new(rows).with(Style::rounded()));
}
