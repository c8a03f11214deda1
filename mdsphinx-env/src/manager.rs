//! Environment lifecycle: Absent → Creating → Ready → Removing → Absent.
//!
//! Creation is all-or-nothing for the caller: if bootstrapping the base
//! interpreter or any package install fails, the half-built directory is
//! removed without prompting and nothing is registered. Package installs
//! are not retried.

use std::path::{Path, PathBuf};

use mdsphinx_core::{EnvName, EnvRecord, Invocation, Layout, ProcessRunner, Registry};

use crate::environment::{VirtualEnvironment, DEFAULT_INTERPRETER};
use crate::error::{io_err, EnvError};
use crate::prompt::Confirm;

/// Packages every environment gets before the extra list.
pub const BASE_PACKAGES: &[&str] = &["pip", "sphinx"];

/// Options for [`EnvManager::create`].
#[derive(Debug, Clone)]
pub struct CreateOptions {
    /// Interpreter used to bootstrap the environment (`<python> -m venv <path>`).
    pub base_python: PathBuf,
    /// Replace an existing environment.
    pub recreate: bool,
    /// Ask before removing an existing environment on `recreate`.
    pub prompt: bool,
    /// Installed after [`BASE_PACKAGES`], in order.
    pub packages: Vec<String>,
}

/// Operates on environments under one [`Layout`].
pub struct EnvManager<'a> {
    layout: &'a Layout,
    registry: Registry,
    runner: &'a dyn ProcessRunner,
    confirm: &'a dyn Confirm,
    interpreter: String,
}

impl<'a> EnvManager<'a> {
    pub fn new(layout: &'a Layout, runner: &'a dyn ProcessRunner, confirm: &'a dyn Confirm) -> Self {
        Self {
            layout,
            registry: Registry::for_layout(layout),
            runner,
            confirm,
            interpreter: DEFAULT_INTERPRETER.to_string(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Registry commands
    // -----------------------------------------------------------------------

    /// Register an existing environment directory under `name`.
    pub fn add(&self, name: &EnvName, path: &Path) -> Result<(), EnvError> {
        Ok(self.registry.put(name, path)?)
    }

    /// Forget `name` without touching its directory.
    pub fn delete(&self, name: &EnvName) -> Result<(), EnvError> {
        Ok(self.registry.delete(name)?)
    }

    pub fn list(&self) -> Result<Vec<EnvRecord>, EnvError> {
        let records = self.registry.list()?;
        if records.is_empty() {
            tracing::warn!(action = "list", "no environments found");
        }
        for (index, record) in records.iter().enumerate() {
            tracing::debug!(action = "list", index, name = %record.name, path = %record.path.display());
        }
        Ok(records)
    }

    /// Registered environment for `name`.
    pub fn lookup(&self, name: &EnvName) -> Result<VirtualEnvironment, EnvError> {
        Ok(VirtualEnvironment::from_db(&self.registry, name)?.with_interpreter(&self.interpreter))
    }

    /// Deterministic, possibly unregistered environment for `name`.
    pub fn locate(&self, name: &EnvName) -> VirtualEnvironment {
        VirtualEnvironment::from_name(self.layout, name).with_interpreter(&self.interpreter)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create, populate, and register the environment `name`.
    pub fn create(&self, name: &EnvName, opts: &CreateOptions) -> Result<VirtualEnvironment, EnvError> {
        let venv = self.locate(name);

        if venv.exists() {
            if !opts.recreate {
                tracing::error!(
                    action = "create",
                    name = %name,
                    path = %venv.path.display(),
                    "environment already exists"
                );
                return Err(EnvError::AlreadyExists {
                    name: name.0.clone(),
                    path: venv.path.clone(),
                });
            }
            if !self.remove(name, opts.prompt)? {
                return Err(EnvError::Cancelled {
                    name: name.0.clone(),
                    path: venv.path.clone(),
                });
            }
        }

        tracing::info!(action = "create", name = %name, path = %venv.path.display());
        if let Err(err) = self.populate(&venv, opts) {
            tracing::error!(action = "create", name = %name, error = %err, "creation failed; cleaning up");
            self.teardown(&venv)?;
            return Err(err);
        }

        self.registry.put(name, &venv.path)?;
        Ok(venv)
    }

    /// Remove the environment directory and its registry entry.
    ///
    /// Returns `Ok(false)` when the user declines the prompt; nothing is
    /// deleted in that case.
    pub fn remove(&self, name: &EnvName, prompt: bool) -> Result<bool, EnvError> {
        let venv = self.locate(name);
        if !venv.exists() {
            tracing::error!(action = "remove", name = %name, path = %venv.path.display(), "environment not found");
            return Err(EnvError::NotFound {
                name: name.0.clone(),
                path: venv.path,
            });
        }

        let question = format!("Remove {}?", venv.path.display());
        if prompt && !self.confirm.confirm(&question) {
            tracing::error!(action = "remove", name = %name, path = %venv.path.display(), "operation cancelled");
            return Ok(false);
        }

        tracing::info!(action = "remove", name = %name, path = %venv.path.display(), "removing environment");
        std::fs::remove_dir_all(&venv.path).map_err(|e| io_err(&venv.path, e))?;
        self.registry.delete(name)?;
        Ok(true)
    }

    fn populate(&self, venv: &VirtualEnvironment, opts: &CreateOptions) -> Result<(), EnvError> {
        if let Some(parent) = venv.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let bootstrap = Invocation::new(&opts.base_python)
            .args(["-m", "venv"])
            .arg(&venv.path);
        self.runner.run(&bootstrap)?;

        for package in BASE_PACKAGES
            .iter()
            .copied()
            .chain(opts.packages.iter().map(String::as_str))
        {
            venv.install(self.runner, package)?;
        }
        Ok(())
    }

    /// Non-interactive removal of a half-built environment.
    fn teardown(&self, venv: &VirtualEnvironment) -> Result<(), EnvError> {
        match self.remove(&venv.name, false) {
            Ok(_) | Err(EnvError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
