//! External process port.
//!
//! Every external step (interpreter bootstrap, package installs, document
//! generator, LaTeX compiler, diagram renderer) goes through a
//! [`ProcessRunner`]. Calls are synchronous and fail fast: a nonzero exit
//! becomes [`ProcessError::Failed`] and nothing is retried.

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Command;

use crate::error::ProcessError;

/// A single command line to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Program followed by its arguments, lossily converted for logging.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Runs invocations to completion.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<(), ProcessError>;
}

/// [`ProcessRunner`] that spawns real processes with inherited stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<(), ProcessError> {
        tracing::info!(action = "run", command = ?invocation.argv());

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let status = command.status().map_err(|source| ProcessError::Spawn {
            program: invocation.program_name(),
            source,
        })?;
        if !status.success() {
            tracing::error!(
                action = "run",
                program = %invocation.program_name(),
                code = ?status.code(),
                "command failed"
            );
            return Err(ProcessError::Failed {
                program: invocation.program_name(),
                code: status.code(),
            });
        }
        Ok(())
    }
}
