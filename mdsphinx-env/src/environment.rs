//! A named isolated environment: `{name, path}` plus derived locations.
//!
//! Values are short-lived projections. They never hold the registry open;
//! build a fresh one with [`VirtualEnvironment::from_db`] or
//! [`VirtualEnvironment::from_name`] for every operation.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use mdsphinx_core::{EnvName, Invocation, Layout, ProcessError, ProcessRunner, Registry};

use crate::error::EnvError;

pub const DEFAULT_INTERPRETER: &str = "python";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnvironment {
    pub name: EnvName,
    pub path: PathBuf,
    interpreter: String,
}

impl VirtualEnvironment {
    pub fn new(name: EnvName, path: PathBuf) -> Self {
        Self {
            name,
            path,
            interpreter: DEFAULT_INTERPRETER.to_string(),
        }
    }

    /// Look the environment up in the registry.
    ///
    /// Fails when the name is not registered, even if a matching directory
    /// exists on disk.
    pub fn from_db(registry: &Registry, name: &EnvName) -> Result<Self, EnvError> {
        let path = registry.get(name)?;
        tracing::info!(name = %name, path = %path.display(), "resolved environment");
        Ok(Self::new(name.clone(), path))
    }

    /// Deterministic location under the layout, without consulting the registry.
    pub fn from_name(layout: &Layout, name: &EnvName) -> Self {
        Self::new(name.clone(), layout.environment_path(name))
    }

    /// Override the interpreter executable name (default `python`).
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// The directory is the source of truth for usability.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.path.join("bin")
    }

    /// `<path>/bin/<interpreter>`
    pub fn interpreter_path(&self) -> PathBuf {
        self.bin_dir().join(&self.interpreter)
    }

    /// Invocation of an executable installed in the environment's `bin/`.
    pub fn command<I, S>(&self, executable: &str, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Invocation::new(self.bin_dir().join(executable)).args(args)
    }

    /// Run an executable installed in the environment's `bin/`.
    pub fn run<I, S>(
        &self,
        runner: &dyn ProcessRunner,
        executable: &str,
        args: I,
    ) -> Result<(), ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        runner.run(&self.command(executable, args))
    }

    /// Run `<interpreter> -m <module> args…`.
    pub fn pyrun<I, S>(
        &self,
        runner: &dyn ProcessRunner,
        module: &str,
        args: I,
    ) -> Result<(), ProcessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let invocation = Invocation::new(self.interpreter_path())
            .arg("-m")
            .arg(module)
            .args(args);
        runner.run(&invocation)
    }

    /// Install or upgrade a single package with the environment's pip.
    pub fn install(&self, runner: &dyn ProcessRunner, package: &str) -> Result<(), ProcessError> {
        tracing::info!(action = "install", name = %self.name, package);
        self.pyrun(runner, "pip", ["install", package, "--upgrade"])
    }

    /// `lib/python*/site-packages` directories of the environment.
    pub fn site_packages(&self) -> Vec<PathBuf> {
        let lib = self.path.join("lib");
        let Ok(entries) = std::fs::read_dir(&lib) else {
            return vec![];
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("python"))
            .map(|e| e.path().join("site-packages"))
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        dirs
    }

    /// Whether an importable package directory named `module` is installed.
    pub fn has_package(&self, module: &str) -> bool {
        self.site_packages().iter().any(|sp| sp.join(module).is_dir())
    }

    /// First existing `<site-packages>/<relative>` path.
    pub fn find_in_site_packages(&self, relative: &Path) -> Option<PathBuf> {
        self.site_packages()
            .into_iter()
            .map(|sp| sp.join(relative))
            .find(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Vec<String>>>);

    impl ProcessRunner for Recorder {
        fn run(&self, invocation: &Invocation) -> Result<(), ProcessError> {
            self.0.lock().unwrap().push(invocation.argv());
            Ok(())
        }
    }

    #[test]
    fn paths_derive_from_environment_root() {
        let venv = VirtualEnvironment::from_name(&Layout::at("/cfg"), &EnvName::from("docs"));
        assert_eq!(venv.path, PathBuf::from("/cfg/environments/venv.docs"));
        assert_eq!(
            venv.interpreter_path(),
            PathBuf::from("/cfg/environments/venv.docs/bin/python")
        );
        let py3 = venv.with_interpreter("python3");
        assert!(py3.interpreter_path().ends_with("bin/python3"));
    }

    #[test]
    fn install_runs_pip_in_upgrade_mode() {
        let venv = VirtualEnvironment::new(EnvName::from("x"), PathBuf::from("/v"));
        let recorder = Recorder::default();
        venv.install(&recorder, "sphinx").unwrap();
        assert_eq!(
            recorder.0.lock().unwrap()[0],
            vec!["/v/bin/python", "-m", "pip", "install", "sphinx", "--upgrade"]
        );
    }

    #[test]
    fn run_targets_bin_directory() {
        let venv = VirtualEnvironment::new(EnvName::from("x"), PathBuf::from("/v"));
        let recorder = Recorder::default();
        venv.run(&recorder, "sphinx-build", ["-b", "html"]).unwrap();
        assert_eq!(
            recorder.0.lock().unwrap()[0],
            vec!["/v/bin/sphinx-build", "-b", "html"]
        );
    }

    #[test]
    fn has_package_scans_site_packages() {
        let tmp = TempDir::new().unwrap();
        let venv = VirtualEnvironment::new(EnvName::from("x"), tmp.path().to_path_buf());
        assert!(!venv.has_package("myst_parser"));

        let sp = tmp.path().join("lib").join("python3.12").join("site-packages");
        std::fs::create_dir_all(sp.join("myst_parser")).unwrap();
        assert!(venv.has_package("myst_parser"));
        assert!(!venv.has_package("nbsphinx"));
        assert_eq!(
            venv.find_in_site_packages(Path::new("myst_parser")),
            Some(sp.join("myst_parser"))
        );
    }
}
