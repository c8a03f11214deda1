//! Generator project configuration (`sphinx-quickstart`).
//!
//! `conf.py` is generated once per job directory and reused on later
//! builds unless a reconfigure is requested.

use std::path::{Path, PathBuf};

use mdsphinx_core::{Invocation, ProcessRunner};
use mdsphinx_env::VirtualEnvironment;

use crate::error::{io_err, BuildError};

pub const CONFIG_TEMPLATE: &str = "conf.py.jinja";
const PROJECT: &str = "mdsphinx";
const VERSION: &str = "1.0.0";

/// Where quickstart looks for configuration templates.
#[derive(Debug, Clone)]
pub struct TemplateDirs {
    /// `<config_root>/templates`
    pub config_templates: PathBuf,
    pub cwd: PathBuf,
}

impl TemplateDirs {
    /// First directory holding a `conf.py.jinja`: the input's parent, then
    /// the cwd, then the config templates directory.
    pub fn custom_templatedir(&self, input: &Path) -> Option<PathBuf> {
        input
            .parent()
            .into_iter()
            .chain([self.cwd.as_path(), self.config_templates.as_path()])
            .find(|root| root.join(CONFIG_TEMPLATE).is_file())
            .map(Path::to_path_buf)
    }

    /// The user's own `conf.py.jinja`, exposed to templates as
    /// `main_sphinx_config`.
    pub fn main_config(&self) -> Option<PathBuf> {
        let path = self.config_templates.join(CONFIG_TEMPLATE);
        path.is_file().then_some(path)
    }
}

/// The stock quickstart template shipped with the environment's sphinx.
pub fn base_config(venv: &VirtualEnvironment) -> Option<PathBuf> {
    venv.find_in_site_packages(
        &Path::new("sphinx")
            .join("templates")
            .join("quickstart")
            .join(CONFIG_TEMPLATE),
    )
}

/// The full `sphinx-quickstart` command for `input` into `out_root`.
pub fn quickstart_invocation(
    venv: &VirtualEnvironment,
    input: &Path,
    out_root: &Path,
    dirs: &TemplateDirs,
) -> Invocation {
    let mut args: Vec<String> = vec![
        "-p".into(),
        PROJECT.into(),
        "-a".into(),
        PROJECT.into(),
        "-v".into(),
        VERSION.into(),
        "--no-batchfile".into(),
        "--no-makefile".into(),
        "--ext-mathjax".into(),
    ];

    if venv.has_package("myst_parser") {
        args.extend(["--extensions".into(), "myst_parser".into()]);
    }
    if let Some(dir) = dirs.custom_templatedir(input) {
        args.extend(["--templatedir".into(), dir.display().to_string()]);
    }
    if let Some(base) = base_config(venv) {
        args.extend(["-d".into(), format!("base_sphinx_config={}", base.display())]);
    }
    if let Some(main) = dirs.main_config() {
        args.extend(["-d".into(), format!("main_sphinx_config={}", main.display())]);
    }
    args.extend(["--sep".into(), "-q".into()]);

    if input.is_file() {
        let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned());
        let suffix = input.extension().map(|e| format!(".{}", e.to_string_lossy()));
        if let (Some(stem), Some(suffix)) = (stem, suffix) {
            args.extend(["--master".into(), stem, "--suffix".into(), suffix]);
        }
    }

    venv.command("sphinx-quickstart", args).arg(out_root)
}

/// Generate `<out_root>/source/conf.py` if it is missing, or always when
/// `reconfigure` is set. Returns whether quickstart ran.
pub fn sphinx_quickstart(
    runner: &dyn ProcessRunner,
    venv: &VirtualEnvironment,
    input: &Path,
    out_root: &Path,
    dirs: &TemplateDirs,
    reconfigure: bool,
) -> Result<bool, BuildError> {
    let conf = out_root.join("source").join("conf.py");

    if reconfigure && conf.exists() {
        tracing::info!(action = "reconfigure", path = %conf.display());
        std::fs::remove_file(&conf).map_err(|e| io_err(&conf, e))?;
    }
    if conf.exists() {
        tracing::debug!(action = "quickstart", path = %conf.display(), "configuration present");
        return Ok(false);
    }

    tracing::info!(action = "quickstart", path = %out_root.display(), env = %venv.name);
    runner.run(&quickstart_invocation(venv, input, out_root, dirs))?;
    Ok(true)
}
