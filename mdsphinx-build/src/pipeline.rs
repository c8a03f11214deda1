//! `prepare` and `process` pipelines shared by the CLI commands.
//!
//! ```text
//! prepare:  input ─► job dir (allocate) ─► [quickstart] ─► render into source/
//! process:  prepare ─► sphinx-build -b <builder> ─► [tectonic] ─► [open]
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mdsphinx_core::{outdir, EnvName, Invocation, Layout, ProcessRunner, Registry};
use mdsphinx_env::VirtualEnvironment;
use mdsphinx_renderer::{RenderContext, RenderOutcome, Renderer};

use crate::builder::{BuilderVariant, OutputFormat, Target};
use crate::error::BuildError;
use crate::quickstart::{sphinx_quickstart, TemplateDirs};

/// LaTeX root document written by the `latex` builder.
pub const LATEX_DOCUMENT: &str = "mdsphinx.tex";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub input: PathBuf,
    /// Explicit context file; discovered next to the input or in the cwd
    /// when `None`.
    pub context: Option<PathBuf>,
    pub tmp_root: PathBuf,
    /// Reuse (and clear) the latest job directory instead of allocating.
    pub overwrite: bool,
    /// Regenerate `conf.py` even if present.
    pub reconfigure: bool,
}

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub prepare: PrepareOptions,
    pub format: OutputFormat,
    pub variant: BuilderVariant,
    pub env_name: EnvName,
    pub show_output: bool,
}

/// Result of a `prepare` run.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub out_root: PathBuf,
    pub outcomes: Vec<RenderOutcome>,
}

/// Result of a `process` run.
#[derive(Debug, Clone)]
pub struct Processed {
    pub out_root: PathBuf,
    pub build_dir: PathBuf,
    /// Primary output file, when the format produces one.
    pub artifact: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Everything the pipelines need from the outside world.
pub struct Pipeline<'a> {
    layout: &'a Layout,
    runner: Arc<dyn ProcessRunner>,
    cwd: PathBuf,
    interpreter: String,
}

impl<'a> Pipeline<'a> {
    pub fn new(layout: &'a Layout, runner: Arc<dyn ProcessRunner>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            layout,
            runner,
            cwd: cwd.into(),
            interpreter: mdsphinx_env::environment::DEFAULT_INTERPRETER.to_string(),
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Registered environment `name`.
    pub fn environment(&self, name: &EnvName) -> Result<VirtualEnvironment, BuildError> {
        let registry = Registry::for_layout(self.layout);
        Ok(VirtualEnvironment::from_db(&registry, name)?.with_interpreter(&self.interpreter))
    }

    /// Materialize `opts.input` into a job directory.
    ///
    /// Quickstart only runs when `env` is given.
    pub fn prepare(
        &self,
        opts: &PrepareOptions,
        env: Option<&VirtualEnvironment>,
    ) -> Result<Prepared, BuildError> {
        let input = resolve_input(&self.cwd, &opts.input)?;
        let (inp_root, inp_path) = if input.is_dir() {
            (input.clone(), None)
        } else {
            let parent = input.parent().map(Path::to_path_buf).unwrap_or_default();
            (parent, Some(input.clone()))
        };

        let tmp_root = absolute(&self.cwd, &opts.tmp_root);
        let key = job_key(&input);
        let out_root = outdir::allocate(&key, &tmp_root, opts.overwrite)?;
        tracing::info!(action = "prepare", key = %key, path = %out_root.display());

        if let Some(venv) = env {
            let dirs = TemplateDirs {
                config_templates: self.layout.templates_dir(),
                cwd: self.cwd.clone(),
            };
            sphinx_quickstart(
                self.runner.as_ref(),
                venv,
                &input,
                &out_root,
                &dirs,
                opts.reconfigure,
            )?;
        }

        let context_path = RenderContext::discover(opts.context.as_deref(), &input, &self.cwd);
        let context = RenderContext::load(context_path.as_deref())?;

        let outcomes = Renderer::new(inp_root, inp_path, &out_root, context, Arc::clone(&self.runner))
            .render()?;
        Ok(Prepared { out_root, outcomes })
    }

    /// Prepare, build with the resolved generator builder, and post-process.
    pub fn process(&self, opts: &ProcessOptions) -> Result<Processed, BuildError> {
        let target = Target::resolve(opts.format, opts.variant)?;
        let venv = self.environment(&opts.env_name)?;
        let input = resolve_input(&self.cwd, &opts.prepare.input)?;

        let Prepared { out_root, .. } = self.prepare(&opts.prepare, Some(&venv))?;

        let source_dir = out_root.join("source");
        let build_dir = out_root.join("build").join(opts.format.as_str());
        tracing::info!(
            action = "build",
            builder = target.builder_name(),
            path = %build_dir.display()
        );
        venv.run(
            self.runner.as_ref(),
            "sphinx-build",
            [
                OsStr::new("-b"),
                OsStr::new(target.builder_name()),
                source_dir.as_os_str(),
                build_dir.as_os_str(),
            ],
        )?;

        if target == Target::Latex {
            let tex = build_dir.join(LATEX_DOCUMENT);
            if !tex.is_file() {
                return Err(BuildError::ArtifactNotFound { path: tex });
            }
            self.runner.run(&Invocation::new("tectonic").arg(&tex))?;
        }

        let artifact = primary_artifact(opts.format, &input, &build_dir);
        if opts.show_output {
            match &artifact {
                Some(path) => self.open(path)?,
                None => tracing::warn!(action = "show-output", format = %opts.format, "no output file to open"),
            }
        }

        Ok(Processed {
            out_root,
            build_dir,
            artifact,
        })
    }

    fn open(&self, path: &Path) -> Result<(), BuildError> {
        if !path.is_file() {
            return Err(BuildError::ArtifactNotFound {
                path: path.to_path_buf(),
            });
        }
        tracing::info!(action = "open", path = %path.display());
        self.runner.run(&Invocation::new(opener()).arg(path))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Absolute, canonical input path.
fn resolve_input(cwd: &Path, input: &Path) -> Result<PathBuf, BuildError> {
    let path = absolute(cwd, input);
    path.canonicalize()
        .map_err(|_| BuildError::InputNotFound { path })
}

/// Job directory key: the input's file name.
pub fn job_key(input: &Path) -> String {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string())
}

/// The file to show for `format`: `mdsphinx.pdf`, `index.html`, or
/// `<stem>.html` for a single-file input. Confluence has none.
pub fn primary_artifact(format: OutputFormat, input: &Path, build_dir: &Path) -> Option<PathBuf> {
    match format {
        OutputFormat::Pdf => Some(build_dir.join(LATEX_DOCUMENT).with_extension("pdf")),
        OutputFormat::Html if input.is_file() => input
            .file_stem()
            .map(|stem| build_dir.join(stem).with_extension("html")),
        OutputFormat::Html => Some(build_dir.join("index.html")),
        OutputFormat::Confluence => None,
    }
}

/// Platform command that opens a file with its default application.
pub fn opener() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}
