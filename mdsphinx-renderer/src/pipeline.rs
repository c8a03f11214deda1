//! Source tree materialization.
//!
//! Walks the input tree top-down and, for each file:
//!
//! | class    | extensions                              | action                  |
//! |----------|-----------------------------------------|-------------------------|
//! | source   | md, markdown, rst, txt (any case)       | template-expand         |
//! | resource | png, jpg, jpeg, gif, svg, pdf (exact)   | copy byte-for-byte      |
//! | other    |                                         | ignore                  |
//!
//! Outputs mirror the input's relative layout under `<out_root>/source/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::{DirEntry, WalkDir};

use mdsphinx_core::ProcessRunner;

use crate::context::RenderContext;
use crate::engine::TemplateEngine;
use crate::error::{io_err, RenderError};

pub const SOURCE_EXTENSIONS: &[&str] = &["md", "markdown", "rst", "txt"];
pub const RESOURCE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "pdf"];
pub const EXCLUDED_DIRS: &[&str] = &[".git", ".github", ".vscode", "__pycache__", ".venv", "venv", ".idea"];

/// Staging subfolder of the job directory that receives rendered sources.
pub const SOURCE_DIR: &str = "source";
const IGNORE_MARKER: (&str, &str) = (".gitignore", "*\n");

/// What happened to one output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Written verbatim (the ignore marker).
    Created { path: PathBuf },
    /// Template-expanded source.
    Rendered { path: PathBuf },
    /// Copied resource.
    Mirrored { path: PathBuf },
}

impl RenderOutcome {
    pub fn path(&self) -> &Path {
        match self {
            RenderOutcome::Created { path }
            | RenderOutcome::Rendered { path }
            | RenderOutcome::Mirrored { path } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileClass {
    Source,
    Resource,
    Ignored,
}

fn classify(path: &Path) -> FileClass {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return FileClass::Ignored;
    };
    if SOURCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()) {
        FileClass::Source
    } else if RESOURCE_EXTENSIONS.contains(&ext) {
        FileClass::Resource
    } else {
        FileClass::Ignored
    }
}

/// Regular files, including symlinks to them. Symlinked directories are
/// never followed.
fn is_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    if file_type.is_symlink() {
        return std::fs::metadata(entry.path()).is_ok_and(|meta| meta.is_file());
    }
    file_type.is_file()
}

/// Renders one input tree into one job directory.
pub struct Renderer {
    inp_root: PathBuf,
    inp_path: Option<PathBuf>,
    out_root: PathBuf,
    context: RenderContext,
    engine: TemplateEngine,
}

impl Renderer {
    /// `inp_path`, when set, must be a file directly inside `inp_root`; only
    /// that source is rendered and traversal stops after the first level.
    pub fn new(
        inp_root: impl Into<PathBuf>,
        inp_path: Option<PathBuf>,
        out_root: impl Into<PathBuf>,
        context: RenderContext,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            inp_root: inp_root.into(),
            inp_path,
            out_root: out_root.into(),
            context,
            engine: TemplateEngine::new(runner),
        }
    }

    pub fn out_root(&self) -> &Path {
        &self.out_root
    }

    pub fn render(&self) -> Result<Vec<RenderOutcome>, RenderError> {
        tracing::info!(
            action = "render",
            inp_root = %self.inp_root.display(),
            inp_path = ?self.inp_path,
            out_root = %self.out_root.display()
        );

        let mut outcomes = Vec::new();
        std::fs::create_dir_all(&self.out_root).map_err(|e| io_err(&self.out_root, e))?;
        outcomes.push(self.write_marker()?);

        let out_root_real = self.out_root.canonicalize().ok();
        let mut walker = WalkDir::new(&self.inp_root).sort_by_file_name();
        if self.inp_path.is_some() {
            walker = walker.max_depth(1);
        }

        let entries = walker
            .into_iter()
            .filter_entry(|e| !self.is_pruned(e, out_root_real.as_deref()));
        for entry in entries {
            let entry = entry?;
            if !is_file(&entry) {
                continue;
            }
            let path = entry.path();
            match classify(path) {
                FileClass::Source => {
                    if self.inp_path.as_deref().is_some_and(|only| only != path) {
                        continue;
                    }
                    outcomes.push(self.render_source(path)?);
                }
                FileClass::Resource => outcomes.push(self.mirror_resource(path)?),
                FileClass::Ignored => {
                    tracing::debug!(action = "skip", path = %path.display());
                }
            }
        }
        Ok(outcomes)
    }

    /// Directories below the root that must not be descended into.
    fn is_pruned(&self, entry: &DirEntry, out_root_real: Option<&Path>) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || EXCLUDED_DIRS.contains(&name.as_ref()) {
            return true;
        }
        entry.path() == self.out_root
            || out_root_real.is_some_and(|real| entry.path().canonicalize().ok().as_deref() == Some(real))
    }

    fn staged_path(&self, input: &Path) -> PathBuf {
        let relative = input.strip_prefix(&self.inp_root).unwrap_or(input);
        self.out_root.join(SOURCE_DIR).join(relative)
    }

    fn write_marker(&self) -> Result<RenderOutcome, RenderError> {
        let (name, content) = IGNORE_MARKER;
        let path = self.out_root.join(name);
        tracing::info!(action = "create", path = %path.display());
        std::fs::write(&path, content).map_err(|e| io_err(&path, e))?;
        Ok(RenderOutcome::Created { path })
    }

    fn render_source(&self, source: &Path) -> Result<RenderOutcome, RenderError> {
        let out_path = self.staged_path(source);
        let content = std::fs::read_to_string(source).map_err(|e| io_err(source, e))?;
        ensure_parent(&out_path)?;
        let rendered = self.engine.render(source, &content, &out_path, &self.context)?;

        tracing::info!(action = "rendered", path = %out_path.display());
        std::fs::write(&out_path, rendered).map_err(|e| io_err(&out_path, e))?;
        Ok(RenderOutcome::Rendered { path: out_path })
    }

    fn mirror_resource(&self, resource: &Path) -> Result<RenderOutcome, RenderError> {
        let out_path = self.staged_path(resource);
        tracing::info!(action = "mirror", path = %out_path.display());
        ensure_parent(&out_path)?;
        std::fs::copy(resource, &out_path).map_err(|e| io_err(&out_path, e))?;
        Ok(RenderOutcome::Mirrored { path: out_path })
    }
}

fn ensure_parent(path: &Path) -> Result<(), RenderError> {
    match path.parent() {
        Some(parent) => std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("a.md", FileClass::Source)]
    #[case("a.MD", FileClass::Source)]
    #[case("notes.Markdown", FileClass::Source)]
    #[case("index.rst", FileClass::Source)]
    #[case("a.txt", FileClass::Source)]
    #[case("a.png", FileClass::Resource)]
    #[case("a.jpeg", FileClass::Resource)]
    #[case("a.pdf", FileClass::Resource)]
    #[case("a.PNG", FileClass::Ignored)]
    #[case("a.py", FileClass::Ignored)]
    #[case("Makefile", FileClass::Ignored)]
    fn classification(#[case] name: &str, #[case] expected: FileClass) {
        assert_eq!(classify(Path::new(name)), expected);
    }
}
