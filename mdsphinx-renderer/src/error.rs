//! Error types for mdsphinx-renderer.

use std::path::{Path, PathBuf};

use mdsphinx_core::ProcessError;
use thiserror::Error;

/// All errors that can arise while materializing a source tree.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk input tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// Context file extension is neither JSON nor YAML.
    #[error("can not load context from {path}: expected .json, .yaml or .yml")]
    UnsupportedContext { path: PathBuf },

    /// Context file could not be parsed.
    #[error("failed to parse context at {path}: {message}")]
    Context { path: PathBuf, message: String },

    /// A template referenced a key the context does not define.
    #[error("undefined variable '{name}' in {path}")]
    UndefinedVariable { name: String, path: PathBuf },

    /// Any other template engine failure (syntax, bad function arguments).
    #[error("failed to render {path}: {source}")]
    Template {
        path: PathBuf,
        #[source]
        source: tera::Error,
    },

    #[error(transparent)]
    Diagram(#[from] DiagramError),
}

/// Errors from the diagram renderer.
#[derive(Debug, Error)]
pub enum DiagramError {
    #[error("expected diagram output to have a .svg, .png or .pdf extension, got {path}")]
    UnsupportedOutput { path: PathBuf },

    #[error("expected diagram input to have a .mmd extension, got {path}")]
    UnsupportedInput { path: PathBuf },

    #[error("diagram output {path} already exists")]
    OutputExists { path: PathBuf },

    #[error("diagram input {path} not found")]
    InputNotFound { path: PathBuf },

    /// The renderer exited cleanly but produced no image.
    #[error("diagram renderer did not produce {path}")]
    ImageNotFound { path: PathBuf },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl AsRef<Path>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.as_ref().to_path_buf(),
        source,
    }
}

pub(crate) fn diagram_io(path: impl AsRef<Path>, source: std::io::Error) -> DiagramError {
    DiagramError::Io {
        path: path.as_ref().to_path_buf(),
        source,
    }
}
