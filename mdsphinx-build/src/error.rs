//! Error types for mdsphinx-build.

use std::path::{Path, PathBuf};

use thiserror::Error;

use mdsphinx_core::{AllocError, ProcessError};
use mdsphinx_env::EnvError;
use mdsphinx_renderer::RenderError;

use crate::builder::{BuilderVariant, OutputFormat};

/// All errors that can arise from `prepare` and `process`.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("input {path} not found")]
    InputNotFound { path: PathBuf },

    /// The format has no builder for the requested variant.
    #[error("no '{variant}' builder for {format} output")]
    UnsupportedBuilder {
        format: OutputFormat,
        variant: BuilderVariant,
    },

    /// The generator finished but an expected file is missing.
    #[error("expected build artifact {path} not found")]
    ArtifactNotFound { path: PathBuf },

    #[error(transparent)]
    Alloc(#[from] AllocError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`BuildError::Io`].
pub(crate) fn io_err(path: impl AsRef<Path>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.as_ref().to_path_buf(),
        source,
    }
}
