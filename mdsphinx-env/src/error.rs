use std::path::PathBuf;

use thiserror::Error;

/// Error surface for environment lifecycle operations.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry error: {0}")]
    Registry(#[from] mdsphinx_core::RegistryError),

    #[error(transparent)]
    Process(#[from] mdsphinx_core::ProcessError),

    #[error("environment '{name}' already exists at {path}; pass --recreate to replace it")]
    AlreadyExists { name: String, path: PathBuf },

    #[error("environment '{name}' not found at {path}")]
    NotFound { name: String, path: PathBuf },

    #[error("removal of environment '{name}' at {path} was cancelled")]
    Cancelled { name: String, path: PathBuf },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EnvError {
    EnvError::Io {
        path: path.into(),
        source,
    }
}
