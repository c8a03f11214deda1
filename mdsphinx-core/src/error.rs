//! Error types for mdsphinx-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Underlying I/O failure, with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse registry at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No entry for the requested environment name.
    #[error("environment '{name}' not found in registry")]
    EnvironmentNotFound { name: String },
}

/// Errors resolving the configuration root or reading `config.yaml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `dirs::home_dir()` returned `None` and `MDSPHINX_CONFIG_ROOT` is unset.
    #[error("cannot determine home directory; set $HOME or $MDSPHINX_CONFIG_ROOT")]
    HomeNotFound,

    /// The configuration root exists but is a file.
    #[error("configuration root {path} is not a directory")]
    NotADirectory { path: PathBuf },

    /// The configuration root resolved to the home directory itself.
    #[error("configuration root {path} must not be the home directory")]
    RootIsHome { path: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors from output job directory allocation.
#[derive(Debug, Error)]
pub enum AllocError {
    /// No job directory for `key` exists under `root`.
    #[error("no output directory for '{key}' under {root}")]
    NotFound { key: String, root: PathBuf },

    /// Every sequence number for today's `key` is already taken.
    #[error("no free sequence number for '{key}' under {root}")]
    Exhausted { key: String, root: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from spawning external commands.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The program could not be started at all (missing binary, permissions).
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("{program} exited with {}", describe_exit(.code))]
    Failed { program: String, code: Option<i32> },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "a signal".to_string(),
    }
}

pub(crate) fn registry_io(path: impl Into<PathBuf>, source: std::io::Error) -> RegistryError {
    RegistryError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn alloc_io(path: impl Into<PathBuf>, source: std::io::Error) -> AllocError {
    AllocError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
