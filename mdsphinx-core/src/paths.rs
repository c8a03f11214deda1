//! Configuration root, derived layout, and optional user settings.
//!
//! # Storage layout
//!
//! ```text
//! $MDSPHINX_CONFIG_ROOT (default: ~/.config/mdsphinx)/
//!   config.yaml         (optional settings)
//!   registry.yaml       (environment registry, mode 0600)
//!   environments/
//!     venv.<name>/      (one isolated environment per name)
//!   templates/
//!     conf.py.jinja     (optional generator configuration template)
//! ```
//!
//! Library code always receives an explicit [`Layout`]; only the CLI calls
//! [`Layout::discover`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{config_io, ConfigError};
use crate::types::EnvName;

/// Environment variable that overrides the configuration root.
pub const CONFIG_ROOT_ENV: &str = "MDSPHINX_CONFIG_ROOT";

pub const DEFAULT_ENVIRONMENT: &str = "default";

pub const DEFAULT_ENVIRONMENT_PACKAGES: &[&str] =
    &["myst-parser", "nbsphinx", "furo", "sphinx-copybutton"];

/// All filesystem locations derived from one configuration root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Layout rooted at an explicit directory. Performs no I/O.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the root from `$MDSPHINX_CONFIG_ROOT` or `<home>/.config/mdsphinx`,
    /// validate it, and create it (plus `environments/`) if absent.
    pub fn discover() -> Result<Self, ConfigError> {
        let home = dirs::home_dir();
        let root = match std::env::var_os(CONFIG_ROOT_ENV) {
            Some(root) if !root.is_empty() => PathBuf::from(root),
            _ => home
                .as_deref()
                .ok_or(ConfigError::HomeNotFound)?
                .join(".config")
                .join("mdsphinx"),
        };
        let layout = Self::at(root);
        layout.validate(home.as_deref())?;
        layout.ensure()?;
        Ok(layout)
    }

    /// Reject a root that is a file or that is the home directory itself.
    pub fn validate(&self, home: Option<&Path>) -> Result<(), ConfigError> {
        if self.root.exists() && !self.root.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.root.clone(),
            });
        }
        if home.is_some_and(|h| h == self.root) {
            return Err(ConfigError::RootIsHome {
                path: self.root.clone(),
            });
        }
        Ok(())
    }

    /// Create the root and the environments directory.
    pub fn ensure(&self) -> Result<(), ConfigError> {
        let envs = self.environments_dir();
        std::fs::create_dir_all(&envs).map_err(|e| config_io(&envs, e))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/environments/`
    pub fn environments_dir(&self) -> PathBuf {
        self.root.join("environments")
    }

    /// `<root>/environments/venv.<name>`. Pure, no I/O.
    pub fn environment_path(&self, name: &EnvName) -> PathBuf {
        self.environments_dir().join(name.dir_name())
    }

    /// `<root>/registry.yaml`
    pub fn registry_path(&self) -> PathBuf {
        self.root.join("registry.yaml")
    }

    /// `<root>/templates/`
    pub fn templates_dir(&self) -> PathBuf {
        self.root.join("templates")
    }

    /// `<root>/config.yaml`
    pub fn settings_path(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    /// Load `config.yaml`, falling back to defaults when absent.
    pub fn settings(&self) -> Result<Settings, ConfigError> {
        Settings::load(&self.settings_path())
    }
}

/// User-tunable defaults read from `config.yaml`. Every field is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Environment used when `--env-name` / `--name` is omitted.
    pub default_environment: String,
    /// Extra packages installed by `env create` when no `--package` is given.
    pub default_packages: Vec<String>,
    /// Root for output job directories when `--tmp-root` is omitted.
    pub tmp_root: Option<PathBuf>,
    /// Interpreter executable name inside an environment's `bin/`.
    pub interpreter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_environment: DEFAULT_ENVIRONMENT.to_string(),
            default_packages: DEFAULT_ENVIRONMENT_PACKAGES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            tmp_root: None,
            interpreter: "python".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| config_io(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Configured tmp root, or `<system temp>/mdsphinx`.
    pub fn tmp_root(&self) -> PathBuf {
        self.tmp_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("mdsphinx"))
    }

    pub fn default_env_name(&self) -> EnvName {
        EnvName::from(self.default_environment.as_str())
    }
}
