//! Persistent environment registry: name → environment directory.
//!
//! # Storage
//!
//! A single YAML document at `<config_root>/registry.yaml`:
//!
//! ```yaml
//! version: 1
//! environments:
//!   - name: default
//!     path: /home/me/.config/mdsphinx/environments/venv.default
//! ```
//!
//! # Access pattern
//!
//! Every operation opens the store, performs exactly one read or one
//! mutation, and closes it again. Nothing is cached between calls, so a
//! [`Registry`] value is only a handle to the file location. Writes go to a
//! per-process `.tmp` sibling and are renamed into place; two processes
//! writing the same key race and the last rename wins.

use std::path::{Path, PathBuf};

use crate::error::{registry_io, RegistryError};
use crate::paths::Layout;
use crate::types::{EnvName, EnvRecord, RegistryFile};

/// Handle to the on-disk registry store.
#[derive(Debug, Clone)]
pub struct Registry {
    path: PathBuf,
}

impl Registry {
    /// Registry stored at an explicit file path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Registry for a configuration layout (`<root>/registry.yaml`).
    pub fn for_layout(layout: &Layout) -> Self {
        Self::at(layout.registry_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or overwrite `name`. Overwriting is logged as a warning.
    pub fn put(&self, name: &EnvName, path: &Path) -> Result<(), RegistryError> {
        let mut file = self.open()?;
        if file.get(name).is_some() {
            tracing::warn!(action = "add", name = %name, "overwriting environment");
        }
        tracing::info!(action = "add", name = %name, path = %path.display());
        file.upsert(EnvRecord {
            name: name.clone(),
            path: path.to_path_buf(),
        });
        self.close(&file)
    }

    /// Look up the path registered for `name`.
    ///
    /// Returns [`RegistryError::EnvironmentNotFound`] when absent, regardless of
    /// whether a matching directory exists on disk.
    pub fn get(&self, name: &EnvName) -> Result<PathBuf, RegistryError> {
        self.open()?
            .get(name)
            .map(|r| r.path.clone())
            .ok_or_else(|| RegistryError::EnvironmentNotFound {
                name: name.0.clone(),
            })
    }

    pub fn contains(&self, name: &EnvName) -> Result<bool, RegistryError> {
        Ok(self.open()?.get(name).is_some())
    }

    /// Remove `name`. A missing entry is a warning-level no-op.
    pub fn delete(&self, name: &EnvName) -> Result<(), RegistryError> {
        let mut file = self.open()?;
        match file.remove(name) {
            Some(_) => {
                tracing::info!(action = "del", name = %name);
                self.close(&file)
            }
            None => {
                tracing::warn!(action = "del", name = %name, "environment not found");
                Ok(())
            }
        }
    }

    /// All entries in insertion order. Empty when the store does not exist.
    pub fn list(&self) -> Result<Vec<EnvRecord>, RegistryError> {
        Ok(self.open()?.environments)
    }

    // -----------------------------------------------------------------------
    // open / close
    // -----------------------------------------------------------------------

    fn open(&self) -> Result<RegistryFile, RegistryError> {
        if !self.path.exists() {
            return Ok(RegistryFile::default());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| registry_io(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(RegistryFile::default());
        }
        serde_yaml::from_str(&contents).map_err(|source| RegistryError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Write flow: serialize → `.<pid>.tmp` sibling → `chmod 0600` → `rename`.
    fn close(&self, file: &RegistryFile) -> Result<(), RegistryError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| registry_io(dir, e))?;
        }
        let yaml = serde_yaml::to_string(file)?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, yaml).map_err(|e| registry_io(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(registry_io(&self.path, e));
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "registry.yaml".to_string());
        self.path
            .with_file_name(format!("{name}.{}.tmp", std::process::id()))
    }
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), RegistryError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| registry_io(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), RegistryError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_registry() -> (TempDir, Registry) {
        let tmp = TempDir::new().expect("tempdir");
        let registry = Registry::at(tmp.path().join("registry.yaml"));
        (tmp, registry)
    }

    #[test]
    fn missing_store_lists_empty() {
        let (_tmp, registry) = make_registry();
        assert!(registry.list().expect("list").is_empty());
        assert!(!registry.path().exists(), "reads must not create the store");
    }

    #[test]
    fn put_then_get_returns_path() {
        let (_tmp, registry) = make_registry();
        let name = EnvName::from("default");
        registry.put(&name, Path::new("/envs/venv.default")).expect("put");
        assert_eq!(registry.get(&name).expect("get"), PathBuf::from("/envs/venv.default"));
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_tmp, registry) = make_registry();
        let err = registry.get(&EnvName::from("nope")).unwrap_err();
        assert!(matches!(err, RegistryError::EnvironmentNotFound { .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn delete_missing_is_noop() {
        let (_tmp, registry) = make_registry();
        registry.delete(&EnvName::from("ghost")).expect("delete must not fail");
    }

    #[test]
    fn tmp_file_cleaned_up_after_put() {
        let (_tmp, registry) = make_registry();
        registry.put(&EnvName::from("a"), Path::new("/a")).expect("put");
        assert!(!registry.tmp_path().exists(), ".tmp must be gone after successful put");
    }

    #[test]
    #[cfg(unix)]
    fn store_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let (_tmp, registry) = make_registry();
        registry.put(&EnvName::from("a"), Path::new("/a")).expect("put");
        let mode = std::fs::metadata(registry.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
