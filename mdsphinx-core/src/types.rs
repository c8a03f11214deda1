//! Domain types for the environment registry.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Current on-disk registry format version.
pub const REGISTRY_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for an isolated environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnvName(pub String);

impl EnvName {
    /// Directory name of the environment under the environments root.
    pub fn dir_name(&self) -> String {
        format!("venv.{}", self.0)
    }
}

impl fmt::Display for EnvName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for EnvName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EnvName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One registry entry: an environment name and where it lives on disk.
///
/// The path is not guaranteed to exist; callers check before use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvRecord {
    pub name: EnvName,
    pub path: PathBuf,
}

/// Root of the YAML registry document. Entries keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    pub version: u32,
    #[serde(default)]
    pub environments: Vec<EnvRecord>,
}

impl Default for RegistryFile {
    fn default() -> Self {
        Self {
            version: REGISTRY_VERSION,
            environments: Vec::new(),
        }
    }
}

impl RegistryFile {
    pub fn get(&self, name: &EnvName) -> Option<&EnvRecord> {
        self.environments.iter().find(|r| &r.name == name)
    }

    /// Insert or overwrite in place. Returns the replaced path, if any.
    pub fn upsert(&mut self, record: EnvRecord) -> Option<PathBuf> {
        match self.environments.iter_mut().find(|r| r.name == record.name) {
            Some(existing) => Some(std::mem::replace(&mut existing.path, record.path)),
            None => {
                self.environments.push(record);
                None
            }
        }
    }

    /// Remove by name. Returns the removed record, if any.
    pub fn remove(&mut self, name: &EnvName) -> Option<EnvRecord> {
        let idx = self.environments.iter().position(|r| &r.name == name)?;
        Some(self.environments.remove(idx))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, path: &str) -> EnvRecord {
        EnvRecord {
            name: EnvName::from(name),
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn newtype_display_and_dir_name() {
        let name = EnvName::from("docs");
        assert_eq!(name.to_string(), "docs");
        assert_eq!(name.dir_name(), "venv.docs");
    }

    #[test]
    fn upsert_overwrites_in_place() {
        let mut file = RegistryFile::default();
        assert!(file.upsert(record("a", "/a")).is_none());
        assert!(file.upsert(record("b", "/b")).is_none());
        let replaced = file.upsert(record("a", "/a2"));

        assert_eq!(replaced, Some(PathBuf::from("/a")));
        assert_eq!(file.environments.len(), 2);
        assert_eq!(file.environments[0], record("a", "/a2"));
        assert_eq!(file.environments[1].name, EnvName::from("b"));
    }

    #[test]
    fn remove_missing_is_none() {
        let mut file = RegistryFile::default();
        assert!(file.remove(&EnvName::from("ghost")).is_none());
    }

    #[test]
    fn registry_serde_roundtrip() {
        let mut file = RegistryFile::default();
        file.upsert(record("default", "/home/u/.config/mdsphinx/environments/venv.default"));
        let yaml = serde_yaml::to_string(&file).expect("serialize");
        let back: RegistryFile = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(back, file);
    }
}
