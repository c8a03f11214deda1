//! Render context: variables available to every template in one render.
//!
//! Built once per render from an optional JSON/YAML file, then frozen. The
//! built-in `date` and `time` keys are injected last and always win.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{io_err, RenderError};

/// File names probed, in order, when no context file is given.
pub const CONTEXT_FILE_NAMES: &[&str] = &["context.yml", "context.yaml"];

#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    values: Map<String, Value>,
}

impl RenderContext {
    /// Context from explicit values plus built-ins taken from `now`.
    pub fn from_values(mut values: Map<String, Value>, now: DateTime<Utc>) -> Self {
        values.insert("date".into(), Value::String(now.format("%Y-%m-%d").to_string()));
        values.insert("time".into(), Value::String(now.format("%H:%M:%S").to_string()));
        Self { values }
    }

    /// Built-ins only.
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self::from_values(Map::new(), now)
    }

    /// Load `path` (or nothing) and inject built-ins for the current instant.
    pub fn load(path: Option<&Path>) -> Result<Self, RenderError> {
        let values = match path {
            Some(path) => read_values(path)?,
            None => Map::new(),
        };
        Ok(Self::from_values(values, Utc::now()))
    }

    /// Resolve the context file for `input`: `explicit` if given, else the
    /// first of [`CONTEXT_FILE_NAMES`] found in the input's parent directory
    /// and then in `cwd`.
    pub fn discover(explicit: Option<&Path>, input: &Path, cwd: &Path) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        let roots = input.parent().into_iter().chain(std::iter::once(cwd));
        for root in roots {
            for base in CONTEXT_FILE_NAMES {
                let candidate = root.join(base);
                if candidate.is_file() {
                    tracing::info!(action = "context", path = %candidate.display(), "discovered context file");
                    return Some(candidate);
                }
            }
        }
        None
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, tera::Error> {
        tera::Context::from_serialize(&self.values)
    }
}

/// Parse a context file. Non-mapping documents yield an empty map.
fn read_values(path: &Path) -> Result<Map<String, Value>, RenderError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let parse_err = |message: String| RenderError::Context {
        path: path.to_path_buf(),
        message,
    };

    let value = match extension.as_deref() {
        Some("json") => {
            let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
            serde_json::from_str::<Value>(&text).map_err(|e| parse_err(e.to_string()))?
        }
        Some("yaml") | Some("yml") => {
            let text = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
            let yaml: serde_yaml::Value =
                serde_yaml::from_str(&text).map_err(|e| parse_err(e.to_string()))?;
            if !yaml.is_mapping() {
                return Ok(Map::new());
            }
            // Fails on non-string mapping keys.
            serde_json::to_value(&yaml).map_err(|e| parse_err(e.to_string()))?
        }
        _ => {
            return Err(RenderError::UnsupportedContext {
                path: path.to_path_buf(),
            })
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}
