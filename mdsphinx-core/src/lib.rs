//! mdsphinx core library: domain types, configuration layout, environment
//! registry, output job directories, and the external process port.
//!
//! - [`types`]: newtypes and registry records
//! - [`paths`]: [`Layout`] and [`Settings`]
//! - [`registry`]: persistent name → path store
//! - [`outdir`]: output job directory allocation
//! - [`process`]: logged, fail-fast external invocations

pub mod error;
pub mod outdir;
pub mod paths;
pub mod process;
pub mod registry;
pub mod types;

pub use error::{AllocError, ConfigError, ProcessError, RegistryError};
pub use paths::{Layout, Settings};
pub use process::{Invocation, ProcessRunner, SystemRunner};
pub use registry::Registry;
pub use types::{EnvName, EnvRecord, RegistryFile};
