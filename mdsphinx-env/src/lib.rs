//! Isolated interpreter environments: creation, package installation,
//! lookup, and removal, backed by the [`mdsphinx_core::Registry`].

mod error;
pub mod environment;
pub mod manager;
pub mod prompt;

pub use environment::VirtualEnvironment;
pub use error::EnvError;
pub use manager::{CreateOptions, EnvManager};
pub use prompt::{AutoConfirm, Confirm, StdinConfirm};
