//! # mdsphinx-build
//!
//! Turns an input tree into generator output: allocates the job directory,
//! configures the generator project, renders sources, runs the builder and
//! the LaTeX compiler.
//!
//! Call [`Pipeline::prepare`] to stage sources only, or
//! [`Pipeline::process`] for the full build.

pub mod builder;
pub mod error;
pub mod pipeline;
pub mod quickstart;

pub use builder::{BuilderVariant, OutputFormat, Target};
pub use error::BuildError;
pub use pipeline::{Pipeline, PrepareOptions, Prepared, ProcessOptions, Processed};
