//! # mdsphinx-renderer
//!
//! Materializes an input tree of markdown sources into a job directory:
//! template sources are expanded with Tera against a [`RenderContext`],
//! resources are mirrored, everything else is ignored.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mdsphinx_core::SystemRunner;
//! use mdsphinx_renderer::{RenderContext, Renderer};
//!
//! fn render_docs() -> Result<(), mdsphinx_renderer::RenderError> {
//!     let context = RenderContext::load(None)?;
//!     let renderer = Renderer::new("docs", None, "/tmp/mdsphinx/docs.job", context, Arc::new(SystemRunner));
//!     for outcome in renderer.render()? {
//!         println!("{}", outcome.path().display());
//!     }
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod diagram;
pub mod engine;
pub mod error;
pub mod pipeline;

pub use context::RenderContext;
pub use diagram::{render_diagram, DiagramInput, DiagramOptions};
pub use engine::TemplateEngine;
pub use error::{DiagramError, RenderError};
pub use pipeline::{RenderOutcome, Renderer};
