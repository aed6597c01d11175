//! File rendering ahead of spooling.
//!
//! [`RenderOrchestrator`] validates a candidate path against the access
//! policy, picks a render type from configuration and the extension tables,
//! and delegates to a [`Renderer`] that writes a PDF into a private temporary
//! directory. The returned [`RenderOutcome`] owns that directory; dropping or
//! cleaning up the outcome removes it.

mod languages;
mod orchestrator;
mod service;
mod types;

pub(crate) use languages::normalize_extension;
pub use orchestrator::RenderOrchestrator;
pub use service::{ChromePdf, ChromeRenderService, balance, bundled_theme_set};
pub use types::{
    CodeRenderOptions, PrepareError, RenderConfig, RenderError, RenderOutcome, RenderOverrides,
    RenderSpec, RenderType, Renderer,
};
