//! Gateway-level error funnel.
//!
//! Everything that can fail between "request matched" and "response built"
//! collapses into one type here, so the middleware converts any failure into
//! a single 500 response plus one structured log line.

use crawlable_core::Error as CoreError;
use crawlable_render::RenderError;

/// Any failure on the render-and-cache path.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Cache store or URL rewriting failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Driver or automation failure.
    #[error(transparent)]
    Render(#[from] RenderError),
}
