//! Headless browser rendering for crawlable.
//!
//! This crate owns the browser automation side of the gateway: a supervised
//! chromiumoxide session (launched locally or connected to a dedicated
//! endpoint) and the render pipeline that navigates, waits for readiness,
//! and strips script blocks from the captured page source.

pub mod driver;
pub mod pipeline;

pub use driver::{DriverMode, DriverSupervisor, SessionLease};
pub use pipeline::{HeadlessPipeline, RenderError, RenderOutcome, Renderer, strip_scripts};
