//! Render-and-extract pipeline.
//!
//! Given a canonical hash-bang URL, the pipeline drives the supervised
//! browser to load it, waits for a readiness selector with a bounded total
//! wait, captures the page source, and strips `<script>` blocks. A page
//! whose readiness selector never appears is not a failure: the pipeline
//! reports it as a degraded outcome carrying whatever content exists, and
//! the caller decides to serve it without caching.

use std::sync::LazyLock;
use std::time::Duration;

use crawlable_core::AppConfig;
use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::driver::DriverSupervisor;

/// Client-side script has no purpose once the DOM is materialized.
/// Case-insensitive, non-greedy, matches across newlines.
static SCRIPT_BLOCKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<script.*?</script>").expect("static pattern"));

/// Errors that can occur during page rendering.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Driver could not be created or repaired.
    #[error(transparent)]
    Driver(#[from] crawlable_core::Error),

    /// Failed to navigate to the URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Failed to get page content.
    #[error("content retrieval failed: {0}")]
    ContentRetrieval(String),

    /// A single automation call exceeded the session's script timeout.
    #[error("automation call exceeded {0}ms")]
    ScriptTimeout(u64),
}

/// Result of rendering a page.
///
/// Readiness-selector timeouts are modeled as a variant rather than an
/// error so callers decide caching and logging per outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The readiness selector appeared; the HTML is sanitized and cacheable.
    Rendered(String),

    /// The readiness selector never appeared; best-effort content, served
    /// but never cached.
    Degraded(String),
}

/// Renderer seam between the orchestration layer and the browser.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    /// Render a URL to HTML via headless browser.
    async fn render(&self, url: &Url, ready_selector: &str) -> Result<RenderOutcome, RenderError>;
}

/// Headless Chrome/Chromium pipeline backed by a [`DriverSupervisor`].
pub struct HeadlessPipeline {
    supervisor: DriverSupervisor,
    ready_timeout: Duration,
    poll_interval: Duration,
}

impl HeadlessPipeline {
    /// Build a pipeline from configuration. The underlying browser is not
    /// started until the first render.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supervisor: DriverSupervisor::new(config),
            ready_timeout: config.ready_timeout(),
            poll_interval: config.poll_interval(),
        }
    }

    /// The supervisor managing the browser session.
    pub fn supervisor(&self) -> &DriverSupervisor {
        &self.supervisor
    }
}

#[async_trait::async_trait]
impl Renderer for HeadlessPipeline {
    async fn render(&self, url: &Url, ready_selector: &str) -> Result<RenderOutcome, RenderError> {
        // Held for the whole render: browser sessions are not safe to drive
        // from two callers at once.
        let session = self.supervisor.lease().await?;
        let script_timeout = session.script_timeout();
        let timeout_ms = script_timeout.as_millis() as u64;

        let page = tokio::time::timeout(script_timeout, session.browser().new_page(url.as_str()))
            .await
            .map_err(|_| RenderError::ScriptTimeout(timeout_ms))?
            .map_err(|e| RenderError::Navigation(e.to_string()))?;

        let ready = tokio::time::timeout(self.ready_timeout, async {
            while page.find_element(ready_selector).await.is_err() {
                tokio::time::sleep(self.poll_interval).await;
            }
        })
        .await
        .is_ok();

        let html = tokio::time::timeout(script_timeout, page.content())
            .await
            .map_err(|_| RenderError::ScriptTimeout(timeout_ms))?
            .map_err(|e| RenderError::ContentRetrieval(e.to_string()))?;

        page.close().await.ok();

        if ready {
            Ok(RenderOutcome::Rendered(strip_scripts(&html)))
        } else {
            tracing::warn!(selector = ready_selector, url = %url, "readiness selector never appeared");
            Ok(RenderOutcome::Degraded(html))
        }
    }
}

/// Strip all `<script>...</script>` blocks from rendered page source.
///
/// Non-script markup is preserved verbatim.
pub fn strip_scripts(html: &str) -> String {
    SCRIPT_BLOCKS.replace_all(html, "").into_owned()
}
