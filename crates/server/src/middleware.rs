//! Escaped-fragment interception middleware.
//!
//! GET requests carrying the `_escaped_fragment_` query parameter are
//! answered from the render cache, rendering on a miss. Everything else
//! falls through to the inner service untouched.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode, header},
    middleware::Next,
    response::Response,
};
use crawlable_core::{AppConfig, CacheStore, RenderRequest, fragment};
use crawlable_render::{RenderOutcome, Renderer};
use url::Url;

use crate::error::GatewayError;

/// Shared state for the gateway.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: Arc<dyn CacheStore>,
    pub renderer: Arc<dyn Renderer>,
}

/// Intercept escaped-fragment requests; pass everything else through.
///
/// Failures on the render path never escape: they are logged with both the
/// canonical and the original URL and converted to an empty 500 response.
/// A readiness timeout is not a failure; its best-effort content is served
/// with a 200 and left out of the cache.
pub async fn escaped_fragment(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let Some(original_url) = absolute_request_url(&request) else {
        return next.run(request).await;
    };

    let render_request = match fragment::rewrite(&original_url, state.config.force_https) {
        Ok(Some(render_request)) => render_request,
        Ok(None) => return next.run(request).await,
        Err(e) => {
            tracing::error!(original_url = %original_url, error = %e, "failed to rewrite escaped-fragment URL");
            return server_error();
        }
    };

    match serve_rendered(&state, &render_request).await {
        Ok(html) => html_response(html),
        Err(e) => {
            tracing::error!(
                canonical_url = %render_request.canonical_url,
                original_url = %render_request.original_url,
                error = %e,
                "error rendering escaped-fragment request"
            );
            server_error()
        }
    }
}

/// Cache-or-render for one matched request.
async fn serve_rendered(state: &AppState, request: &RenderRequest) -> Result<String, GatewayError> {
    // exists and get are two independent store calls; concurrent misses may
    // both render the same page and race on the write. Accepted: both
    // writers store fully sanitized content and last write wins.
    if state.cache.exists(&request.cache_key).await?
        && let Some(html) = state.cache.get(&request.cache_key).await?
    {
        tracing::debug!(cache_key = %request.cache_key, "serving rendered page from cache");
        return Ok(html);
    }

    tracing::debug!(
        canonical_url = %request.canonical_url,
        original_url = %request.original_url,
        forced_https = request.forced_https,
        "generating flat content"
    );

    let outcome = state
        .renderer
        .render(&request.canonical_url, &state.config.css_selector)
        .await?;

    match outcome {
        RenderOutcome::Rendered(html) => {
            state.cache.put(&request.cache_key, &html).await?;
            Ok(html)
        }
        RenderOutcome::Degraded(html) => {
            tracing::error!(
                canonical_url = %request.canonical_url,
                original_url = %request.original_url,
                "timeout rendering, serving partial content uncached"
            );
            Ok(html)
        }
    }
}

/// Reconstruct the absolute URL of an inbound request.
///
/// The scheme is taken as `http` when the request line is in origin form;
/// deployments behind TLS-terminating proxies set `force_https` instead of
/// relying on it.
fn absolute_request_url(request: &Request) -> Option<Url> {
    let uri = request.uri();

    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string()).ok();
    }

    let host = request.headers().get(header::HOST)?.to_str().ok()?;
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Url::parse(&format!("http://{host}{path_and_query}")).ok()
}

fn html_response(html: String) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(Body::from(html))
        .unwrap_or_else(|_| server_error())
}

fn server_error() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use crawlable_core::{Error, MemoryStore};
    use crawlable_render::RenderError;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    /// Scripted renderer standing in for the headless pipeline.
    struct StubRenderer {
        outcome: Box<dyn Fn() -> Result<RenderOutcome, RenderError> + Send + Sync>,
        calls: AtomicUsize,
        last_url: Mutex<Option<Url>>,
    }

    impl StubRenderer {
        fn rendering(html: &str) -> Self {
            let html = html.to_string();
            Self::with(move || Ok(RenderOutcome::Rendered(html.clone())))
        }

        fn degrading(html: &str) -> Self {
            let html = html.to_string();
            Self::with(move || Ok(RenderOutcome::Degraded(html.clone())))
        }

        fn failing() -> Self {
            Self::with(|| {
                Err(RenderError::Driver(Error::DriverUnavailable(
                    "dedicated browser instance on port 8910 stopped responding".into(),
                )))
            })
        }

        fn with(outcome: impl Fn() -> Result<RenderOutcome, RenderError> + Send + Sync + 'static) -> Self {
            Self { outcome: Box::new(outcome), calls: AtomicUsize::new(0), last_url: Mutex::new(None) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Renderer for StubRenderer {
        async fn render(&self, url: &Url, _ready_selector: &str) -> Result<RenderOutcome, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_url.lock().unwrap() = Some(url.clone());
            (self.outcome)()
        }
    }

    struct Harness {
        app: Router,
        cache: Arc<MemoryStore>,
        renderer: Arc<StubRenderer>,
    }

    fn harness_with_config(renderer: StubRenderer, config: AppConfig) -> Harness {
        let cache = Arc::new(MemoryStore::new());
        let renderer = Arc::new(renderer);
        let state = AppState {
            config: Arc::new(config),
            cache: cache.clone() as Arc<dyn CacheStore>,
            renderer: renderer.clone() as Arc<dyn Renderer>,
        };
        let app = Router::new()
            .fallback(|| async { (StatusCode::NOT_FOUND, "fallthrough") })
            .layer(axum::middleware::from_fn_with_state(state, escaped_fragment));
        Harness { app, cache, renderer }
    }

    fn harness(renderer: StubRenderer) -> Harness {
        harness_with_config(renderer, AppConfig::default())
    }

    fn get(uri: &str) -> Request {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::HOST, "example.com")
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_get_without_marker_passes_through() {
        let h = harness(StubRenderer::rendering("<html></html>"));
        let response = h.app.oneshot(get("/en/?page=2&sort=asc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, "fallthrough");
        assert_eq!(h.renderer.calls(), 0);
    }

    #[tokio::test]
    async fn test_non_get_with_marker_passes_through() {
        let h = harness(StubRenderer::rendering("<html></html>"));
        let request = Request::builder()
            .method(Method::POST)
            .uri("/en/?_escaped_fragment_=/projects")
            .header(header::HOST, "example.com")
            .body(Body::empty())
            .unwrap();
        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(h.renderer.calls(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_render() {
        let h = harness(StubRenderer::rendering(
            "<html><a href=\"/en/#!/campaigns\">link</a></html>",
        ));
        let response = h.app.oneshot(get("/en/?_escaped_fragment_=/campaigns")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("/en/#!/campaigns"));
        assert!(body.contains("link"));

        let seen = h.renderer.last_url.lock().unwrap().clone().unwrap();
        assert_eq!(seen.as_str(), "http://example.com/en/#!/campaigns");
    }

    #[tokio::test]
    async fn test_cache_idempotence() {
        let h = harness(StubRenderer::rendering("<html><p>hi</p></html>"));

        let first = h.app.clone().oneshot(get("/en/?_escaped_fragment_=/projects")).await.unwrap();
        let first_body = body_string(first).await;

        let second = h.app.oneshot(get("/en/?_escaped_fragment_=/projects")).await.unwrap();
        let second_body = body_string(second).await;

        assert_eq!(first_body, second_body);
        assert_eq!(h.renderer.calls(), 1);
        assert!(h.cache.exists("_share__en____projects").await.unwrap());
    }

    #[tokio::test]
    async fn test_degraded_served_but_not_cached() {
        let h = harness(StubRenderer::degrading("<html><p>partial</p></html>"));

        let response = h.app.clone().oneshot(get("/en/?_escaped_fragment_=/projects")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<html><p>partial</p></html>");
        assert_eq!(h.cache.len().await, 0);

        // Uncached, so an identical request renders again.
        let _ = h.app.oneshot(get("/en/?_escaped_fragment_=/projects")).await.unwrap();
        assert_eq!(h.renderer.calls(), 2);
    }

    #[tokio::test]
    async fn test_driver_unavailable_yields_500_without_cache_mutation() {
        let h = harness(StubRenderer::failing());

        let response = h.app.oneshot(get("/en/?_escaped_fragment_=/projects")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "");
        assert_eq!(h.cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_forced_https_reaches_renderer() {
        let config = AppConfig { force_https: true, ..Default::default() };
        let h = harness_with_config(StubRenderer::rendering("<html></html>"), config);

        let response = h.app.oneshot(get("/en/?_escaped_fragment_=/projects")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let seen = h.renderer.last_url.lock().unwrap().clone().unwrap();
        assert_eq!(seen.scheme(), "https");
    }

    #[tokio::test]
    async fn test_cache_hit_skips_renderer() {
        let h = harness(StubRenderer::rendering("<html>fresh</html>"));
        h.cache.put("_share__en____projects", "<html>cached</html>").await.unwrap();

        let response = h.app.oneshot(get("/en/?_escaped_fragment_=/projects")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<html>cached</html>");
        assert_eq!(h.renderer.calls(), 0);
    }
}
