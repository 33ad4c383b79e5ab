//! Driver session lifecycle and supervision.
//!
//! Exactly one browser session exists per process. The supervisor lazily
//! creates it on first need, probes its devtools port before every reuse,
//! and recovers according to the operating mode:
//!
//! - **On-demand**: the browser is a local child process; a dead session is
//!   torn down and replaced with a fresh launch.
//! - **Dedicated**: the browser is a pre-existing, externally managed
//!   endpoint; a dead session is fatal because its process is not ours to
//!   restart.
//!
//! The raw session never leaves this module: callers obtain a [`SessionLease`]
//! that holds the supervisor's lock, so health check, replacement, hand-off,
//! and the render itself are serialized. Browser sessions are not safe to
//! drive from two callers at once, so at most one render is in flight per
//! process.

use std::ops::Deref;
use std::time::Duration;

use chromiumoxide::Browser;
use chromiumoxide::browser::BrowserConfig;
use crawlable_core::{AppConfig, Error};
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use url::Url;

/// How long the TCP connectivity probe may take before the session is
/// considered dead.
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// One live connection to a browser automation endpoint.
pub struct DriverSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    /// Devtools endpoint, probed before every reuse.
    host: String,
    port: u16,
    dedicated: bool,
    script_timeout: Duration,
}

impl DriverSession {
    /// Launch a local headless browser with the given startup arguments.
    async fn launch(args: &[String], script_timeout: Duration) -> Result<Self, Error> {
        let mut builder = BrowserConfig::builder();
        for arg in args {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(Error::DriverUnavailable)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| Error::DriverUnavailable(format!("browser launch failed: {e}")))?;

        let (host, port) = parse_devtools_endpoint(browser.websocket_address())?;
        tracing::info!(port, "launched local headless browser");

        Ok(Self {
            handler_task: spawn_handler(handler),
            browser,
            host,
            port,
            dedicated: false,
            script_timeout,
        })
    }

    /// Connect to an already-running browser endpoint.
    ///
    /// The endpoint must expose its devtools interface on `port`, e.g. a
    /// browser started with `--remote-debugging-port=<port>`.
    async fn connect(port: u16, script_timeout: Duration) -> Result<Self, Error> {
        let (browser, handler) = Browser::connect(format!("http://127.0.0.1:{port}"))
            .await
            .map_err(|e| {
                Error::DriverUnavailable(format!(
                    "cannot connect to dedicated browser instance on port {port}: {e}"
                ))
            })?;

        tracing::info!(port, "connected to dedicated browser endpoint");

        Ok(Self {
            handler_task: spawn_handler(handler),
            browser,
            host: "127.0.0.1".into(),
            port,
            dedicated: true,
            script_timeout,
        })
    }

    /// Lightweight connectivity probe against the devtools port.
    async fn is_connectable(&self) -> bool {
        matches!(
            tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect((self.host.as_str(), self.port))).await,
            Ok(Ok(_))
        )
    }

    /// Stop the session. Only meaningful for locally launched browsers;
    /// dedicated endpoints are left untouched.
    async fn shutdown(mut self) {
        if !self.dedicated {
            if let Err(e) = self.browser.close().await {
                tracing::debug!("browser close failed: {e}");
            }
            let _ = self.browser.wait().await;
        }
        self.handler_task.abort();
    }

    pub(crate) fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Upper bound applied around every automation call on this session.
    pub fn script_timeout(&self) -> Duration {
        self.script_timeout
    }

    /// Whether this session belongs to an externally managed endpoint.
    pub fn is_dedicated(&self) -> bool {
        self.dedicated
    }
}

fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                tracing::debug!("browser handler event error: {e}");
                break;
            }
        }
    })
}

fn parse_devtools_endpoint(ws_address: &str) -> Result<(String, u16), Error> {
    let parsed = Url::parse(ws_address)
        .map_err(|e| Error::DriverUnavailable(format!("unparseable devtools address {ws_address}: {e}")))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::DriverUnavailable(format!("devtools address {ws_address} has no host")))?
        .to_string();
    let port = parsed
        .port()
        .ok_or_else(|| Error::DriverUnavailable(format!("devtools address {ws_address} has no port")))?;
    Ok((host, port))
}

/// Operating mode for the supervised driver, selected by configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverMode {
    /// Connect to a pre-existing browser endpoint; its process lifecycle is
    /// not ours.
    Dedicated { port: u16 },

    /// Launch and own a local browser process, restarting it when it dies.
    OnDemand { args: Vec<String> },
}

impl DriverMode {
    /// Select the mode from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        if config.dedicated_mode {
            Self::Dedicated { port: config.dedicated_port }
        } else {
            Self::OnDemand { args: config.driver_args.clone() }
        }
    }
}

/// Lazily creates, health-checks, and replaces the process-wide driver
/// session.
pub struct DriverSupervisor {
    mode: DriverMode,
    script_timeout: Duration,
    session: Mutex<Option<DriverSession>>,
}

impl DriverSupervisor {
    /// Build a supervisor from configuration. No browser is started until
    /// the first [`lease`](Self::lease); regular requests never pay the
    /// startup cost.
    pub fn new(config: &AppConfig) -> Self {
        Self {
            mode: DriverMode::from_config(config),
            script_timeout: config.script_timeout(),
            session: Mutex::new(None),
        }
    }

    /// The configured operating mode.
    pub fn mode(&self) -> &DriverMode {
        &self.mode
    }

    /// Obtain the session, creating or repairing it first.
    ///
    /// The returned lease holds the supervisor's lock, so concurrent callers
    /// queue here rather than racing to replace the session or driving one
    /// browser from two renders at once.
    ///
    /// # Errors
    ///
    /// Returns `Error::DriverUnavailable` if a dedicated endpoint is not
    /// connectable, or if a local launch fails.
    pub async fn lease(&self) -> Result<SessionLease<'_>, Error> {
        let mut guard = self.session.lock().await;

        match &self.mode {
            DriverMode::Dedicated { port } => match guard.as_ref() {
                None => {
                    *guard = Some(DriverSession::connect(*port, self.script_timeout).await?);
                }
                Some(session) => {
                    if !session.is_connectable().await {
                        // Not our process to restart.
                        return Err(Error::DriverUnavailable(format!(
                            "dedicated browser instance on port {port} stopped responding"
                        )));
                    }
                }
            },
            DriverMode::OnDemand { args } => {
                let dead = match guard.as_ref() {
                    Some(session) => !session.is_connectable().await,
                    None => false,
                };
                if dead
                    && let Some(old) = guard.take()
                {
                    tracing::warn!("local browser session died, replacing it");
                    old.shutdown().await;
                }
                if guard.is_none() {
                    *guard = Some(DriverSession::launch(args, self.script_timeout).await?);
                }
            }
        }

        Ok(SessionLease { guard })
    }
}

/// Exclusive access to the live session for the duration of one render.
///
/// Dropping the lease releases the supervisor's lock.
pub struct SessionLease<'a> {
    guard: MutexGuard<'a, Option<DriverSession>>,
}

impl Deref for SessionLease<'_> {
    type Target = DriverSession;

    fn deref(&self) -> &DriverSession {
        // The supervisor only hands out a lease after placing a session.
        self.guard.as_ref().expect("session present while leased")
    }
}
