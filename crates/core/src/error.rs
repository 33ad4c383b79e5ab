//! Unified error types for crawlable.
//!
//! Render timeouts are deliberately NOT an error: the pipeline reports them
//! as a degraded outcome so callers can serve best-effort content. Only
//! failures that must surface as a server error live here.

use tokio_rusqlite::rusqlite;

/// Unified error types for the crawlable core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Dedicated browser endpoint is configured but not reachable.
    #[error("driver unavailable: {0}")]
    DriverUnavailable(String),

    /// Navigation or automation-transport failure.
    #[error("render failed: {0}")]
    Render(String),

    /// Cache store operation failed.
    #[error("cache error: {0}")]
    Cache(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("cache error: migration failed: {0}")]
    MigrationFailed(String),

    /// A request URL could not be parsed or reassembled.
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Cache(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Cache(tokio_rusqlite::Error::Close(c)),
            _ => Error::Cache(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Cache(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Cache(tokio_rusqlite::Error::Error(err))
    }
}
