//! Rendered page read/write operations on the SQLite store.

use super::connection::SqliteStore;
use crate::{CacheStore, Error};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

#[async_trait::async_trait]
impl CacheStore for SqliteStore {
    async fn exists(&self, key: &str) -> Result<bool, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let present: bool = conn
                    .query_row(
                        "SELECT EXISTS(SELECT 1 FROM rendered_pages WHERE key = ?1)",
                        params![key],
                        |row| row.get(0),
                    )
                    .map_err(Error::from)?;
                Ok(present)
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                conn.query_row(
                    "SELECT html FROM rendered_pages WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(Error::from)
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, key: &str, html: &str) -> Result<(), Error> {
        let key = key.to_string();
        let html = html.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO rendered_pages (key, html, rendered_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                        html = excluded.html,
                        rendered_at = excluded.rendered_at",
                    params![key, html, chrono::Utc::now().to_rfc3339()],
                )
                .map_err(Error::from)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
