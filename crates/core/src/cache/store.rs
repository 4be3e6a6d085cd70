//! Durable key-value store operations.
//!
//! The dedup cache talks to persistence only through [`KvStore`], so tests
//! can swap in a faulting or instrumented store.

use super::connection::CacheDb;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Ordered byte-keyed store with no built-in expiry.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// Insert or overwrite `key`.
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error>;

    /// Read `key`. `Ok(None)` means not found.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &[u8]) -> Result<(), Error>;

    /// Release all resources. Called once at shutdown.
    async fn close(&self) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl KvStore for CacheDb {
    async fn put(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        let key = key.to_vec();
        let value = value.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO entries (key, value) VALUES (?1, ?2)
                    ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let key = key.to_vec();
        self.conn
            .call(move |conn| -> Result<Option<Vec<u8>>, Error> {
                let mut stmt = conn.prepare_cached("SELECT value FROM entries WHERE key = ?1")?;

                match stmt.query_row(params![key], |row| row.get(0)) {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, key: &[u8]) -> Result<(), Error> {
        let key = key.to_vec();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn close(&self) -> Result<(), Error> {
        CacheDb::close(self).await
    }
}

impl CacheDb {
    /// Number of stored entries, expired ones included.
    pub async fn entry_count(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
