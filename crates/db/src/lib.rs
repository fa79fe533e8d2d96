//! SQLite storage for raw usage records and the materialized usage series.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
mod helpers;
mod migrations;
mod records;
mod series;
mod stats;
mod types;

pub use error::{DbError, Result};
pub use types::{DEFAULT_SCAN_CHUNK, RecordListFilter, StoredUsageRecord, UsageFilter};

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.pragma_update(None, "cache_size", -20_000)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self { conn })
    }
}
