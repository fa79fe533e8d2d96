use rusqlite::Connection;

use crate::Db;
use crate::error::Result;

const MIGRATION_0001: &str = include_str!("../migrations/0001_usage_record.sql");
const MIGRATION_0002: &str = include_str!("../migrations/0002_usage_series.sql");
const MIGRATION_0003: &str = include_str!("../migrations/0003_usage_record_metadata.sql");

const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_usage_record", MIGRATION_0001),
    ("0002_usage_series", MIGRATION_0002),
    ("0003_usage_record_metadata", MIGRATION_0003),
];

impl Db {
    /// Applies every migration. Safe to run on each open.
    pub fn migrate(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (name, sql) in MIGRATIONS {
            if *name == "0003_usage_record_metadata"
                && table_has_column(&tx, "usage_record", "metadata")?
            {
                continue;
            }
            tx.execute_batch(sql)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
