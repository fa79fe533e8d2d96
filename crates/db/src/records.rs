use chrono::{DateTime, Utc};
use metering_core::{TokenCounts, UsageRecord};
use rusqlite::types::Value;
use rusqlite::{Row, Transaction, params, params_from_iter};

use crate::Db;
use crate::error::Result;
use crate::helpers::{
    decimal_to_micros, format_ts, get_cost, get_count, get_opt_ts, get_ts, list_filter_clause,
    to_sql_count,
};
use crate::types::{RecordListFilter, StoredUsageRecord};

const RECORD_COLUMNS: &str = r#"
    id, user_id, model, prompt_tokens, completion_tokens, total_tokens, cached_tokens,
    reasoning_tokens, cost_micros, cost_currency, success, error, is_streaming, started_at,
    first_chunk_at, created_at
"#;

impl Db {
    pub fn insert_usage_records(&mut self, records: &[UsageRecord]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for record in records {
            insert_record(&tx, record, None)?;
        }
        tx.commit()?;
        Ok(records.len())
    }

    /// Stores one record along with its free-form metadata JSON.
    pub fn insert_usage_record(&mut self, record: &UsageRecord, metadata: Option<&str>) -> Result<()> {
        let tx = self.conn.transaction()?;
        insert_record(&tx, record, metadata)?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_usage_record(&self, id: &str) -> Result<Option<UsageRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM usage_record WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row_to_usage_record(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn usage_record_metadata(&self, id: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT metadata FROM usage_record WHERE id = ?1")?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => Ok(None),
        }
    }

    /// One page of matching records, newest first, with the total number of
    /// matches.
    pub fn list_usage_records(
        &self,
        filter: &RecordListFilter,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<StoredUsageRecord>, u64)> {
        let (clause, mut values) = list_filter_clause(filter);
        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM usage_record {clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        let limit_idx = values.len();
        values.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));
        let offset_idx = values.len();
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {RECORD_COLUMNS}, metadata
            FROM usage_record
            {clause}
            ORDER BY created_at DESC, id DESC
            LIMIT ?{limit_idx} OFFSET ?{offset_idx}
            "#
        ))?;
        let records = stmt
            .query_map(params_from_iter(values), |row| {
                Ok(StoredUsageRecord {
                    record: row_to_usage_record(row)?,
                    metadata: row.get(16)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok((records, u64::try_from(total).unwrap_or_default()))
    }

    /// Walks records with `created_at` in `[start, end]` ordered by
    /// `(created_at, id)`, handing them to `visit` one page at a time.
    /// Returns the number of records visited.
    pub fn scan_usage_records<F>(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        chunk_size: usize,
        mut visit: F,
    ) -> Result<usize>
    where
        F: FnMut(&[UsageRecord]) -> Result<()>,
    {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM usage_record
            WHERE created_at >= ?1 AND created_at <= ?2
              AND (created_at > ?3 OR (created_at = ?3 AND id > ?4))
            ORDER BY created_at ASC, id ASC
            LIMIT ?5
            "#
        ))?;
        let start = format_ts(start);
        let end = format_ts(end);
        let limit = chunk_size.max(1) as i64;
        let mut cursor = (String::new(), String::new());
        let mut visited = 0usize;
        loop {
            let page = stmt
                .query_map(
                    params![start, end, cursor.0, cursor.1, limit],
                    row_to_usage_record,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = (format_ts(last.created_at), last.id.clone());
            visited += page.len();
            visit(&page)?;
            if (page.len() as i64) < limit {
                break;
            }
        }
        tracing::debug!(visited, "scanned usage records");
        Ok(visited)
    }
}

fn insert_record(tx: &Transaction<'_>, record: &UsageRecord, metadata: Option<&str>) -> Result<()> {
    let cost_micros = record.cost.map(decimal_to_micros).transpose()?;
    tx.execute(
        r#"
        INSERT INTO usage_record (
          id, user_id, model, prompt_tokens, completion_tokens, total_tokens, cached_tokens,
          reasoning_tokens, cost_micros, cost_currency, success, error, is_streaming, started_at,
          first_chunk_at, created_at, metadata
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        "#,
        params![
            record.id,
            record.user_id,
            record.model.trim(),
            to_sql_count(record.tokens.prompt_tokens),
            to_sql_count(record.tokens.completion_tokens),
            to_sql_count(record.tokens.total_tokens),
            to_sql_count(record.tokens.cached_tokens),
            to_sql_count(record.tokens.reasoning_tokens),
            cost_micros,
            record.cost_currency,
            record.success,
            record.error,
            record.is_streaming,
            record.started_at.map(format_ts),
            record.first_chunk_at.map(format_ts),
            format_ts(record.created_at),
            metadata,
        ],
    )?;
    Ok(())
}

fn row_to_usage_record(row: &Row<'_>) -> rusqlite::Result<UsageRecord> {
    Ok(UsageRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        model: row.get(2)?,
        tokens: TokenCounts {
            prompt_tokens: get_count(row, 3)?,
            completion_tokens: get_count(row, 4)?,
            total_tokens: get_count(row, 5)?,
            cached_tokens: get_count(row, 6)?,
            reasoning_tokens: get_count(row, 7)?,
        },
        cost: get_cost(row, 8)?,
        cost_currency: row.get(9)?,
        success: row.get(10)?,
        error: row.get(11)?,
        is_streaming: row.get(12)?,
        started_at: get_opt_ts(row, 13)?,
        first_chunk_at: get_opt_ts(row, 14)?,
        created_at: get_ts(row, 15)?,
    })
}
