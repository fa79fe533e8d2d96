use chrono::{DateTime, Utc};
use metering_core::{Granularity, SeriesRow, TokenCounts};
use rusqlite::{Row, params};

use crate::Db;
use crate::error::Result;
use crate::helpers::{
    decimal_to_micros, format_ts, get_cost, get_count, get_granularity, get_ts, to_sql_count,
};

impl Db {
    /// Writes every row keyed by `(granularity, bucket, model)` in one
    /// transaction, replacing derived fields of existing keys.
    pub fn upsert_series_rows(&mut self, rows: &[SeriesRow]) -> Result<usize> {
        let updated_at = format_ts(Utc::now());
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO usage_series (
                  granularity, bucket, model, call_count, success_count, prompt_tokens,
                  completion_tokens, total_tokens, cached_tokens, reasoning_tokens,
                  total_cost_micros, cost_currency, avg_e2e_latency_sec, avg_ttft_sec,
                  avg_output_tps, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                ON CONFLICT (granularity, bucket, model) DO UPDATE SET
                  call_count = excluded.call_count,
                  success_count = excluded.success_count,
                  prompt_tokens = excluded.prompt_tokens,
                  completion_tokens = excluded.completion_tokens,
                  total_tokens = excluded.total_tokens,
                  cached_tokens = excluded.cached_tokens,
                  reasoning_tokens = excluded.reasoning_tokens,
                  total_cost_micros = excluded.total_cost_micros,
                  cost_currency = excluded.cost_currency,
                  avg_e2e_latency_sec = excluded.avg_e2e_latency_sec,
                  avg_ttft_sec = excluded.avg_ttft_sec,
                  avg_output_tps = excluded.avg_output_tps,
                  updated_at = excluded.updated_at
                "#,
            )?;
            for row in rows {
                let total_cost = row.total_cost.map(decimal_to_micros).transpose()?;
                stmt.execute(params![
                    row.granularity.as_str(),
                    format_ts(row.bucket),
                    row.model,
                    to_sql_count(row.call_count),
                    to_sql_count(row.success_count),
                    to_sql_count(row.tokens.prompt_tokens),
                    to_sql_count(row.tokens.completion_tokens),
                    to_sql_count(row.tokens.total_tokens),
                    to_sql_count(row.tokens.cached_tokens),
                    to_sql_count(row.tokens.reasoning_tokens),
                    total_cost,
                    row.cost_currency,
                    row.avg_e2e_latency_sec,
                    row.avg_ttft_sec,
                    row.avg_output_tps,
                    updated_at,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(rows = rows.len(), "upserted usage series rows");
        Ok(rows.len())
    }

    /// Materialized rows with `bucket` in `[start, end]`, ordered by bucket
    /// then model.
    pub fn load_series_rows(
        &self,
        granularity: Granularity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SeriesRow>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT granularity, bucket, model, call_count, success_count, prompt_tokens,
                   completion_tokens, total_tokens, cached_tokens, reasoning_tokens,
                   total_cost_micros, cost_currency, avg_e2e_latency_sec, avg_ttft_sec,
                   avg_output_tps
            FROM usage_series
            WHERE granularity = ?1 AND bucket >= ?2 AND bucket <= ?3
            ORDER BY bucket ASC, model ASC
            "#,
        )?;
        let rows = stmt
            .query_map(
                params![granularity.as_str(), format_ts(start), format_ts(end)],
                row_to_series_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_series_row(row: &Row<'_>) -> rusqlite::Result<SeriesRow> {
    Ok(SeriesRow {
        granularity: get_granularity(row, 0)?,
        bucket: get_ts(row, 1)?,
        model: row.get(2)?,
        call_count: get_count(row, 3)?,
        success_count: get_count(row, 4)?,
        tokens: TokenCounts {
            prompt_tokens: get_count(row, 5)?,
            completion_tokens: get_count(row, 6)?,
            total_tokens: get_count(row, 7)?,
            cached_tokens: get_count(row, 8)?,
            reasoning_tokens: get_count(row, 9)?,
        },
        total_cost: get_cost(row, 10)?,
        cost_currency: row.get(11)?,
        avg_e2e_latency_sec: row.get(12)?,
        avg_ttft_sec: row.get(13)?,
        avg_output_tps: row.get(14)?,
    })
}
