use chrono::{DateTime, Utc};
use metering_core::{Granularity, TokenCounts, UsageTotals};
use rusqlite::{Row, params_from_iter};

use crate::Db;
use crate::error::Result;
use crate::helpers::{
    MODEL_KEY_SQL, bucket_prefix_len, filter_clause, get_cost, get_count, parse_bucket_prefix,
};
use crate::types::UsageFilter;

const TOTALS_SQL: &str = r#"
    COUNT(*),
    SUM(CASE WHEN success THEN 1 ELSE 0 END),
    SUM(prompt_tokens),
    SUM(completion_tokens),
    SUM(total_tokens),
    SUM(cached_tokens),
    SUM(reasoning_tokens),
    SUM(cost_micros)
"#;

impl Db {
    pub fn usage_totals(&self, filter: &UsageFilter) -> Result<UsageTotals> {
        let (clause, values) = filter_clause(filter);
        let sql = format!("SELECT {TOTALS_SQL} FROM usage_record {clause}");
        let totals = self
            .conn
            .query_row(&sql, params_from_iter(values), |row| row_to_totals(row, 0))?;
        Ok(totals)
    }

    /// Per-model totals, heaviest token users first.
    pub fn usage_totals_by_model(&self, filter: &UsageFilter) -> Result<Vec<(String, UsageTotals)>> {
        let (clause, values) = filter_clause(filter);
        let sql = format!(
            r#"
            SELECT {MODEL_KEY_SQL} AS model_key, {TOTALS_SQL}
            FROM usage_record
            {clause}
            GROUP BY model_key
            ORDER BY SUM(total_tokens) DESC, model_key ASC
            "#
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, String>(0)?, row_to_totals(row, 1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Totals per UTC bucket for buckets that have at least one record.
    pub fn usage_totals_by_bucket(
        &self,
        filter: &UsageFilter,
        granularity: Granularity,
    ) -> Result<Vec<(DateTime<Utc>, UsageTotals)>> {
        let (clause, values) = filter_clause(filter);
        let sql = format!(
            r#"
            SELECT substr(created_at, 1, {len}) AS bucket_key, {TOTALS_SQL}
            FROM usage_record
            {clause}
            GROUP BY bucket_key
            ORDER BY bucket_key ASC
            "#,
            len = bucket_prefix_len(granularity)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), |row| {
                Ok((row.get::<_, String>(0)?, row_to_totals(row, 1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(prefix, totals)| Ok((parse_bucket_prefix(&prefix, granularity)?, totals)))
            .collect()
    }
}

fn row_to_totals(row: &Row<'_>, offset: usize) -> rusqlite::Result<UsageTotals> {
    Ok(UsageTotals {
        calls: get_count(row, offset)?,
        successful_calls: get_count(row, offset + 1)?,
        tokens: TokenCounts {
            prompt_tokens: get_count(row, offset + 2)?,
            completion_tokens: get_count(row, offset + 3)?,
            total_tokens: get_count(row, offset + 4)?,
            cached_tokens: get_count(row, offset + 5)?,
            reasoning_tokens: get_count(row, offset + 6)?,
        },
        cost: get_cost(row, offset + 7)?,
    })
}
