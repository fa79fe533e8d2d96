#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use metering_core::{DEFAULT_COST_CURRENCY, TokenCounts, UsageRecord};
use metering_db::Db;
use tempfile::TempDir;

pub struct TestDb {
    pub _dir: TempDir,
    pub db: Db,
    pub path: PathBuf,
}

pub fn setup_db() -> TestDb {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.sqlite");
    let mut db = Db::open(&path).expect("open db");
    db.migrate().expect("migrate db");
    TestDb {
        _dir: dir,
        db,
        path,
    }
}

pub fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("timestamp")
        .with_timezone(&Utc)
}

pub fn make_record(id: &str, created_at: &str, model: &str, total_tokens: u64) -> UsageRecord {
    UsageRecord {
        id: id.to_string(),
        user_id: None,
        model: model.to_string(),
        tokens: TokenCounts {
            prompt_tokens: total_tokens / 2,
            completion_tokens: total_tokens - total_tokens / 2,
            total_tokens,
            cached_tokens: 0,
            reasoning_tokens: 0,
        },
        cost: None,
        cost_currency: DEFAULT_COST_CURRENCY.to_string(),
        success: true,
        error: None,
        is_streaming: false,
        started_at: None,
        first_chunk_at: None,
        created_at: ts(created_at),
    }
}

pub fn insert_records(db: &mut Db, records: Vec<UsageRecord>) {
    db.insert_usage_records(&records).expect("insert records");
}
