#![allow(dead_code)]

use chrono::{DateTime, Utc};
use metering_app::{AppConfig, AppState};
use metering_core::{DEFAULT_COST_CURRENCY, TokenCounts, UsageRecord};
use tempfile::TempDir;

pub struct TestApp {
    pub _dir: TempDir,
    pub state: AppState,
}

pub fn setup_app() -> TestApp {
    setup_app_with(|_| {})
}

pub fn setup_app_with(configure: impl FnOnce(&mut AppConfig)) -> TestApp {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut config = AppConfig::new(dir.path().join("metering.sqlite"));
    configure(&mut config);
    let state = AppState::new(config);
    state.initialize().expect("initialize");
    TestApp { _dir: dir, state }
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
            total_tokens,
            ..TokenCounts::default()
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

pub fn insert_records(app: &TestApp, records: Vec<UsageRecord>) {
    let mut db = app.state.open_db().expect("open db");
    db.insert_usage_records(&records).expect("insert records");
}

/// The three gpt-4 calls of 2026-02-21 used across tests.
pub fn seed_feb_21(app: &TestApp) {
    insert_records(
        app,
        vec![
            make_record("a", "2026-02-21T03:10:00Z", "gpt-4", 10),
            make_record("b", "2026-02-21T03:40:00Z", "gpt-4", 10),
            make_record("c", "2026-02-21T04:05:00Z", "gpt-4", 10),
        ],
    );
}
