mod support;

use metering_core::{Granularity, SeriesAggregator};
use metering_db::{Db, RecordListFilter, UsageFilter};
use rust_decimal::Decimal;
use support::{insert_records, make_record, setup_db, ts};

#[test]
fn stored_record_round_trips_optional_fields() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let mut record = make_record("r1", "2026-02-21T03:10:00Z", "gpt-4", 10);
    record.user_id = Some("u1".to_string());
    record.cost = Some(Decimal::new(12_345, 6));
    record.is_streaming = true;
    record.started_at = Some(ts("2026-02-21T03:09:50Z"));
    record.first_chunk_at = Some(ts("2026-02-21T03:09:50.250Z"));
    db.insert_usage_record(&record, Some(r#"{"request_id":"abc"}"#))
        .expect("insert");

    let stored = db.get_usage_record("r1").expect("load").expect("present");
    assert_eq!(stored, record);
    assert_eq!(
        db.usage_record_metadata("r1").expect("metadata").as_deref(),
        Some(r#"{"request_id":"abc"}"#)
    );
    assert!(db.get_usage_record("missing").expect("load").is_none());
}

#[test]
fn scan_pages_in_created_order_with_inclusive_bounds() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    let mut records = Vec::new();
    for minute in 0..7 {
        records.push(make_record(
            &format!("r{minute}"),
            &format!("2026-02-21T03:{:02}:00Z", minute * 5),
            "gpt-4",
            1,
        ));
    }
    // Same timestamp as r6; ordered after it by id.
    records.push(make_record("r7", "2026-02-21T03:30:00Z", "gpt-4", 1));
    records.push(make_record("late", "2026-02-21T04:00:00Z", "gpt-4", 1));
    insert_records(db, records);

    let mut pages = Vec::new();
    let visited = db
        .scan_usage_records(
            ts("2026-02-21T03:00:00Z"),
            ts("2026-02-21T03:30:00Z"),
            3,
            |page| {
                pages.push(page.iter().map(|r| r.id.clone()).collect::<Vec<_>>());
                Ok(())
            },
        )
        .expect("scan");

    assert_eq!(visited, 8);
    assert_eq!(
        pages,
        vec![
            vec!["r0", "r1", "r2"],
            vec!["r3", "r4", "r5"],
            vec!["r6", "r7"],
        ]
    );
}

#[test]
fn scan_of_empty_range_visits_nothing() {
    let test_db = setup_db();
    let mut calls = 0;
    let visited = test_db
        .db
        .scan_usage_records(
            ts("2026-02-21T00:00:00Z"),
            ts("2026-02-21T23:59:59Z"),
            100,
            |_| {
                calls += 1;
                Ok(())
            },
        )
        .expect("scan");
    assert_eq!(visited, 0);
    assert_eq!(calls, 0);
}

fn seed_totals(db: &mut Db) {
    let mut a = make_record("a", "2026-02-21T03:10:00Z", "gpt-4", 10);
    a.user_id = Some("u1".to_string());
    a.cost = Some(Decimal::new(5, 2));
    let mut b = make_record("b", "2026-02-21T03:40:00Z", "gpt-4", 10);
    b.success = false;
    b.cost = Some(Decimal::new(7, 2));
    let mut c = make_record("c", "2026-02-21T04:05:00Z", "claude", 50);
    c.user_id = Some("u1".to_string());
    let d = make_record("d", "2026-02-22T01:00:00Z", "", 5);
    insert_records(db, vec![a, b, c, d]);
}

#[test]
fn totals_respect_filters() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    seed_totals(db);

    let all = db.usage_totals(&UsageFilter::default()).expect("totals");
    assert_eq!(all.calls, 4);
    assert_eq!(all.successful_calls, 3);
    assert_eq!(all.tokens.total_tokens, 75);
    assert_eq!(all.cost, Some(Decimal::new(12, 2)));

    let day = db
        .usage_totals(&UsageFilter::range(
            ts("2026-02-21T00:00:00Z"),
            ts("2026-02-21T23:59:59Z"),
        ))
        .expect("day totals");
    assert_eq!(day.calls, 3);

    let user = db
        .usage_totals(&UsageFilter {
            user_id: Some("u1".to_string()),
            ..UsageFilter::default()
        })
        .expect("user totals");
    assert_eq!(user.calls, 2);
    assert_eq!(user.tokens.total_tokens, 60);

    let empty = db
        .usage_totals(&UsageFilter::range(
            ts("2030-01-01T00:00:00Z"),
            ts("2030-01-02T00:00:00Z"),
        ))
        .expect("empty totals");
    assert_eq!(empty.calls, 0);
    assert_eq!(empty.cost, None);
}

#[test]
fn totals_by_model_order_by_tokens() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    seed_totals(db);

    let rows = db
        .usage_totals_by_model(&UsageFilter::default())
        .expect("by model");
    let models: Vec<&str> = rows.iter().map(|(model, _)| model.as_str()).collect();
    assert_eq!(models, vec!["claude", "gpt-4", "unknown"]);
    assert_eq!(rows[1].1.calls, 2);
    assert_eq!(rows[0].1.cost, None);
}

#[test]
fn totals_by_bucket_use_utc_prefixes() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    seed_totals(db);

    let hours = db
        .usage_totals_by_bucket(&UsageFilter::default(), Granularity::Hour)
        .expect("hours");
    let buckets: Vec<_> = hours.iter().map(|(bucket, _)| *bucket).collect();
    assert_eq!(
        buckets,
        vec![
            ts("2026-02-21T03:00:00Z"),
            ts("2026-02-21T04:00:00Z"),
            ts("2026-02-22T01:00:00Z"),
        ]
    );
    assert_eq!(hours[0].1.calls, 2);

    let months = db
        .usage_totals_by_bucket(&UsageFilter::default(), Granularity::Month)
        .expect("months");
    assert_eq!(months.len(), 1);
    assert_eq!(months[0].0, ts("2026-02-01T00:00:00Z"));
    assert_eq!(months[0].1.calls, 4);
}

#[test]
fn padded_model_names_group_together_in_sql_and_series() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    insert_records(
        db,
        vec![
            make_record("plain", "2026-02-21T03:00:00Z", "gpt-4", 1),
            make_record("newline", "2026-02-21T03:10:00Z", "gpt-4\n", 1),
            make_record("tabbed", "2026-02-21T03:20:00Z", " gpt-4\t", 1),
            make_record("blank", "2026-02-21T03:30:00Z", "\r\n", 1),
        ],
    );

    let stored = db.get_usage_record("newline").expect("load").expect("present");
    assert_eq!(stored.model, "gpt-4");

    let by_model = db
        .usage_totals_by_model(&UsageFilter::default())
        .expect("by model");
    let models: Vec<(&str, u64)> = by_model
        .iter()
        .map(|(model, totals)| (model.as_str(), totals.calls))
        .collect();
    assert_eq!(models, vec![("gpt-4", 3), ("unknown", 1)]);

    let mut aggregator = SeriesAggregator::new(Granularity::Day);
    db.scan_usage_records(
        ts("2026-02-21T00:00:00Z"),
        ts("2026-02-21T23:59:59Z"),
        10,
        |page| {
            aggregator.extend(page);
            Ok(())
        },
    )
    .expect("scan");
    let series: Vec<(String, u64)> = aggregator
        .into_rows()
        .into_iter()
        .map(|row| (row.model, row.call_count))
        .collect();
    assert_eq!(
        series,
        vec![("gpt-4".to_string(), 3), ("unknown".to_string(), 1)]
    );
}

fn seed_listing(db: &mut Db) {
    let mut failed = make_record("failed", "2026-02-21T05:00:00Z", "GPT-4o-mini", 1);
    failed.success = false;
    failed.error = Some("timeout".to_string());
    let mut other_user = make_record("other-user", "2026-02-21T04:00:00Z", "gpt-4o", 1);
    other_user.user_id = Some("u2".to_string());
    insert_records(
        db,
        vec![
            make_record("first", "2026-02-21T01:00:00Z", "gpt-4o", 1),
            make_record("second", "2026-02-21T02:00:00Z", "claude-3", 1),
            make_record("third", "2026-02-21T03:00:00Z", "gpt-4o", 1),
            other_user,
            failed,
            make_record("next-day", "2026-02-22T01:00:00Z", "gpt-4o", 1),
        ],
    );
}

#[test]
fn listing_pages_newest_first_with_total() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    seed_listing(db);
    db.insert_usage_record(
        &make_record("with-meta", "2026-02-20T01:00:00Z", "gpt-4o", 1),
        Some(r#"{"trace":"t1"}"#),
    )
    .expect("insert");

    let (page, total) = db
        .list_usage_records(&RecordListFilter::default(), 3, 0)
        .expect("first page");
    let ids: Vec<&str> = page.iter().map(|item| item.record.id.as_str()).collect();
    assert_eq!(total, 7);
    assert_eq!(ids, vec!["next-day", "failed", "other-user"]);

    let (page, total) = db
        .list_usage_records(&RecordListFilter::default(), 3, 6)
        .expect("last page");
    assert_eq!(total, 7);
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].record.id, "with-meta");
    assert_eq!(page[0].metadata.as_deref(), Some(r#"{"trace":"t1"}"#));
}

#[test]
fn listing_filters_combine() {
    let mut test_db = setup_db();
    let db = &mut test_db.db;
    seed_listing(db);

    let by_model = RecordListFilter {
        model: Some("gpt-4O".to_string()),
        ..RecordListFilter::default()
    };
    let (page, total) = db.list_usage_records(&by_model, 10, 0).expect("model");
    assert_eq!(total, 5);
    assert!(page.iter().all(|item| item.record.model.to_lowercase().contains("gpt-4o")));

    let failed_only = RecordListFilter {
        success: Some(false),
        ..RecordListFilter::default()
    };
    let (page, total) = db.list_usage_records(&failed_only, 10, 0).expect("failed");
    assert_eq!(total, 1);
    assert_eq!(page[0].record.error.as_deref(), Some("timeout"));

    let day_for_user = RecordListFilter {
        usage: UsageFilter {
            start: Some(ts("2026-02-21T00:00:00Z")),
            end: Some(ts("2026-02-21T23:59:59.999999Z")),
            user_id: Some("u2".to_string()),
        },
        model: Some("gpt".to_string()),
        success: Some(true),
    };
    let (page, total) = db.list_usage_records(&day_for_user, 10, 0).expect("combined");
    assert_eq!(total, 1);
    assert_eq!(page[0].record.id, "other-user");
}
