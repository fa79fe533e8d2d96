use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use app_api::AppContext;
use metering_app::{AppConfig, AppState};

use http_api::{ADMIN_TOKEN_HEADER, HttpState};

const TEST_TOKEN: &str = "testtoken";

struct TestApp {
    _temp_dir: tempfile::TempDir,
    router: axum::Router,
}

fn build_app() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let config = AppConfig::new(temp_dir.path().join("metering.sqlite"));
    let app_state = AppState::new(config);
    app_state.initialize().expect("initialize");

    let context = AppContext {
        app_state,
        app_data_dir: temp_dir.path().to_path_buf(),
    };
    let state = HttpState::with_admin_token(context, TEST_TOKEN.to_string());
    let router = http_api::router(state);

    TestApp {
        _temp_dir: temp_dir,
        router,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(ADMIN_TOKEN_HEADER, TEST_TOKEN)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(ADMIN_TOKEN_HEADER, TEST_TOKEN)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("response");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn api_rejects_missing_admin_token() {
    let app = build_app();

    let request = Request::builder()
        .uri("/api/usage/stats")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "admin_required");
}

#[tokio::test]
async fn api_rejects_wrong_admin_token() {
    let app = build_app();

    let request = Request::builder()
        .uri("/api/usage/stats")
        .header(ADMIN_TOKEN_HEADER, "nope")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_open() {
    let app = build_app();

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .expect("request");
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["aggregation_timezone"], "UTC");
}

#[tokio::test]
async fn stats_day_view_fills_every_hour() {
    let app = build_app();

    let (status, body) = send(
        &app,
        get("/api/usage/stats?start_date=2026-02-21&end_date=2026-02-21&granularity=day"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["total_calls"], 0);
    assert_eq!(body["series"]["granularity"], "day");
    let items = body["series"]["items"].as_array().expect("items");
    assert_eq!(items.len(), 24);
    assert_eq!(body["expected_buckets"].as_array().expect("buckets").len(), 24);
}

#[tokio::test]
async fn stats_rejects_unknown_granularity() {
    let app = build_app();

    let (status, body) = send(
        &app,
        get("/api/usage/stats?start_date=2026-02-21&end_date=2026-02-21&granularity=week"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn recorded_call_shows_up_in_stats_and_chart() {
    let app = build_app();

    let (status, record) = send(
        &app,
        post_json(
            "/api/usage/records",
            json!({
                "model": "gpt-4o",
                "finished_at": "2026-02-21T03:10:00Z",
                "cost": 0.5,
                "usage": {
                    "prompt_tokens": 10,
                    "completion_tokens": 5,
                    "total_tokens": 15
                }
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(record["model"], "gpt-4o");
    assert_eq!(record["total_tokens"], 15);

    let (status, stats) = send(
        &app,
        get("/api/usage/stats?start_date=2026-02-21&end_date=2026-02-21"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["summary"]["total_calls"], 1);
    assert_eq!(stats["summary"]["total_tokens"], 15);
    assert_eq!(stats["by_model"][0]["model"], "gpt-4o");

    let (status, chart) = send(
        &app,
        get("/api/usage/series?granularity=day&start_date=2026-02-21&end_date=2026-02-21"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let points = chart.as_array().expect("points");
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["bucket"], "2026-02-21T03:00:00+00:00");
    assert_eq!(points[0]["call_count"], 1);
}

#[tokio::test]
async fn chart_requires_range() {
    let app = build_app();

    let (status, body) = send(&app, get("/api/usage/series?granularity=day")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn aggregate_reports_upserted_rows() {
    let app = build_app();

    for finished_at in ["2026-02-21T03:10:00Z", "2026-02-21T04:10:00Z"] {
        let (status, _) = send(
            &app,
            post_json(
                "/api/usage/records",
                json!({
                    "model": "gpt-4o",
                    "finished_at": finished_at,
                    "usage": { "total_tokens": 3 }
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, outcome) = send(
        &app,
        post_json(
            "/api/usage/aggregate",
            json!({
                "granularity": "hour",
                "start": "2026-02-21T00:00:00Z",
                "end": "2026-02-21T23:59:59Z"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["upserted"], 2);
    assert_eq!(outcome["granularity"], "hour");
}

#[tokio::test]
async fn aggregate_rejects_unknown_granularity() {
    let app = build_app();

    let (status, body) = send(
        &app,
        post_json("/api/usage/aggregate", json!({ "granularity": "week" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let app = build_app();

    let (status, body) = send(&app, get("/api/nope")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn record_listing_filters_and_pages() {
    let app = build_app();

    let calls = [
        ("gpt-4o", "2026-02-21T01:00:00Z", None),
        ("claude-3", "2026-02-21T02:00:00Z", None),
        ("GPT-4o-mini", "2026-02-21T03:00:00Z", Some("timeout")),
        ("gpt-4o", "2026-02-22T01:00:00Z", None),
    ];
    for (model, finished_at, error) in calls {
        let (status, _) = send(
            &app,
            post_json(
                "/api/usage/records",
                json!({
                    "model": model,
                    "finished_at": finished_at,
                    "error": error,
                    "usage": { "total_tokens": 1 }
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, get("/api/usage/records?page=1&page_size=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 4);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 2);
    let results = body["results"].as_array().expect("results");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["created_at"], "2026-02-22T01:00:00Z");

    let (status, body) = send(
        &app,
        get("/api/usage/records?model=gpt&start_date=2026-02-21&end_date=2026-02-21&success=true"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["results"][0]["model"], "gpt-4o");

    let (status, body) = send(&app, get("/api/usage/records?success=false")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["results"][0]["error"], "timeout");
}

#[tokio::test]
async fn record_listing_requires_admin_and_valid_page() {
    let app = build_app();

    let request = Request::builder()
        .uri("/api/usage/records")
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, get("/api/usage/records?page=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_input");
}
