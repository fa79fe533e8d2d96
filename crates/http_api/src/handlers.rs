use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use app_api::{AggregateRequest, ChartRequest, RecordListRequest, RecordRequest, StatsRequest};

use crate::{errors::HttpError, state::HttpState};

pub async fn health(State(state): State<HttpState>) -> impl IntoResponse {
    Json(app_api::status(&state.context))
}

pub async fn usage_stats(
    State(state): State<HttpState>,
    Query(req): Query<StatsRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let context = state.context.clone();
    let response = tokio::task::spawn_blocking(move || app_api::usage_stats(&context, req)).await??;
    Ok(Json(response))
}

pub async fn usage_series(
    State(state): State<HttpState>,
    Query(req): Query<ChartRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let context = state.context.clone();
    let response =
        tokio::task::spawn_blocking(move || app_api::usage_chart_series(&context, req)).await??;
    Ok(Json(response))
}

pub async fn aggregate(
    State(state): State<HttpState>,
    Json(req): Json<AggregateRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let context = state.context.clone();
    let response =
        tokio::task::spawn_blocking(move || app_api::aggregate_usage(&context, req)).await??;
    Ok(Json(response))
}

pub async fn list_records(
    State(state): State<HttpState>,
    Query(req): Query<RecordListRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let context = state.context.clone();
    let response =
        tokio::task::spawn_blocking(move || app_api::list_usage_records(&context, req)).await??;
    Ok(Json(response))
}

pub async fn record(
    State(state): State<HttpState>,
    Json(req): Json<RecordRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let context = state.context.clone();
    let response =
        tokio::task::spawn_blocking(move || app_api::record_usage(&context, req)).await??;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn not_found() -> HttpError {
    HttpError::new(StatusCode::NOT_FOUND, "not found", Some("not_found".to_string()))
}
