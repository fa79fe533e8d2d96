use chrono::Utc;
use metering_app::{
    AppError, JobOutcome, JobRequest, Result, UsageRecordPage, parse_end_date, parse_start_date,
};
use metering_core::{ChartPoint, UsageRecord, UsageStats, ViewGranularity};

use crate::{
    AggregateRequest, AppContext, ChartRequest, RecordListRequest, RecordRequest, StatsRequest,
    StatusResponse,
};

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::InvalidInput(format!("{name} is required")))
}

pub fn status(ctx: &AppContext) -> StatusResponse {
    let config = &ctx.app_state.config;
    StatusResponse {
        ok: true,
        aggregation_timezone: config.aggregation_timezone.name().to_string(),
        db_path: config.db_path.to_string_lossy().to_string(),
        app_data_dir: ctx.app_data_dir.to_string_lossy().to_string(),
    }
}

pub fn usage_stats(ctx: &AppContext, req: StatsRequest) -> Result<UsageStats> {
    ctx.app_state.services.stats.stats_from_params(&req.into())
}

pub fn usage_chart_series(ctx: &AppContext, req: ChartRequest) -> Result<Vec<ChartPoint>> {
    let view = required(req.granularity, "granularity")?.parse::<ViewGranularity>()?;
    let start = parse_start_date(Some(&required(req.start_date, "start_date")?))?;
    let end = parse_end_date(Some(&required(req.end_date, "end_date")?))?;
    let (Some(start), Some(end)) = (start, end) else {
        return Err(AppError::InvalidInput(
            "start_date and end_date are required".to_string(),
        ));
    };
    ctx.app_state
        .services
        .charts
        .read_chart_series(view, start.with_timezone(&Utc), end.with_timezone(&Utc))
}

pub fn aggregate_usage(ctx: &AppContext, req: AggregateRequest) -> Result<JobOutcome> {
    let request = JobRequest::from_params(&req.into())?;
    ctx.app_state.services.aggregation.run(&request)
}

pub fn record_usage(ctx: &AppContext, req: RecordRequest) -> Result<UsageRecord> {
    ctx.app_state.services.tracking.record(&req)
}

pub fn list_usage_records(ctx: &AppContext, req: RecordListRequest) -> Result<UsageRecordPage> {
    ctx.app_state.services.records.list_from_params(&req.into())
}
