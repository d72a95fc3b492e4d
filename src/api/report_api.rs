//! 报表API
//! 查询周期快照；支持按需重建（幂等覆盖）

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    error::AppError,
    repository::{reports, Report},
    service::report_service::{PERIOD_DAILY, PERIOD_MONTHLY, PERIOD_WEEKLY},
};

#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub period: String,
    pub date: NaiveDate,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:period/:date", get(get_report))
        .route("/generate", post(generate_report))
}

fn validate_period(period: &str) -> Result<(), AppError> {
    match period {
        PERIOD_DAILY | PERIOD_WEEKLY | PERIOD_MONTHLY => Ok(()),
        _ => Err(AppError::invalid_parameter(format!(
            "Invalid report period: {}",
            period
        ))),
    }
}

/// GET /api/reports/:period/:date
async fn get_report(
    State(state): State<Arc<AppState>>,
    Path((period, date)): Path<(String, NaiveDate)>,
) -> Result<Json<ApiResponse<Report>>, AppError> {
    validate_period(&period)?;
    let report = reports::get(&state.pool, &period, date)
        .await?
        .ok_or_else(|| {
            AppError::not_found(format!("No {} report for {}", period, date))
        })?;
    success_response(report)
}

/// POST /api/reports/generate
///
/// 重建指定周期的报表；已存在时覆盖
async fn generate_report(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateReportRequest>,
) -> Result<Json<ApiResponse<Report>>, AppError> {
    validate_period(&req.period)?;
    let report = match req.period.as_str() {
        PERIOD_DAILY => state.reports.generate_daily(req.date).await?,
        PERIOD_WEEKLY => state.reports.generate_weekly(req.date).await?,
        _ => state.reports.generate_monthly(req.date).await?,
    };
    success_response(report)
}
