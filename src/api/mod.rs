//! API 模块
//!
//! 薄HTTP层：参数校验 + 服务调用 + 统一响应格式

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use tower_http::trace::TraceLayer;

use crate::{api::response::ApiResponse, app_state::AppState};

pub mod distributor_api;
pub mod order_events_api;
pub mod report_api;
pub mod response;
pub mod withdrawal_api;

/// GET /healthz
async fn healthz() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

/// 组装全部路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/orders", order_events_api::routes())
        .nest("/api/distributors", distributor_api::routes())
        .nest("/api/withdrawals", withdrawal_api::routes())
        .nest("/api/reports", report_api::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
