//! 订单事件接入
//! 交易系统在订单完成/退款时回调这里，是佣金核心的唯一入账入口

use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    error::AppError,
    service::OrderCompletedEvent,
};

#[derive(Debug, Deserialize)]
pub struct OrderCompletedRequest {
    pub order_id: i64,
    pub buyer_id: i64,
    /// 可计佣金额（元）
    pub amount: Decimal,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderCompletedResponse {
    pub order_id: i64,
    pub commission_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct OrderRefundedRequest {
    pub order_id: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderRefundedResponse {
    pub order_id: i64,
    pub reversed_count: usize,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/completed", post(order_completed))
        .route("/refunded", post(order_refunded))
}

/// POST /api/orders/completed
///
/// 订单完成：按买家上级链发放多级佣金
async fn order_completed(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrderCompletedRequest>,
) -> Result<Json<ApiResponse<OrderCompletedResponse>>, AppError> {
    if req.amount <= Decimal::ZERO {
        return Err(AppError::invalid_parameter(
            "Order amount must be positive",
        ));
    }

    let event = OrderCompletedEvent {
        order_id: req.order_id,
        buyer_id: req.buyer_id,
        amount: req.amount,
        completed_at: req.completed_at,
    };
    let commission_ids = state.ledger.grant(&event).await?;

    success_response(OrderCompletedResponse {
        order_id: req.order_id,
        commission_ids,
    })
}

/// POST /api/orders/refunded
///
/// 订单退款：作废该订单佣金，已结算部分回冲余额
async fn order_refunded(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OrderRefundedRequest>,
) -> Result<Json<ApiResponse<OrderRefundedResponse>>, AppError> {
    let reversed_count = state.ledger.refund(req.order_id).await?;

    success_response(OrderRefundedResponse {
        order_id: req.order_id,
        reversed_count,
    })
}
