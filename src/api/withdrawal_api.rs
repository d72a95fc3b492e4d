//! 提现API
//! 申请(冻结) / 审核(approve|reject|complete) / 自助取消 / 明细与流水

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    domain::AuditAction,
    error::AppError,
    repository::{withdrawals, Withdrawal, WithdrawalAudit},
};

#[derive(Debug, Deserialize)]
pub struct CreateWithdrawalRequest {
    pub distributor_id: i64,
    /// 提现金额（元）
    pub amount: Decimal,
    pub bank_name: String,
    pub bank_account: String,
    pub account_holder: String,
}

#[derive(Debug, Deserialize)]
pub struct AuditWithdrawalRequest {
    /// approve / reject / complete
    pub action: String,
    pub auditor_id: i64,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelWithdrawalRequest {
    pub distributor_id: i64,
    #[serde(default)]
    pub remark: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub distributor_id: i64,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_withdrawal).get(list_withdrawals))
        .route("/:id/audit", post(audit_withdrawal))
        .route("/:id/cancel", post(cancel_withdrawal))
        .route("/:id/audits", get(list_audit_trail))
}

/// POST /api/withdrawals
///
/// 发起提现：校验最低限额与余额后立即冻结
async fn create_withdrawal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWithdrawalRequest>,
) -> Result<Json<ApiResponse<Withdrawal>>, AppError> {
    if req.bank_name.trim().is_empty()
        || req.bank_account.trim().is_empty()
        || req.account_holder.trim().is_empty()
    {
        return Err(AppError::invalid_parameter("Bank details are required"));
    }

    let withdrawal = state
        .withdrawal
        .request(
            req.distributor_id,
            req.amount,
            req.bank_name.trim(),
            req.bank_account.trim(),
            req.account_holder.trim(),
        )
        .await?;
    success_response(withdrawal)
}

/// POST /api/withdrawals/:id/audit
async fn audit_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AuditWithdrawalRequest>,
) -> Result<Json<ApiResponse<Withdrawal>>, AppError> {
    let action: AuditAction = req
        .action
        .parse()
        .map_err(|_| AppError::invalid_parameter(format!("Invalid audit action: {}", req.action)))?;

    let withdrawal = state
        .withdrawal
        .audit(id, action, req.auditor_id, &req.remark)
        .await?;
    success_response(withdrawal)
}

/// POST /api/withdrawals/:id/cancel
async fn cancel_withdrawal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelWithdrawalRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let remark = if req.remark.is_empty() {
        "cancelled by distributor".to_string()
    } else {
        req.remark
    };
    state
        .withdrawal
        .cancel(id, req.distributor_id, &remark)
        .await?;
    success_response(())
}

/// GET /api/withdrawals?distributor_id=..
async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Withdrawal>>>, AppError> {
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let offset = query.offset.unwrap_or(0).max(0);
    let rows =
        withdrawals::list_by_distributor(&state.pool, query.distributor_id, limit, offset).await?;
    success_response(rows)
}

/// GET /api/withdrawals/:id/audits
///
/// 审核流水（只追加，按时间升序）
async fn list_audit_trail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<WithdrawalAudit>>>, AppError> {
    let trail = withdrawals::list_audits(&state.pool, id).await?;
    success_response(trail)
}
