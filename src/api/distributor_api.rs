//! 分销商API
//! 注册/绑定上级、统计、团队、佣金明细与汇总

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::response::{success_response, ApiResponse},
    app_state::AppState,
    error::AppError,
    repository::{commissions, distributors, Commission, CommissionSummary, Distributor, TeamMember},
    service::DistributorStats,
};

#[derive(Debug, Deserialize)]
pub struct RegisterDistributorRequest {
    pub user_id: i64,
    pub parent_id: Option<i64>,
    /// 初始等级，缺省为普通用户
    pub tier: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct BindParentRequest {
    pub parent_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub members: Vec<TeamMember>,
    pub team_size: i64,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(register_distributor))
        .route("/:id", get(get_distributor))
        .route("/:id/parent", put(bind_parent))
        .route("/:id/stats", get(get_stats))
        .route("/:id/team", get(get_team))
        .route("/:id/commissions", get(list_commissions))
        .route("/:id/commissions/summary", get(commission_summary))
}

/// POST /api/distributors
///
/// 登记分销节点（上级为可选；带上级时做环检测）
async fn register_distributor(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterDistributorRequest>,
) -> Result<Json<ApiResponse<Distributor>>, AppError> {
    let tier = req.tier.unwrap_or(1);
    if tier < 1 {
        return Err(AppError::invalid_parameter("tier must be >= 1"));
    }
    if let Some(parent_id) = req.parent_id {
        if parent_id == req.user_id {
            return Err(AppError::hierarchy_cycle("A user cannot be its own parent"));
        }
        if distributors::get(&state.pool, parent_id).await?.is_none() {
            return Err(AppError::distributor_not_found(format!(
                "Parent {} not found",
                parent_id
            )));
        }
    }

    let distributor = distributors::create(&state.pool, req.user_id, req.parent_id, tier)
        .await
        .map_err(|err| {
            if AppError::is_unique_violation(&err) {
                AppError::invalid_parameter(format!(
                    "Distributor {} is already registered",
                    req.user_id
                ))
            } else {
                err.into()
            }
        })?;
    success_response(distributor)
}

/// GET /api/distributors/:id
async fn get_distributor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Distributor>>, AppError> {
    let distributor = distributors::get(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::distributor_not_found(format!("Distributor {} not found", id)))?;
    success_response(distributor)
}

/// PUT /api/distributors/:id/parent
///
/// 绑定/改绑上级；会构成环的绑定被拒绝
async fn bind_parent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<BindParentRequest>,
) -> Result<Json<ApiResponse<Distributor>>, AppError> {
    if distributors::get(&state.pool, id).await?.is_none() {
        return Err(AppError::distributor_not_found(format!(
            "Distributor {} not found",
            id
        )));
    }
    if distributors::get(&state.pool, req.parent_id).await?.is_none() {
        return Err(AppError::distributor_not_found(format!(
            "Parent {} not found",
            req.parent_id
        )));
    }

    if !distributors::set_parent(&state.pool, id, req.parent_id).await? {
        return Err(AppError::hierarchy_cycle(format!(
            "Binding {} under {} would create a cycle",
            id, req.parent_id
        )));
    }

    let distributor = distributors::get(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::distributor_not_found(format!("Distributor {} not found", id)))?;
    success_response(distributor)
}

/// GET /api/distributors/:id/stats
///
/// 返回统计数据（即时重算，与原系统行为一致）
async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DistributorStats>>, AppError> {
    if distributors::get(&state.pool, id).await?.is_none() {
        return Err(AppError::distributor_not_found(format!(
            "Distributor {} not found",
            id
        )));
    }
    let stats = state.stats.recompute(id).await?;
    success_response(stats)
}

/// GET /api/distributors/:id/team
async fn get_team(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<TeamResponse>>, AppError> {
    let members = distributors::direct_members(&state.pool, id).await?;
    let team_size = distributors::team_size(&state.pool, id, 3).await?;
    success_response(TeamResponse { members, team_size })
}

/// GET /api/distributors/:id/commissions
async fn list_commissions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<Commission>>>, AppError> {
    let limit = page.limit.unwrap_or(20).clamp(1, 100);
    let offset = page.offset.unwrap_or(0).max(0);
    let records = commissions::list_by_distributor(&state.pool, id, limit, offset).await?;
    success_response(records)
}

/// GET /api/distributors/:id/commissions/summary
async fn commission_summary(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CommissionSummary>>, AppError> {
    let summary = commissions::summary_by_distributor(&state.pool, id).await?;
    success_response(summary)
}
