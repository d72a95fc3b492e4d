//! 佣金仓储
//! 唯一约束 (order_id, distributor_id, level) 由数据库强制，抵御并发重复发放

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use crate::domain::CommissionDraft;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Commission {
    pub id: Uuid,
    pub order_id: i64,
    pub distributor_id: i64,
    pub level: i32,
    pub amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// 在事务内写入一个订单的全部佣金草稿
///
/// 任意一行触发唯一冲突即整体回滚，由调用方映射为 DuplicateGrant。
pub async fn insert_drafts(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: i64,
    drafts: &[CommissionDraft],
) -> Result<Vec<Uuid>, sqlx::Error> {
    let mut ids = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO commissions (order_id, distributor_id, level, amount, status, created_at)
            VALUES ($1, $2, $3, $4, 'pending', NOW())
            RETURNING id
            "#,
        )
        .bind(order_id)
        .bind(draft.distributor_id)
        .bind(draft.level)
        .bind(draft.amount)
        .fetch_one(&mut **tx)
        .await?;
        ids.push(id);
    }
    Ok(ids)
}

pub async fn get<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Commission>, sqlx::Error> {
    sqlx::query_as::<_, Commission>(
        r#"
        SELECT id, order_id, distributor_id, level, amount, status, created_at, settled_at
        FROM commissions
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await
}

/// 可结算佣金：pending 且所属订单已完成、完成时间早于退款窗口截止点
pub async fn find_settleable(
    pool: &PgPool,
    completed_before: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Commission>, sqlx::Error> {
    sqlx::query_as::<_, Commission>(
        r#"
        SELECT c.id, c.order_id, c.distributor_id, c.level, c.amount, c.status,
               c.created_at, c.settled_at
        FROM commissions c
        JOIN orders o ON o.id = c.order_id
        WHERE c.status = 'pending'
          AND o.status = 'completed'
          AND o.completed_at <= $1
        ORDER BY c.created_at ASC
        LIMIT $2
        "#,
    )
    .bind(completed_before)
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// pending -> settled 的守卫更新；0 行受影响表示已被并发结算或不可结算
pub async fn mark_settled<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE commissions
        SET status = 'settled', settled_at = NOW()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// status 前置条件守卫的退款标记
pub async fn mark_refunded<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
    from_status: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE commissions SET status = 'refunded' WHERE id = $1 AND status = $2")
        .bind(id)
        .bind(from_status)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_by_order<'e>(
    exec: impl PgExecutor<'e>,
    order_id: i64,
) -> Result<Vec<Commission>, sqlx::Error> {
    sqlx::query_as::<_, Commission>(
        r#"
        SELECT id, order_id, distributor_id, level, amount, status, created_at, settled_at
        FROM commissions
        WHERE order_id = $1
        ORDER BY level ASC
        "#,
    )
    .bind(order_id)
    .fetch_all(exec)
    .await
}

pub async fn list_by_distributor(
    pool: &PgPool,
    distributor_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Commission>, sqlx::Error> {
    sqlx::query_as::<_, Commission>(
        r#"
        SELECT id, order_id, distributor_id, level, amount, status, created_at, settled_at
        FROM commissions
        WHERE distributor_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(distributor_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// 佣金汇总（总额/已结算/待结算）
#[derive(Debug, Serialize, FromRow)]
pub struct CommissionSummary {
    pub total_amount: Decimal,
    pub settled_amount: Decimal,
    pub pending_amount: Decimal,
}

pub async fn summary_by_distributor(
    pool: &PgPool,
    distributor_id: i64,
) -> Result<CommissionSummary, sqlx::Error> {
    sqlx::query_as::<_, CommissionSummary>(
        r#"
        SELECT
            COALESCE(SUM(amount) FILTER (WHERE status != 'refunded'), 0) AS total_amount,
            COALESCE(SUM(amount) FILTER (WHERE status = 'settled'), 0) AS settled_amount,
            COALESCE(SUM(amount) FILTER (WHERE status = 'pending'), 0) AS pending_amount
        FROM commissions
        WHERE distributor_id = $1
        "#,
    )
    .bind(distributor_id)
    .fetch_one(pool)
    .await
}
