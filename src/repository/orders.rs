//! 订单投影仓储
//! 订单由外部交易系统拥有；这里只保存佣金核心所需的投影（买家、归属分销商、金额、完成时间）

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub buyer_id: i64,
    /// 销售归属的直接推荐人（level 1 上级），无上级时为空
    pub distributor_id: Option<i64>,
    pub amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// 记录已完成订单的投影；重复投递同一订单时返回 false
pub async fn insert_completed(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: i64,
    buyer_id: i64,
    distributor_id: Option<i64>,
    amount: Decimal,
    completed_at: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO orders (id, buyer_id, distributor_id, amount, status, created_at, completed_at)
        VALUES ($1, $2, $3, $4, 'completed', NOW(), $5)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(id)
    .bind(buyer_id)
    .bind(distributor_id)
    .bind(amount)
    .bind(completed_at)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get<'e>(exec: impl PgExecutor<'e>, id: i64) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        r#"
        SELECT id, buyer_id, distributor_id, amount, status, created_at, completed_at
        FROM orders
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await
}

/// completed -> refunded 守卫更新
pub async fn mark_refunded<'e>(exec: impl PgExecutor<'e>, id: i64) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE orders SET status = 'refunded' WHERE id = $1 AND status = 'completed'")
            .bind(id)
            .execute(exec)
            .await?;
    Ok(result.rows_affected() > 0)
}
