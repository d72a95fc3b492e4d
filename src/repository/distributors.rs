//! 分销商仓储
//! 层级（parent 自引用）、等级与余额；余额变更一律使用单语句原子增减

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};

use crate::domain::{would_create_cycle, UplineNode, MAX_CHAIN_WALK};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Distributor {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub tier: i32,
    pub balance: Decimal,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}

pub async fn get<'e>(exec: impl PgExecutor<'e>, id: i64) -> Result<Option<Distributor>, sqlx::Error> {
    sqlx::query_as::<_, Distributor>(
        r#"
        SELECT id, parent_id, tier, balance, joined_at
        FROM distributors
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await
}

pub async fn create(
    pool: &PgPool,
    id: i64,
    parent_id: Option<i64>,
    tier: i32,
) -> Result<Distributor, sqlx::Error> {
    sqlx::query_as::<_, Distributor>(
        r#"
        INSERT INTO distributors (id, parent_id, tier, balance, joined_at)
        VALUES ($1, $2, $3, 0, NOW())
        RETURNING id, parent_id, tier, balance, joined_at
        "#,
    )
    .bind(id)
    .bind(parent_id)
    .bind(tier)
    .fetch_one(pool)
    .await
}

/// 沿 parent_id 向上收集上级链，最多 `max_levels` 跳
///
/// 链中节点按距离买家的跳数升序排列（第 1 个即直接推荐人）。
/// 上级缺失（已注销或未绑定）时提前结束。
pub async fn upline_chain(
    pool: &PgPool,
    user_id: i64,
    max_levels: usize,
) -> Result<Vec<UplineNode>, sqlx::Error> {
    let mut chain = Vec::with_capacity(max_levels);
    let mut current = user_id;

    for _ in 0..max_levels.min(MAX_CHAIN_WALK) {
        let parent = sqlx::query_as::<_, (i64, i32)>(
            r#"
            SELECT p.id, p.tier
            FROM distributors c
            JOIN distributors p ON p.id = c.parent_id
            WHERE c.id = $1
            "#,
        )
        .bind(current)
        .fetch_optional(pool)
        .await?;

        match parent {
            Some((id, tier)) => {
                chain.push(UplineNode { user_id: id, tier });
                current = id;
            }
            None => break,
        }
    }

    Ok(chain)
}

/// 收集某用户全部上级的 id（硬上限 MAX_CHAIN_WALK，用于环检测）
async fn ancestor_ids(pool: &PgPool, user_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    let chain = upline_chain(pool, user_id, MAX_CHAIN_WALK).await?;
    Ok(chain.into_iter().map(|n| n.user_id).collect())
}

/// 绑定上级，写入前做环检测
///
/// 返回 false 表示会构成环（child == parent 或 parent 的上级链已含 child）。
pub async fn set_parent(pool: &PgPool, child: i64, parent: i64) -> Result<bool, sqlx::Error> {
    let ancestors = ancestor_ids(pool, parent).await?;
    if would_create_cycle(child, parent, &ancestors) {
        return Ok(false);
    }

    let result = sqlx::query("UPDATE distributors SET parent_id = $2 WHERE id = $1")
        .bind(child)
        .bind(parent)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// 余额入账（单语句原子自增）
pub async fn credit_balance<'e>(
    exec: impl PgExecutor<'e>,
    id: i64,
    amount: Decimal,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE distributors SET balance = balance + $2 WHERE id = $1")
        .bind(id)
        .bind(amount)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// 余额扣减，WHERE 中校验余额充足
///
/// 返回 false 表示余额不足或分销商不存在；永远不会扣成负数。
pub async fn debit_balance<'e>(
    exec: impl PgExecutor<'e>,
    id: i64,
    amount: Decimal,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE distributors SET balance = balance - $2 WHERE id = $1 AND balance >= $2",
    )
    .bind(id)
    .bind(amount)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// 余额回冲（已结算佣金退款时的反向扣减，不做余额充足校验）
pub async fn reverse_balance<'e>(
    exec: impl PgExecutor<'e>,
    id: i64,
    amount: Decimal,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE distributors SET balance = balance - $2 WHERE id = $1")
        .bind(id)
        .bind(amount)
        .execute(exec)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// 升级：仅当当前等级与期望一致时生效，保证等级只升不降且一次一级
pub async fn set_tier<'e>(
    exec: impl PgExecutor<'e>,
    id: i64,
    from_tier: i32,
    to_tier: i32,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE distributors SET tier = $3 WHERE id = $1 AND tier = $2 AND $3 > $2")
            .bind(id)
            .bind(from_tier)
            .bind(to_tier)
            .execute(exec)
            .await?;
    Ok(result.rows_affected() > 0)
}

/// 直推人数
pub async fn direct_member_count(pool: &PgPool, id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM distributors WHERE parent_id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

/// 团队人数：parent 链传递闭包，深度与佣金层级上限一致
pub async fn team_size(pool: &PgPool, id: i64, max_depth: i32) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        WITH RECURSIVE team AS (
            SELECT id, 1 AS depth FROM distributors WHERE parent_id = $1
            UNION ALL
            SELECT d.id, t.depth + 1
            FROM distributors d
            JOIN team t ON d.parent_id = t.id
            WHERE t.depth < $2
        )
        SELECT COUNT(*) FROM team
        "#,
    )
    .bind(id)
    .bind(max_depth)
    .fetch_one(pool)
    .await
}

/// 直推成员列表（含销售额，用于团队页）
#[derive(Debug, Serialize, FromRow)]
pub struct TeamMember {
    pub id: i64,
    pub tier: i32,
    pub joined_at: chrono::DateTime<chrono::Utc>,
    pub total_sales: Decimal,
}

pub async fn direct_members(pool: &PgPool, id: i64) -> Result<Vec<TeamMember>, sqlx::Error> {
    sqlx::query_as::<_, TeamMember>(
        r#"
        SELECT d.id, d.tier, d.joined_at,
               COALESCE(s.total_sales, 0) AS total_sales
        FROM distributors d
        LEFT JOIN distributor_stats s ON s.distributor_id = d.id
        WHERE d.parent_id = $1
        ORDER BY d.joined_at DESC
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await
}

/// 全量分销商 id（等级高于普通用户），供统计/升级清扫任务遍历
pub async fn distributor_ids(pool: &PgPool, min_tier: i32) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM distributors WHERE tier >= $1 ORDER BY id")
        .bind(min_tier)
        .fetch_all(pool)
        .await
}
