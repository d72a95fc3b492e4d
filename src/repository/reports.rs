//! 报表与升级规则仓储

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};

/// 周期报表快照，(period, date) 唯一
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub period: String, // daily / weekly / monthly
    pub date: NaiveDate,
    pub total_sales: Decimal,
    pub total_commission: Decimal,
    pub order_count: i64,
    pub distributor_count: i64,
    pub new_distributor_count: i64,
    pub active_distributor_count: i64,
    pub withdrawal_amount: Decimal,
}

/// 以 (period, date) 为键的幂等写入：重复生成直接覆盖
pub async fn upsert(pool: &PgPool, report: &Report) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO reports
            (period, date, total_sales, total_commission, order_count,
             distributor_count, new_distributor_count, active_distributor_count,
             withdrawal_amount, generated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
        ON CONFLICT (period, date) DO UPDATE SET
            total_sales = EXCLUDED.total_sales,
            total_commission = EXCLUDED.total_commission,
            order_count = EXCLUDED.order_count,
            distributor_count = EXCLUDED.distributor_count,
            new_distributor_count = EXCLUDED.new_distributor_count,
            active_distributor_count = EXCLUDED.active_distributor_count,
            withdrawal_amount = EXCLUDED.withdrawal_amount,
            generated_at = NOW()
        "#,
    )
    .bind(&report.period)
    .bind(report.date)
    .bind(report.total_sales)
    .bind(report.total_commission)
    .bind(report.order_count)
    .bind(report.distributor_count)
    .bind(report.new_distributor_count)
    .bind(report.active_distributor_count)
    .bind(report.withdrawal_amount)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(
    pool: &PgPool,
    period: &str,
    date: NaiveDate,
) -> Result<Option<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        r#"
        SELECT period, date, total_sales, total_commission, order_count,
               distributor_count, new_distributor_count, active_distributor_count,
               withdrawal_amount
        FROM reports
        WHERE period = $1 AND date = $2
        "#,
    )
    .bind(period)
    .bind(date)
    .fetch_optional(pool)
    .await
}

/// 区间内的日报（升序），供周报/月报二次汇总
pub async fn daily_in_range(
    pool: &PgPool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Report>, sqlx::Error> {
    sqlx::query_as::<_, Report>(
        r#"
        SELECT period, date, total_sales, total_commission, order_count,
               distributor_count, new_distributor_count, active_distributor_count,
               withdrawal_amount
        FROM reports
        WHERE period = 'daily' AND date >= $1 AND date <= $2
        ORDER BY date ASC
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await
}

/// 升级规则：目标等级唯一
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UpgradeRule {
    pub target_tier: i32,
    pub min_sales: Decimal,
    pub min_team_size: i64,
    pub min_direct_members: i64,
    pub min_duration_days: i64,
    pub is_active: bool,
}

pub async fn active_upgrade_rule(
    pool: &PgPool,
    target_tier: i32,
) -> Result<Option<UpgradeRule>, sqlx::Error> {
    sqlx::query_as::<_, UpgradeRule>(
        r#"
        SELECT target_tier, min_sales, min_team_size, min_direct_members,
               min_duration_days, is_active
        FROM upgrade_rules
        WHERE target_tier = $1 AND is_active = TRUE
        "#,
    )
    .bind(target_tier)
    .fetch_optional(pool)
    .await
}

/// 升级历史：不可变的晋升事实，记录晋升时点的各项指标
pub async fn insert_upgrade_record<'e>(
    exec: impl PgExecutor<'e>,
    distributor_id: i64,
    from_tier: i32,
    to_tier: i32,
    total_sales: Decimal,
    team_size: i64,
    direct_members: i64,
    duration_days: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO upgrade_records
            (distributor_id, from_tier, to_tier, total_sales, team_size,
             direct_members, duration_days, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        "#,
    )
    .bind(distributor_id)
    .bind(from_tier)
    .bind(to_tier)
    .bind(total_sales)
    .bind(team_size)
    .bind(direct_members)
    .bind(duration_days)
    .execute(exec)
    .await?;
    Ok(())
}
