//! 分销商统计服务
//! 整表重算覆盖缓存行（不做增量），离线旁路运行，接受最终一致

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tokio::time::interval;

use crate::{config::DistributionConfig, repository::distributors};

/// 统计缓存行，由本服务独占写入
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DistributorStats {
    pub distributor_id: i64,
    pub total_sales: Decimal,
    pub total_commission: Decimal,
    pub team_size: i64,
    pub order_count: i64,
    pub last_order_time: Option<DateTime<Utc>>,
}

pub struct StatsService {
    pool: PgPool,
    config: DistributionConfig,
    /// 团队人数的追溯深度，与佣金层级上限保持一致
    team_depth: i32,
}

impl StatsService {
    pub fn new(pool: PgPool, config: DistributionConfig, team_depth: i32) -> Self {
        Self {
            pool,
            config,
            team_depth,
        }
    }

    /// 重算并整行覆盖一个分销商的统计
    pub async fn recompute(&self, distributor_id: i64) -> Result<DistributorStats> {
        // 本人名下已完成订单的销售额/单数/最近下单时间
        let (total_sales, order_count, last_order_time): (Decimal, i64, Option<DateTime<Utc>>) =
            sqlx::query_as(
                r#"
                SELECT COALESCE(SUM(amount), 0), COUNT(*), MAX(completed_at)
                FROM orders
                WHERE distributor_id = $1 AND status = 'completed'
                "#,
            )
            .bind(distributor_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to aggregate order stats")?;

        // 已结算佣金总额
        let total_commission: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM commissions
            WHERE distributor_id = $1 AND status = 'settled'
            "#,
        )
        .bind(distributor_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to aggregate settled commission")?;

        let team_size = distributors::team_size(&self.pool, distributor_id, self.team_depth)
            .await
            .context("Failed to count team members")?;

        sqlx::query(
            r#"
            INSERT INTO distributor_stats
                (distributor_id, total_sales, total_commission, team_size,
                 order_count, last_order_time, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            ON CONFLICT (distributor_id) DO UPDATE SET
                total_sales = EXCLUDED.total_sales,
                total_commission = EXCLUDED.total_commission,
                team_size = EXCLUDED.team_size,
                order_count = EXCLUDED.order_count,
                last_order_time = EXCLUDED.last_order_time,
                updated_at = NOW()
            "#,
        )
        .bind(distributor_id)
        .bind(total_sales)
        .bind(total_commission)
        .bind(team_size)
        .bind(order_count)
        .bind(last_order_time)
        .execute(&self.pool)
        .await
        .context("Failed to upsert distributor stats")?;

        Ok(DistributorStats {
            distributor_id,
            total_sales,
            total_commission,
            team_size,
            order_count,
            last_order_time,
        })
    }

    pub async fn get(&self, distributor_id: i64) -> Result<Option<DistributorStats>> {
        let stats = sqlx::query_as::<_, DistributorStats>(
            r#"
            SELECT distributor_id, total_sales, total_commission, team_size,
                   order_count, last_order_time
            FROM distributor_stats
            WHERE distributor_id = $1
            "#,
        )
        .bind(distributor_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stats)
    }

    /// 全量重算（后台定时兜底，修正旁路重算的遗漏）
    pub async fn resync_all(&self) -> Result<usize> {
        let ids = distributors::distributor_ids(&self.pool, 2).await?;
        let mut updated = 0;
        for id in &ids {
            match self.recompute(*id).await {
                Ok(_) => updated += 1,
                Err(e) => {
                    tracing::warn!(distributor_id = id, error = ?e, "Stats recompute failed");
                }
            }
        }
        Ok(updated)
    }

    /// 启动统计重算后台任务（持续运行）
    pub async fn start_resync(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.config.stats_resync_interval_secs));

        tracing::info!(
            interval_secs = self.config.stats_resync_interval_secs,
            "Stats resync job started"
        );

        loop {
            ticker.tick().await;

            match self.resync_all().await {
                Ok(updated) => {
                    tracing::debug!(count = updated, "Distributor stats resynced");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Stats resync pass failed");
                }
            }
        }
    }
}
