//! 分销商升级评估服务
//! 对照下一级升级规则检查累计指标；一次评估最多晋升一级，等级只升不降

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use tokio::time::interval;

use crate::{
    config::DistributionConfig,
    repository::{distributors, reports},
    service::{
        notification_service::{DomainEvent, Notifier},
        stats_service::StatsService,
    },
};

/// 最高分销商等级（1=普通用户 2=分销商 3=高级分销商）
pub const MAX_TIER: i32 = 3;

pub struct UpgradeService {
    pool: PgPool,
    config: DistributionConfig,
    stats: Arc<StatsService>,
    notifier: Arc<dyn Notifier>,
}

impl UpgradeService {
    pub fn new(
        pool: PgPool,
        config: DistributionConfig,
        stats: Arc<StatsService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pool,
            config,
            stats,
            notifier,
        }
    }

    /// 评估一个分销商，满足全部门槛则晋升一级
    ///
    /// 返回是否发生了晋升。即使同时满足更高等级的门槛也只走一步。
    pub async fn evaluate(&self, distributor_id: i64) -> Result<bool> {
        let distributor = match distributors::get(&self.pool, distributor_id).await? {
            Some(d) => d,
            None => return Ok(false),
        };
        if distributor.tier >= MAX_TIER {
            return Ok(false);
        }

        let rule = match reports::active_upgrade_rule(&self.pool, distributor.tier + 1).await? {
            Some(rule) => rule,
            None => return Ok(false),
        };

        let stats = match self.stats.get(distributor_id).await? {
            Some(stats) => stats,
            // 尚无统计缓存则先重算一次
            None => self.stats.recompute(distributor_id).await?,
        };

        let direct_members = distributors::direct_member_count(&self.pool, distributor_id).await?;
        let duration_days = (Utc::now() - distributor.joined_at).num_days();

        let qualified = stats.total_sales >= rule.min_sales
            && stats.team_size >= rule.min_team_size
            && direct_members >= rule.min_direct_members
            && duration_days >= rule.min_duration_days;
        if !qualified {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        // 守卫更新：等级已被并发修改则放弃本次晋升
        let promoted = distributors::set_tier(
            &mut *tx,
            distributor_id,
            distributor.tier,
            rule.target_tier,
        )
        .await?;
        if !promoted {
            tx.rollback().await?;
            return Ok(false);
        }

        reports::insert_upgrade_record(
            &mut *tx,
            distributor_id,
            distributor.tier,
            rule.target_tier,
            stats.total_sales,
            stats.team_size,
            direct_members,
            duration_days,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            distributor_id,
            from_tier = distributor.tier,
            to_tier = rule.target_tier,
            "Distributor promoted"
        );

        self.notifier
            .notify(DomainEvent::UpgradeAchieved {
                distributor_id,
                from_tier: distributor.tier,
                to_tier: rule.target_tier,
            })
            .await;

        Ok(true)
    }

    /// 清扫全部未达顶级的用户
    pub async fn sweep(&self) -> Result<usize> {
        let candidates: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM distributors WHERE tier >= 1 AND tier < $1 ORDER BY id",
        )
        .bind(MAX_TIER)
        .fetch_all(&self.pool)
        .await?;

        let mut promoted = 0;
        for id in candidates {
            match self.evaluate(id).await {
                Ok(true) => promoted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(distributor_id = id, error = ?e, "Upgrade evaluation failed");
                }
            }
        }
        Ok(promoted)
    }

    /// 启动升级清扫后台任务（持续运行）
    pub async fn start(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.config.upgrade_interval_secs));

        tracing::info!(
            interval_secs = self.config.upgrade_interval_secs,
            "Upgrade sweep started"
        );

        loop {
            ticker.tick().await;

            match self.sweep().await {
                Ok(promoted) => {
                    if promoted > 0 {
                        tracing::info!(count = promoted, "Distributors promoted");
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Upgrade sweep failed");
                }
            }
        }
    }
}
