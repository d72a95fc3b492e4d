// 佣金结算后台任务
// 轮询可结算佣金（订单完成满退款窗口），逐条独立事务结算，
// 单条失败记日志跳过，下一轮自动重试（至少一次 + 结算幂等）

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::time::interval;

use crate::{
    config::DistributionConfig,
    repository::commissions,
    service::{
        commission_ledger::CommissionLedger,
        notification_service::{DomainEvent, Notifier},
        stats_service::StatsService,
    },
};

pub struct SettlementJob {
    pool: PgPool,
    config: DistributionConfig,
    ledger: Arc<CommissionLedger>,
    stats: Arc<StatsService>,
    notifier: Arc<dyn Notifier>,
}

impl SettlementJob {
    pub fn new(
        pool: PgPool,
        config: DistributionConfig,
        ledger: Arc<CommissionLedger>,
        stats: Arc<StatsService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            pool,
            config,
            ledger,
            stats,
            notifier,
        }
    }

    /// 启动后台结算任务（持续运行）
    pub async fn start(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.config.settlement_interval_secs));

        tracing::info!(
            interval_secs = self.config.settlement_interval_secs,
            delay_days = self.config.settlement_delay_days,
            "Settlement job started"
        );

        loop {
            ticker.tick().await;

            match self.process_due(Utc::now()).await {
                Ok(settled) => {
                    if settled > 0 {
                        tracing::info!(count = settled, "Settled pending commissions");
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Settlement pass failed");
                }
            }
        }
    }

    /// 处理一轮到期佣金；`now` 外提以便测试确定性
    pub async fn process_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - chrono::Duration::days(self.config.settlement_delay_days);
        let due = commissions::find_settleable(
            &self.pool,
            cutoff,
            self.config.settlement_batch_size,
        )
        .await?;

        if due.is_empty() {
            return Ok(0);
        }

        tracing::debug!(count = due.len(), cutoff = %cutoff, "Found settleable commissions");

        let mut settled_count = 0;
        for record in due {
            match self.ledger.settle(record.id).await {
                Ok(Some((distributor_id, amount))) => {
                    settled_count += 1;

                    // 统计重算走异步旁路，不参与结算事务（最终一致）
                    let stats = self.stats.clone();
                    tokio::spawn(async move {
                        if let Err(e) = stats.recompute(distributor_id).await {
                            tracing::warn!(
                                distributor_id,
                                error = ?e,
                                "Post-settlement stats recompute failed"
                            );
                        }
                    });

                    self.notifier
                        .notify(DomainEvent::CommissionSettled {
                            commission_id: record.id,
                            distributor_id,
                            amount,
                        })
                        .await;
                }
                Ok(None) => {
                    // 已被并发结算或已退款，无事可做
                }
                Err(e) => {
                    tracing::warn!(
                        commission_id = %record.id,
                        error = ?e,
                        "Failed to settle commission, will retry next pass"
                    );
                }
            }
        }

        Ok(settled_count)
    }
}
