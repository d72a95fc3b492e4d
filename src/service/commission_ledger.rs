//! 佣金账本服务
//! 发放（grant）、结算（settle）、退款（refund）——所有资金动作都在单事务内完成

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    domain::{CommissionRule, CommissionStatus, RuleSet},
    error::AppError,
    repository::{commissions, distributors, orders},
    service::commission_engine::compute_commissions,
};

/// 外部交易系统投递的订单完成事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order_id: i64,
    pub buyer_id: i64,
    /// 可计佣金额
    pub amount: Decimal,
    pub completed_at: DateTime<Utc>,
}

pub struct CommissionLedger {
    pool: PgPool,
}

impl CommissionLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 加载当前启用的分销规则集
    pub async fn load_rules(&self) -> Result<RuleSet> {
        let rules = sqlx::query_as::<_, CommissionRule>(
            r#"
            SELECT level, rate, min_tier, is_active
            FROM commission_rules
            WHERE is_active = TRUE
            ORDER BY level ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load commission rules")?;

        RuleSet::new(rules)
    }

    /// 订单完成：计算并原子落库该订单的全部佣金记录
    ///
    /// 同一订单重放由订单投影的主键冲突与佣金表的
    /// (order_id, distributor_id, level) 唯一约束兜底，返回 DuplicateGrant。
    pub async fn grant(&self, event: &OrderCompletedEvent) -> Result<Vec<Uuid>, AppError> {
        let rules = self.load_rules().await?;
        let upline =
            distributors::upline_chain(&self.pool, event.buyer_id, rules.max_levels()).await?;
        let drafts = compute_commissions(event.amount, &upline, &rules);

        let mut tx = self.pool.begin().await?;

        let direct_referrer = upline.first().map(|n| n.user_id);
        let inserted = orders::insert_completed(
            &mut tx,
            event.order_id,
            event.buyer_id,
            direct_referrer,
            event.amount,
            event.completed_at,
        )
        .await?;
        if !inserted {
            return Err(AppError::duplicate_grant(format!(
                "Order {} already processed",
                event.order_id
            )));
        }

        let ids = commissions::insert_drafts(&mut tx, event.order_id, &drafts)
            .await
            .map_err(|err| {
                if AppError::is_unique_violation(&err) {
                    AppError::duplicate_grant(format!(
                        "Commission already granted for order {}",
                        event.order_id
                    ))
                } else {
                    AppError::from(err)
                }
            })?;

        tx.commit().await?;

        tracing::info!(
            order_id = event.order_id,
            buyer_id = event.buyer_id,
            count = ids.len(),
            "Commissions granted"
        );
        Ok(ids)
    }

    /// 结算一条佣金：pending -> settled 并入账，同一事务
    ///
    /// 幂等：已被并发结算或已退款的记录返回 None，不产生第二次入账。
    pub async fn settle(&self, id: Uuid) -> Result<Option<(i64, Decimal)>, AppError> {
        let mut tx = self.pool.begin().await?;

        let record = commissions::get(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Commission {} not found", id)))?;

        if !commissions::mark_settled(&mut *tx, id).await? {
            // 并发 scheduler 已经赢了这条记录
            tx.rollback().await?;
            return Ok(None);
        }

        if !distributors::credit_balance(&mut *tx, record.distributor_id, record.amount).await? {
            return Err(AppError::distributor_not_found(format!(
                "Distributor {} missing during settlement",
                record.distributor_id
            )));
        }

        tx.commit().await?;

        tracing::info!(
            commission_id = %id,
            distributor_id = record.distributor_id,
            amount = %record.amount,
            "Commission settled"
        );
        Ok(Some((record.distributor_id, record.amount)))
    }

    /// 订单退款：撤销该订单的所有佣金
    ///
    /// pending 记录直接作废；settled 记录作废并回冲余额；
    /// refunded 记录跳过（重复退款为幂等空操作）。
    pub async fn refund(&self, order_id: i64) -> Result<usize, AppError> {
        let mut tx = self.pool.begin().await?;

        if orders::get(&mut *tx, order_id).await?.is_none() {
            return Err(AppError::order_not_found(format!(
                "Order {} not found",
                order_id
            )));
        }
        orders::mark_refunded(&mut *tx, order_id).await?;

        let records = commissions::list_by_order(&mut *tx, order_id).await?;
        let mut reversed = 0;
        for record in records {
            let status: CommissionStatus = record.status.parse().map_err(AppError::from)?;
            match status {
                CommissionStatus::Pending | CommissionStatus::Failed => {
                    if commissions::mark_refunded(&mut *tx, record.id, record.status.as_str())
                        .await?
                    {
                        reversed += 1;
                    }
                }
                CommissionStatus::Settled => {
                    if commissions::mark_refunded(&mut *tx, record.id, "settled").await? {
                        // 已入账的佣金必须回冲，否则退款订单仍在派钱
                        distributors::reverse_balance(
                            &mut *tx,
                            record.distributor_id,
                            record.amount,
                        )
                        .await?;
                        reversed += 1;
                    }
                }
                CommissionStatus::Refunded => {}
            }
        }

        tx.commit().await?;

        tracing::info!(order_id, reversed, "Order commissions refunded");
        Ok(reversed)
    }
}
