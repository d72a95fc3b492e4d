//! 提现服务
//! 申请即冻结（余额先扣），审核/完成/拒绝走状态机；
//! 拒绝与取消解冻，过期清扫任务保证冻结余额不会被永久锁死

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio::time::interval;
use uuid::Uuid;

use crate::{
    config::DistributionConfig,
    domain::{AuditAction, WithdrawalStatus},
    error::AppError,
    repository::{distributors, withdrawals, Withdrawal},
    service::notification_service::{DomainEvent, Notifier},
};

pub struct WithdrawalService {
    pool: PgPool,
    config: DistributionConfig,
    notifier: Arc<dyn Notifier>,
}

impl WithdrawalService {
    pub fn new(pool: PgPool, config: DistributionConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pool,
            config,
            notifier,
        }
    }

    /// 发起提现申请：校验下限，冻结金额并建单（同一事务）
    pub async fn request(
        &self,
        distributor_id: i64,
        amount: Decimal,
        bank_name: &str,
        bank_account: &str,
        account_holder: &str,
    ) -> Result<Withdrawal, AppError> {
        if amount < self.config.withdrawal_min_amount {
            return Err(AppError::below_minimum(format!(
                "Withdrawal amount {} is below the minimum {}",
                amount, self.config.withdrawal_min_amount
            )));
        }

        let mut tx = self.pool.begin().await?;

        // 扣减即冻结；WHERE balance >= amount 兜底并发下的余额不足
        if !distributors::debit_balance(&mut *tx, distributor_id, amount).await? {
            return Err(AppError::insufficient_balance(format!(
                "Distributor {} has insufficient balance for withdrawal of {}",
                distributor_id, amount
            )));
        }

        let withdrawal = withdrawals::insert(
            &mut tx,
            distributor_id,
            amount,
            bank_name,
            bank_account,
            account_holder,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            distributor_id,
            amount = %amount,
            "Withdrawal requested, amount escrowed"
        );
        Ok(withdrawal)
    }

    /// 审核提现：approve / reject / complete
    ///
    /// 每次调用都追加一条审核流水，包括被拒绝的非法转移；
    /// 状态变更与解冻在同一事务内，要么全部生效要么全部回滚。
    pub async fn audit(
        &self,
        withdrawal_id: Uuid,
        action: AuditAction,
        auditor_id: i64,
        remark: &str,
    ) -> Result<Withdrawal, AppError> {
        if action == AuditAction::Cancel {
            return Err(AppError::invalid_parameter(
                "Use the cancel endpoint for cancellation",
            ));
        }

        let withdrawal = withdrawals::get(&self.pool, withdrawal_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Withdrawal {} not found", withdrawal_id))
            })?;

        let required = action.required_status();
        let target = action.target_status();

        let mut tx = self.pool.begin().await?;

        let moved = withdrawals::transition(
            &mut *tx,
            withdrawal_id,
            required.as_str(),
            target.as_str(),
            Some(auditor_id),
        )
        .await?;

        if !moved {
            tx.rollback().await?;
            // 非法转移同样留痕
            withdrawals::append_audit(
                &self.pool,
                withdrawal_id,
                Some(auditor_id),
                action.as_str(),
                &format!(
                    "refused: status is '{}', action requires '{}'",
                    withdrawal.status,
                    required.as_str()
                ),
            )
            .await?;
            return Err(AppError::invalid_transition(format!(
                "Cannot {} withdrawal in status '{}'",
                action.as_str(),
                withdrawal.status
            )));
        }

        if action.restores_escrow() {
            distributors::credit_balance(&mut *tx, withdrawal.distributor_id, withdrawal.amount)
                .await?;
        }

        withdrawals::append_audit(
            &mut *tx,
            withdrawal_id,
            Some(auditor_id),
            action.as_str(),
            remark,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            withdrawal_id = %withdrawal_id,
            action = action.as_str(),
            auditor_id,
            "Withdrawal audited"
        );

        self.notifier
            .notify(DomainEvent::WithdrawalStatusChanged {
                withdrawal_id,
                distributor_id: withdrawal.distributor_id,
                status: target.as_str().to_string(),
            })
            .await;

        let updated = withdrawals::get(&self.pool, withdrawal_id)
            .await?
            .ok_or_else(|| AppError::internal("Withdrawal vanished after audit"))?;
        Ok(updated)
    }

    /// 自助取消：仅待审核可取消，解冻金额并留痕
    pub async fn cancel(
        &self,
        withdrawal_id: Uuid,
        distributor_id: i64,
        remark: &str,
    ) -> Result<(), AppError> {
        let withdrawal = withdrawals::get(&self.pool, withdrawal_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Withdrawal {} not found", withdrawal_id))
            })?;
        if withdrawal.distributor_id != distributor_id {
            return Err(AppError::invalid_parameter(
                "Withdrawal belongs to another distributor",
            ));
        }

        self.cancel_internal(&withdrawal, None, remark).await?;

        self.notifier
            .notify(DomainEvent::WithdrawalStatusChanged {
                withdrawal_id,
                distributor_id,
                status: WithdrawalStatus::Cancelled.as_str().to_string(),
            })
            .await;
        Ok(())
    }

    async fn cancel_internal(
        &self,
        withdrawal: &Withdrawal,
        auditor_id: Option<i64>,
        remark: &str,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let moved = withdrawals::transition(
            &mut *tx,
            withdrawal.id,
            WithdrawalStatus::Pending.as_str(),
            WithdrawalStatus::Cancelled.as_str(),
            auditor_id,
        )
        .await?;
        if !moved {
            return Err(AppError::invalid_transition(format!(
                "Cannot cancel withdrawal in status '{}'",
                withdrawal.status
            )));
        }

        distributors::credit_balance(&mut *tx, withdrawal.distributor_id, withdrawal.amount)
            .await?;
        withdrawals::append_audit(
            &mut *tx,
            withdrawal.id,
            auditor_id,
            AuditAction::Cancel.as_str(),
            remark,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            distributor_id = withdrawal.distributor_id,
            amount = %withdrawal.amount,
            "Withdrawal cancelled, escrow restored"
        );
        Ok(())
    }

    /// 清扫过期申请：超窗的 pending 单逐条取消并解冻
    ///
    /// 每条独立事务，单条失败不阻塞批次；幂等（守卫转移保证）。
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - chrono::Duration::days(self.config.withdrawal_expiry_days);
        let expired = withdrawals::find_expired(&self.pool, cutoff, 200).await?;

        let mut cancelled = 0;
        for withdrawal in expired {
            let remark = format!(
                "auto-cancelled: pending for more than {} days",
                self.config.withdrawal_expiry_days
            );
            match self.cancel_internal(&withdrawal, None, &remark).await {
                Ok(()) => cancelled += 1,
                Err(e) => {
                    tracing::warn!(
                        withdrawal_id = %withdrawal.id,
                        error = ?e,
                        "Failed to cancel expired withdrawal"
                    );
                }
            }
        }

        Ok(cancelled)
    }

    /// 启动过期清扫后台任务（持续运行）
    pub async fn start_expiry_sweep(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(
            self.config.withdrawal_sweep_interval_secs,
        ));

        tracing::info!(
            interval_secs = self.config.withdrawal_sweep_interval_secs,
            expiry_days = self.config.withdrawal_expiry_days,
            "Withdrawal expiry sweep started"
        );

        loop {
            ticker.tick().await;

            match self.sweep_expired(Utc::now()).await {
                Ok(cancelled) => {
                    if cancelled > 0 {
                        tracing::info!(count = cancelled, "Cancelled expired withdrawals");
                    }
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Withdrawal expiry sweep failed");
                }
            }
        }
    }
}
