//! 提现仓储
//! 提现单 + 只追加的审核流水

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Withdrawal {
    pub id: Uuid,
    pub distributor_id: i64,
    pub amount: Decimal,
    pub status: String,
    pub bank_name: String,
    pub bank_account: String,
    pub account_holder: String,
    pub handled_by: Option<i64>,
    pub handled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WithdrawalAudit {
    pub id: Uuid,
    pub withdrawal_id: Uuid,
    /// 操作者；系统自动操作时为空
    pub auditor_id: Option<i64>,
    pub action: String,
    pub remark: String,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    distributor_id: i64,
    amount: Decimal,
    bank_name: &str,
    bank_account: &str,
    account_holder: &str,
) -> Result<Withdrawal, sqlx::Error> {
    sqlx::query_as::<_, Withdrawal>(
        r#"
        INSERT INTO withdrawals
            (distributor_id, amount, status, bank_name, bank_account, account_holder, created_at)
        VALUES ($1, $2, 'pending', $3, $4, $5, NOW())
        RETURNING id, distributor_id, amount, status, bank_name, bank_account, account_holder,
                  handled_by, handled_at, created_at
        "#,
    )
    .bind(distributor_id)
    .bind(amount)
    .bind(bank_name)
    .bind(bank_account)
    .bind(account_holder)
    .fetch_one(&mut **tx)
    .await
}

pub async fn get<'e>(exec: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Withdrawal>, sqlx::Error> {
    sqlx::query_as::<_, Withdrawal>(
        r#"
        SELECT id, distributor_id, amount, status, bank_name, bank_account, account_holder,
               handled_by, handled_at, created_at
        FROM withdrawals
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(exec)
    .await
}

/// 状态前置条件守卫的转移，同时盖处理人/处理时间戳
pub async fn transition<'e>(
    exec: impl PgExecutor<'e>,
    id: Uuid,
    from_status: &str,
    to_status: &str,
    handled_by: Option<i64>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE withdrawals
        SET status = $3, handled_by = $4, handled_at = NOW()
        WHERE id = $1 AND status = $2
        "#,
    )
    .bind(id)
    .bind(from_status)
    .bind(to_status)
    .bind(handled_by)
    .execute(exec)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// 追加一条审核流水（只追加，不更新不删除）
pub async fn append_audit<'e>(
    exec: impl PgExecutor<'e>,
    withdrawal_id: Uuid,
    auditor_id: Option<i64>,
    action: &str,
    remark: &str,
) -> Result<Uuid, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        INSERT INTO withdrawal_audits (withdrawal_id, auditor_id, action, remark, created_at)
        VALUES ($1, $2, $3, $4, NOW())
        RETURNING id
        "#,
    )
    .bind(withdrawal_id)
    .bind(auditor_id)
    .bind(action)
    .bind(remark)
    .fetch_one(exec)
    .await
}

pub async fn list_audits(
    pool: &PgPool,
    withdrawal_id: Uuid,
) -> Result<Vec<WithdrawalAudit>, sqlx::Error> {
    sqlx::query_as::<_, WithdrawalAudit>(
        r#"
        SELECT id, withdrawal_id, auditor_id, action, remark, created_at
        FROM withdrawal_audits
        WHERE withdrawal_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(withdrawal_id)
    .fetch_all(pool)
    .await
}

pub async fn list_by_distributor(
    pool: &PgPool,
    distributor_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<Withdrawal>, sqlx::Error> {
    sqlx::query_as::<_, Withdrawal>(
        r#"
        SELECT id, distributor_id, amount, status, bank_name, bank_account, account_holder,
               handled_by, handled_at, created_at
        FROM withdrawals
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

/// 超过过期窗口仍未处理的待审核提现
pub async fn find_expired(
    pool: &PgPool,
    created_before: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<Withdrawal>, sqlx::Error> {
    sqlx::query_as::<_, Withdrawal>(
        r#"
        SELECT id, distributor_id, amount, status, bank_name, bank_account, account_holder,
               handled_by, handled_at, created_at
        FROM withdrawals
        WHERE status = 'pending' AND created_at <= $1
        ORDER BY created_at ASC
        LIMIT $2
        "#,
    )
    .bind(created_before)
    .bind(limit)
    .fetch_all(pool)
    .await
}
