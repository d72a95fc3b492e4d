//! 分销核心流程集成测试
//!
//! 测试覆盖：
//! - 佣金发放 / 重复发放防护
//! - 结算幂等与余额入账
//! - 提现冻结/拒绝返还
//! - 退款回冲
//!
//! 运行方式（需要可用的 Postgres 并已跑迁移）：
//! ```bash
//! TEST_DATABASE_URL=postgres://... cargo test --test distribution_flow_test -- --ignored
//! ```

use std::sync::Arc;

use chrono::Utc;
use fenxiao::{
    config::DistributionConfig,
    repository::{commissions, distributors, withdrawals},
    service::{
        CommissionLedger, NoopNotifier, OrderCompletedEvent, SettlementJob, StatsService,
        WithdrawalService,
    },
};
use rust_decimal::Decimal;
use sqlx::PgPool;

// ============ 测试辅助函数 ============

async fn test_pool() -> PgPool {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost:5432/fenxiao_test".into());

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to create test database pool");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// 随机起始 id，避免测试间互相踩数据
fn unique_base() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as i64
        % 1_000_000_000
        * 100
}

/// 搭一条 买家 -> 二级分销商 -> 三级分销商 的链
async fn setup_chain(pool: &PgPool, base: i64) -> (i64, i64, i64) {
    let senior = base + 3;
    let direct = base + 2;
    let buyer = base + 1;
    distributors::create(pool, senior, None, 3).await.unwrap();
    distributors::create(pool, direct, Some(senior), 2)
        .await
        .unwrap();
    distributors::create(pool, buyer, Some(direct), 1)
        .await
        .unwrap();
    (buyer, direct, senior)
}

async fn balance_of(pool: &PgPool, id: i64) -> Decimal {
    distributors::get(pool, id).await.unwrap().unwrap().balance
}

// ============ 佣金发放 ============

#[tokio::test]
#[ignore] // 需要真实数据库
async fn test_grant_two_levels_and_duplicate_rejected() {
    let pool = test_pool().await;
    let ledger = CommissionLedger::new(pool.clone());
    let base = unique_base();
    let (buyer, direct, senior) = setup_chain(&pool, base).await;

    let event = OrderCompletedEvent {
        order_id: base + 10,
        buyer_id: buyer,
        amount: dec("1000"),
        completed_at: Utc::now(),
    };
    let ids = ledger.grant(&event).await.unwrap();
    assert_eq!(ids.len(), 2);

    let records = commissions::list_by_order(&pool, base + 10).await.unwrap();
    assert_eq!(records[0].distributor_id, direct);
    assert_eq!(records[0].level, 1);
    assert_eq!(records[0].amount, dec("100.00"));
    assert_eq!(records[0].status, "pending");
    assert_eq!(records[1].distributor_id, senior);
    assert_eq!(records[1].level, 2);
    assert_eq!(records[1].amount, dec("50.00"));

    // 同一订单重放必须失败，且不产生新记录
    let err = ledger.grant(&event).await.unwrap_err();
    assert_eq!(err.code, fenxiao::AppErrorCode::DuplicateGrant);
    let records = commissions::list_by_order(&pool, base + 10).await.unwrap();
    assert_eq!(records.len(), 2);
}

// ============ 结算 ============

#[tokio::test]
#[ignore]
async fn test_settle_is_idempotent() {
    let pool = test_pool().await;
    let ledger = CommissionLedger::new(pool.clone());
    let base = unique_base();
    let (buyer, direct, _senior) = setup_chain(&pool, base).await;

    let event = OrderCompletedEvent {
        order_id: base + 10,
        buyer_id: buyer,
        amount: dec("500"),
        completed_at: Utc::now(),
    };
    let ids = ledger.grant(&event).await.unwrap();

    let first = ledger.settle(ids[0]).await.unwrap();
    assert!(first.is_some());
    assert_eq!(balance_of(&pool, direct).await, dec("50.00"));

    // 二次结算是空操作：余额只入账一次
    let second = ledger.settle(ids[0]).await.unwrap();
    assert!(second.is_none());
    assert_eq!(balance_of(&pool, direct).await, dec("50.00"));
}

// ============ 退款回冲 ============

#[tokio::test]
#[ignore]
async fn test_refund_reverses_settled_commission() {
    let pool = test_pool().await;
    let ledger = CommissionLedger::new(pool.clone());
    let base = unique_base();
    let (buyer, direct, senior) = setup_chain(&pool, base).await;

    let event = OrderCompletedEvent {
        order_id: base + 10,
        buyer_id: buyer,
        amount: dec("1000"),
        completed_at: Utc::now(),
    };
    let ids = ledger.grant(&event).await.unwrap();

    // 只结算 level1，level2 留在 pending
    ledger.settle(ids[0]).await.unwrap();
    assert_eq!(balance_of(&pool, direct).await, dec("100.00"));

    let reversed = ledger.refund(base + 10).await.unwrap();
    assert_eq!(reversed, 2);
    // 已结算的回冲，pending 的直接作废
    assert_eq!(balance_of(&pool, direct).await, dec("0.00"));
    assert_eq!(balance_of(&pool, senior).await, dec("0.00"));

    let records = commissions::list_by_order(&pool, base + 10).await.unwrap();
    assert!(records.iter().all(|r| r.status == "refunded"));

    // 重复退款是幂等空操作
    let reversed = ledger.refund(base + 10).await.unwrap();
    assert_eq!(reversed, 0);
    assert_eq!(balance_of(&pool, direct).await, dec("0.00"));
}

// ============ 提现 ============

fn test_dist_config() -> DistributionConfig {
    DistributionConfig::default()
}

#[tokio::test]
#[ignore]
async fn test_withdrawal_escrow_and_reject_restores() {
    let pool = test_pool().await;
    let base = unique_base();
    let distributor = base + 1;
    distributors::create(&pool, distributor, None, 2)
        .await
        .unwrap();
    distributors::credit_balance(&pool, distributor, dec("200"))
        .await
        .unwrap();

    let service = WithdrawalService::new(pool.clone(), test_dist_config(), Arc::new(NoopNotifier));

    // 余额 200 提 150：冻结后剩 50
    let withdrawal = service
        .request(distributor, dec("150"), "中国银行", "6222000011112222", "张三")
        .await
        .unwrap();
    assert_eq!(withdrawal.status, "pending");
    assert_eq!(balance_of(&pool, distributor).await, dec("50.00"));

    // 拒绝：全额返还
    let audited = service
        .audit(
            withdrawal.id,
            fenxiao::domain::AuditAction::Reject,
            base + 99,
            "信息不全",
        )
        .await
        .unwrap();
    assert_eq!(audited.status, "rejected");
    assert_eq!(balance_of(&pool, distributor).await, dec("200.00"));
}

#[tokio::test]
#[ignore]
async fn test_withdrawal_validation_errors() {
    let pool = test_pool().await;
    let base = unique_base();
    let distributor = base + 1;
    distributors::create(&pool, distributor, None, 2)
        .await
        .unwrap();
    distributors::credit_balance(&pool, distributor, dec("120"))
        .await
        .unwrap();

    let service = WithdrawalService::new(pool.clone(), test_dist_config(), Arc::new(NoopNotifier));

    // 低于下限
    let err = service
        .request(distributor, dec("50"), "b", "a", "h")
        .await
        .unwrap_err();
    assert_eq!(err.code, fenxiao::AppErrorCode::BelowMinimum);

    // 超过余额
    let err = service
        .request(distributor, dec("500"), "b", "a", "h")
        .await
        .unwrap_err();
    assert_eq!(err.code, fenxiao::AppErrorCode::InsufficientBalance);

    // 两次失败都不应动余额
    assert_eq!(balance_of(&pool, distributor).await, dec("120.00"));
}

#[tokio::test]
#[ignore]
async fn test_withdrawal_complete_requires_approved() {
    let pool = test_pool().await;
    let base = unique_base();
    let distributor = base + 1;
    distributors::create(&pool, distributor, None, 2)
        .await
        .unwrap();
    distributors::credit_balance(&pool, distributor, dec("300"))
        .await
        .unwrap();

    let service = WithdrawalService::new(pool.clone(), test_dist_config(), Arc::new(NoopNotifier));
    let withdrawal = service
        .request(distributor, dec("100"), "b", "a", "h")
        .await
        .unwrap();

    // pending 直接 complete 是非法转移
    let err = service
        .audit(
            withdrawal.id,
            fenxiao::domain::AuditAction::Complete,
            base + 99,
            "",
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, fenxiao::AppErrorCode::InvalidTransition);

    // approve -> complete 正常通过，余额不返还
    service
        .audit(
            withdrawal.id,
            fenxiao::domain::AuditAction::Approve,
            base + 99,
            "ok",
        )
        .await
        .unwrap();
    let done = service
        .audit(
            withdrawal.id,
            fenxiao::domain::AuditAction::Complete,
            base + 99,
            "paid",
        )
        .await
        .unwrap();
    assert_eq!(done.status, "completed");
    assert_eq!(balance_of(&pool, distributor).await, dec("200.00"));

    // 每次审核调用都留痕：refused + approve + complete
    let trail = fenxiao::repository::withdrawals::list_audits(&pool, withdrawal.id)
        .await
        .unwrap();
    assert_eq!(trail.len(), 3);
    assert!(trail[0].remark.starts_with("refused"));
}

// ============ 结算延迟窗口 ============

#[tokio::test]
#[ignore]
async fn test_settlement_respects_delay_window() {
    let pool = test_pool().await;
    let ledger = Arc::new(CommissionLedger::new(pool.clone()));
    let base = unique_base();
    let (buyer, direct, senior) = setup_chain(&pool, base).await;

    let now = Utc::now();
    // 订单 A 完成 8 天，已过 7 天退款窗口；订单 B 完成 6 天，未到期
    let old_order = base + 10;
    let fresh_order = base + 11;
    ledger
        .grant(&OrderCompletedEvent {
            order_id: old_order,
            buyer_id: buyer,
            amount: dec("1000"),
            completed_at: now - chrono::Duration::days(8),
        })
        .await
        .unwrap();
    ledger
        .grant(&OrderCompletedEvent {
            order_id: fresh_order,
            buyer_id: buyer,
            amount: dec("1000"),
            completed_at: now - chrono::Duration::days(6),
        })
        .await
        .unwrap();

    let config = test_dist_config();
    let stats = Arc::new(StatsService::new(pool.clone(), config.clone(), 3));
    let job = SettlementJob::new(
        pool.clone(),
        config,
        ledger.clone(),
        stats,
        Arc::new(NoopNotifier),
    );

    job.process_due(now).await.unwrap();

    // 到期订单全部结算并入账
    let records = commissions::list_by_order(&pool, old_order).await.unwrap();
    assert!(records.iter().all(|r| r.status == "settled"));
    assert_eq!(balance_of(&pool, direct).await, dec("100.00"));
    assert_eq!(balance_of(&pool, senior).await, dec("50.00"));

    // 未到期订单原样留在 pending
    let records = commissions::list_by_order(&pool, fresh_order).await.unwrap();
    assert!(records.iter().all(|r| r.status == "pending"));

    // 再跑一轮：到期单已结算不重复入账，未到期单仍然不动
    job.process_due(now).await.unwrap();
    assert_eq!(balance_of(&pool, direct).await, dec("100.00"));
    assert_eq!(balance_of(&pool, senior).await, dec("50.00"));
}

// ============ 提现过期清扫 ============

#[tokio::test]
#[ignore]
async fn test_expiry_sweep_cancels_and_restores_escrow() {
    let pool = test_pool().await;
    let base = unique_base();
    let distributor = base + 1;
    distributors::create(&pool, distributor, None, 2)
        .await
        .unwrap();
    distributors::credit_balance(&pool, distributor, dec("150"))
        .await
        .unwrap();

    let service = WithdrawalService::new(pool.clone(), test_dist_config(), Arc::new(NoopNotifier));
    let withdrawal = service
        .request(distributor, dec("120"), "b", "a", "h")
        .await
        .unwrap();
    assert_eq!(balance_of(&pool, distributor).await, dec("30.00"));

    // 把建单时间拨回 31 天前，模拟超窗（expiry_days = 30）
    sqlx::query("UPDATE withdrawals SET created_at = NOW() - INTERVAL '31 days' WHERE id = $1")
        .bind(withdrawal.id)
        .execute(&pool)
        .await
        .unwrap();

    service.sweep_expired(Utc::now()).await.unwrap();

    let swept = withdrawals::get(&pool, withdrawal.id).await.unwrap().unwrap();
    assert_eq!(swept.status, "cancelled");
    assert_eq!(balance_of(&pool, distributor).await, dec("150.00"));

    let trail = withdrawals::list_audits(&pool, withdrawal.id).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert!(trail[0].remark.starts_with("auto-cancelled"));

    // 清扫幂等：已取消的单不会再动
    service.sweep_expired(Utc::now()).await.unwrap();
    assert_eq!(balance_of(&pool, distributor).await, dec("150.00"));
}

// ============ 层级环检测 ============

#[tokio::test]
#[ignore]
async fn test_set_parent_rejects_cycle() {
    let pool = test_pool().await;
    let base = unique_base();
    let (buyer, _direct, senior) = setup_chain(&pool, base).await;

    // senior 是 buyer 的祖先，把 senior 挂到 buyer 下面会成环
    let ok = distributors::set_parent(&pool, senior, buyer).await.unwrap();
    assert!(!ok);

    // 不相关节点可以正常绑定
    let outsider = base + 50;
    distributors::create(&pool, outsider, None, 1).await.unwrap();
    let ok = distributors::set_parent(&pool, outsider, senior)
        .await
        .unwrap();
    assert!(ok);
}
