use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    config::Config,
    service::{
        CommissionLedger, Notifier, PgNotifier, ReportService, StatsService, UpgradeService,
        WithdrawalService,
    },
};

/// 应用状态
/// 包含所有共享资源
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub notifier: Arc<dyn Notifier>,
    pub ledger: Arc<CommissionLedger>,
    pub withdrawal: Arc<WithdrawalService>,
    pub stats: Arc<StatsService>,
    pub reports: Arc<ReportService>,
    pub upgrades: Arc<UpgradeService>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(pool: PgPool, config: Arc<Config>) -> Self {
        let notifier: Arc<dyn Notifier> = Arc::new(PgNotifier::new(pool.clone()));
        let dist = config.distribution.clone();

        let ledger = Arc::new(CommissionLedger::new(pool.clone()));
        // 团队深度与佣金层级上限一致（默认 3 级分销）
        let stats = Arc::new(StatsService::new(pool.clone(), dist.clone(), 3));
        let withdrawal = Arc::new(WithdrawalService::new(
            pool.clone(),
            dist.clone(),
            notifier.clone(),
        ));
        let reports = Arc::new(ReportService::new(pool.clone(), dist.clone()));
        let upgrades = Arc::new(UpgradeService::new(
            pool.clone(),
            dist,
            stats.clone(),
            notifier.clone(),
        ));

        Self {
            pool,
            config,
            notifier,
            ledger,
            withdrawal,
            stats,
            reports,
            upgrades,
        }
    }
}
