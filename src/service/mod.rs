//! Service 模块
//!
//! 业务服务与后台任务

pub mod commission_engine;
pub mod commission_ledger;
pub mod notification_service;
pub mod report_service;
pub mod settlement_job;
pub mod stats_service;
pub mod upgrade_service;
pub mod withdrawal_service;

// 重新导出常用类型
pub use commission_ledger::{CommissionLedger, OrderCompletedEvent};
pub use notification_service::{DomainEvent, NoopNotifier, Notifier, PgNotifier};
pub use report_service::ReportService;
pub use settlement_job::SettlementJob;
pub use stats_service::{DistributorStats, StatsService};
pub use upgrade_service::UpgradeService;
pub use withdrawal_service::WithdrawalService;
