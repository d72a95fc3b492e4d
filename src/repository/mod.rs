//! 仓储层
//! 每个实体一个模块；余额等资金变更只提供原子增减语句

pub mod commissions;
pub mod distributors;
pub mod orders;
pub mod reports;
pub mod withdrawals;

pub use commissions::{Commission, CommissionSummary};
pub use distributors::{Distributor, TeamMember};
pub use orders::Order;
pub use reports::{Report, UpgradeRule};
pub use withdrawals::{Withdrawal, WithdrawalAudit};
