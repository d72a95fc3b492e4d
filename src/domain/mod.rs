//! Domain 模块
//!
//! 包含核心业务逻辑和领域模型

pub mod commission;
pub mod hierarchy;
pub mod withdrawal;

// 重新导出常用类型
pub use commission::{round_money, CommissionDraft, CommissionRule, CommissionStatus, RuleSet};
pub use hierarchy::{would_create_cycle, UplineNode, MAX_CHAIN_WALK};
pub use withdrawal::{AuditAction, WithdrawalStatus};
