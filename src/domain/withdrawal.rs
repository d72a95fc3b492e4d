//! 提现领域模型
//! 状态机：pending -> approved -> completed / pending -> rejected / pending -> cancelled

use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// 提现状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,   // 待审核（金额已冻结）
    Approved,  // 已通过（待打款）
    Rejected,  // 已拒绝（金额已返还）
    Completed, // 已完成
    Cancelled, // 已取消（过期或自助取消，金额已返还）
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Cancelled => "cancelled",
        }
    }

    /// 判断是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WithdrawalStatus::Rejected | WithdrawalStatus::Completed | WithdrawalStatus::Cancelled
        )
    }
}

impl FromStr for WithdrawalStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            "completed" => Ok(WithdrawalStatus::Completed),
            "cancelled" => Ok(WithdrawalStatus::Cancelled),
            _ => bail!("Invalid withdrawal status: {}", s),
        }
    }
}

/// 审核动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Approve,
    Reject,
    Complete,
    Cancel,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Approve => "approve",
            AuditAction::Reject => "reject",
            AuditAction::Complete => "complete",
            AuditAction::Cancel => "cancel",
        }
    }

    /// 执行该动作要求的当前状态
    pub fn required_status(&self) -> WithdrawalStatus {
        match self {
            AuditAction::Approve | AuditAction::Reject | AuditAction::Cancel => {
                WithdrawalStatus::Pending
            }
            AuditAction::Complete => WithdrawalStatus::Approved,
        }
    }

    /// 动作成功后进入的状态
    pub fn target_status(&self) -> WithdrawalStatus {
        match self {
            AuditAction::Approve => WithdrawalStatus::Approved,
            AuditAction::Reject => WithdrawalStatus::Rejected,
            AuditAction::Complete => WithdrawalStatus::Completed,
            AuditAction::Cancel => WithdrawalStatus::Cancelled,
        }
    }

    /// 动作是否返还冻结金额
    pub fn restores_escrow(&self) -> bool {
        matches!(self, AuditAction::Reject | AuditAction::Cancel)
    }
}

impl FromStr for AuditAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(AuditAction::Approve),
            "reject" => Ok(AuditAction::Reject),
            "complete" => Ok(AuditAction::Complete),
            "cancel" => Ok(AuditAction::Cancel),
            _ => bail!("Invalid audit action: {}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!WithdrawalStatus::Pending.is_terminal());
        assert!(!WithdrawalStatus::Approved.is_terminal());
        assert!(WithdrawalStatus::Rejected.is_terminal());
        assert!(WithdrawalStatus::Completed.is_terminal());
        assert!(WithdrawalStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(
            AuditAction::Approve.required_status(),
            WithdrawalStatus::Pending
        );
        assert_eq!(
            AuditAction::Complete.required_status(),
            WithdrawalStatus::Approved
        );
        assert_eq!(
            AuditAction::Reject.target_status(),
            WithdrawalStatus::Rejected
        );
        assert!(AuditAction::Reject.restores_escrow());
        assert!(AuditAction::Cancel.restores_escrow());
        assert!(!AuditAction::Approve.restores_escrow());
        assert!(!AuditAction::Complete.restores_escrow());
    }

    #[test]
    fn test_action_parse() {
        for s in ["approve", "reject", "complete", "cancel"] {
            assert_eq!(AuditAction::from_str(s).unwrap().as_str(), s);
        }
        assert!(AuditAction::from_str("delete").is_err());
    }
}
