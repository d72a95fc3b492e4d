//! 佣金领域模型
//! 状态机 + 分销规则集 + 佣金草稿（纯数据，不含持久化）

use std::str::FromStr;

use anyhow::{bail, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// 佣金状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,  // 待结算（订单刚完成）
    Settled,  // 已结算（余额已入账）
    Refunded, // 已退款/已取消
    Failed,   // 结算失败
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Settled => "settled",
            CommissionStatus::Refunded => "refunded",
            CommissionStatus::Failed => "failed",
        }
    }

    /// 判断是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, CommissionStatus::Refunded | CommissionStatus::Failed)
    }
}

impl FromStr for CommissionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(CommissionStatus::Pending),
            "settled" => Ok(CommissionStatus::Settled),
            "refunded" => Ok(CommissionStatus::Refunded),
            "failed" => Ok(CommissionStatus::Failed),
            _ => bail!("Invalid commission status: {}", s),
        }
    }
}

/// 分销规则：某一分销层级的佣金比例与参与门槛
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommissionRule {
    pub level: i32,
    /// 佣金比例，0.10 表示 10%
    pub rate: Decimal,
    /// 该层级获得佣金所需的最低分销商等级
    pub min_tier: i32,
    pub is_active: bool,
}

/// 已校验的规则集
///
/// 规则按 level 升序排列，level 唯一，比例之和不超过 1，
/// 保证对任意订单各级佣金总和不超过可计佣金额。
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CommissionRule>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<CommissionRule>) -> Result<Self> {
        rules.retain(|r| r.is_active);
        rules.sort_by_key(|r| r.level);

        let mut total_rate = Decimal::ZERO;
        let mut last_level = 0;
        for rule in &rules {
            if rule.level < 1 {
                bail!("Commission rule level must be >= 1, got {}", rule.level);
            }
            if rule.level == last_level {
                bail!("Duplicate commission rule for level {}", rule.level);
            }
            if rule.rate <= Decimal::ZERO || rule.rate > Decimal::ONE {
                bail!(
                    "Commission rate for level {} must be in (0, 1], got {}",
                    rule.level,
                    rule.rate
                );
            }
            if rule.min_tier < 1 {
                bail!("Commission rule min_tier must be >= 1");
            }
            total_rate += rule.rate;
            last_level = rule.level;
        }
        if total_rate > Decimal::ONE {
            bail!("Commission rates sum to {}, exceeding 100%", total_rate);
        }

        Ok(Self { rules })
    }

    /// 最大分销层级数（即向上追溯的跳数上限）
    pub fn max_levels(&self) -> usize {
        self.rules.last().map(|r| r.level as usize).unwrap_or(0)
    }

    pub fn rule_for(&self, level: i32) -> Option<&CommissionRule> {
        self.rules.iter().find(|r| r.level == level)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// 佣金草稿：规则引擎的输出，尚未持久化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionDraft {
    pub distributor_id: i64,
    pub level: i32,
    pub amount: Decimal,
}

/// 金额四舍五入到分（2位小数，中点远离零）
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn rule(level: i32, rate: &str, min_tier: i32) -> CommissionRule {
        CommissionRule {
            level,
            rate: dec(rate),
            min_tier,
            is_active: true,
        }
    }

    #[test]
    fn test_status_round_trip() {
        for s in ["pending", "settled", "refunded", "failed"] {
            assert_eq!(CommissionStatus::from_str(s).unwrap().as_str(), s);
        }
        assert!(CommissionStatus::from_str("paid").is_err());
    }

    #[test]
    fn test_rule_set_rejects_duplicate_level() {
        let err = RuleSet::new(vec![rule(1, "0.10", 2), rule(1, "0.05", 2)]);
        assert!(err.is_err());
    }

    #[test]
    fn test_rule_set_rejects_excessive_total_rate() {
        let err = RuleSet::new(vec![rule(1, "0.60", 2), rule(2, "0.50", 3)]);
        assert!(err.is_err());
    }

    #[test]
    fn test_rule_set_ignores_inactive_rules() {
        let mut inactive = rule(2, "0.05", 3);
        inactive.is_active = false;
        let set = RuleSet::new(vec![rule(1, "0.10", 2), inactive]).unwrap();
        assert_eq!(set.max_levels(), 1);
        assert!(set.rule_for(2).is_none());
    }

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(dec("10.005")), dec("10.01"));
        assert_eq!(round_money(dec("10.004")), dec("10.00"));
    }
}
