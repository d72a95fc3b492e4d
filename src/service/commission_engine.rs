//! 多级佣金规则引擎
//! 纯函数：给定可计佣金额、买家上级链和规则集，产出各级佣金草稿

use rust_decimal::Decimal;

use crate::domain::{round_money, CommissionDraft, RuleSet, UplineNode};

/// 计算一笔订单的多级佣金
///
/// 上级链按跳数升序（第 1 个为直接推荐人），第 L 跳对应 level L 规则。
/// 等级不足 min_tier 的上级被跳过但不中断向上遍历（层级计数继续累进）。
/// 金额四舍五入到分；四舍五入到零的草稿丢弃；总额绝不超过可计佣基数。
pub fn compute_commissions(
    base_amount: Decimal,
    upline: &[UplineNode],
    rules: &RuleSet,
) -> Vec<CommissionDraft> {
    if base_amount <= Decimal::ZERO || rules.is_empty() {
        return Vec::new();
    }

    let mut drafts = Vec::new();
    let mut granted_total = Decimal::ZERO;

    for (hop, ancestor) in upline.iter().take(rules.max_levels()).enumerate() {
        let level = (hop + 1) as i32;
        let rule = match rules.rule_for(level) {
            Some(rule) => rule,
            None => continue,
        };
        if ancestor.tier < rule.min_tier {
            continue;
        }

        let mut amount = round_money(base_amount * rule.rate);
        // 规则集校验已保证比例和不超 1；这里守住舍入造成的边界溢出
        if granted_total + amount > base_amount {
            amount = base_amount - granted_total;
        }
        if amount <= Decimal::ZERO {
            continue;
        }

        granted_total += amount;
        drafts.push(CommissionDraft {
            distributor_id: ancestor.user_id,
            level,
            amount,
        });
    }

    drafts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CommissionRule;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn rules(specs: &[(i32, &str, i32)]) -> RuleSet {
        RuleSet::new(
            specs
                .iter()
                .map(|&(level, rate, min_tier)| CommissionRule {
                    level,
                    rate: dec(rate),
                    min_tier,
                    is_active: true,
                })
                .collect(),
        )
        .unwrap()
    }

    fn node(user_id: i64, tier: i32) -> UplineNode {
        UplineNode { user_id, tier }
    }

    #[test]
    fn test_two_level_chain() {
        // 1000 元订单，上级链 [二级分销商 A, 三级分销商 B]
        // level1 10% / level2 5% => A 得 100.00，B 得 50.00
        let set = rules(&[(1, "0.10", 2), (2, "0.05", 3)]);
        let drafts = compute_commissions(dec("1000"), &[node(11, 2), node(12, 3)], &set);
        assert_eq!(
            drafts,
            vec![
                CommissionDraft {
                    distributor_id: 11,
                    level: 1,
                    amount: dec("100.00")
                },
                CommissionDraft {
                    distributor_id: 12,
                    level: 2,
                    amount: dec("50.00")
                },
            ]
        );
    }

    #[test]
    fn test_unqualified_ancestor_skipped_without_breaking_chain() {
        // 直接上级只是普通用户：得不到 level1，但 level2 继续往上数
        let set = rules(&[(1, "0.10", 2), (2, "0.05", 3)]);
        let drafts = compute_commissions(dec("1000"), &[node(11, 1), node(12, 3)], &set);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].distributor_id, 12);
        assert_eq!(drafts[0].level, 2);
        assert_eq!(drafts[0].amount, dec("50.00"));
    }

    #[test]
    fn test_chain_longer_than_rules_is_truncated() {
        let set = rules(&[(1, "0.10", 2)]);
        let drafts =
            compute_commissions(dec("100"), &[node(1, 3), node(2, 3), node(3, 3)], &set);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].distributor_id, 1);
    }

    #[test]
    fn test_rounding_half_up_to_cents() {
        // 33.35 * 0.10 = 3.335 => 3.34
        let set = rules(&[(1, "0.10", 2)]);
        let drafts = compute_commissions(dec("33.35"), &[node(1, 2)], &set);
        assert_eq!(drafts[0].amount, dec("3.34"));
    }

    #[test]
    fn test_zero_amount_draft_dropped() {
        // 0.01 * 0.10 = 0.001 => 0.00，不产生记录
        let set = rules(&[(1, "0.10", 2)]);
        let drafts = compute_commissions(dec("0.01"), &[node(1, 2)], &set);
        assert!(drafts.is_empty());
    }

    #[test]
    fn test_total_never_exceeds_base() {
        let set = rules(&[(1, "0.50", 2), (2, "0.30", 2), (3, "0.20", 2)]);
        let base = dec("0.05");
        let drafts = compute_commissions(base, &[node(1, 3), node(2, 3), node(3, 3)], &set);
        let total: Decimal = drafts.iter().map(|d| d.amount).sum();
        assert!(total <= base, "total {} exceeds base {}", total, base);
    }

    #[test]
    fn test_negative_or_zero_base_yields_nothing() {
        let set = rules(&[(1, "0.10", 2)]);
        assert!(compute_commissions(dec("0"), &[node(1, 2)], &set).is_empty());
        assert!(compute_commissions(dec("-10"), &[node(1, 2)], &set).is_empty());
    }

    #[test]
    fn test_empty_upline_yields_nothing() {
        let set = rules(&[(1, "0.10", 2)]);
        assert!(compute_commissions(dec("1000"), &[], &set).is_empty());
    }
}
