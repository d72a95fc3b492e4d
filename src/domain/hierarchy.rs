//! 分销层级领域模型
//! 上级链为有界无环树：写入时做环检测，读取时限制追溯深度

use serde::{Deserialize, Serialize};

/// 上级链遍历的硬上限，防御历史脏数据中的深链/环
pub const MAX_CHAIN_WALK: usize = 64;

/// 上级链中的一个节点（按距离买家的跳数升序排列）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UplineNode {
    pub user_id: i64,
    pub tier: i32,
}

/// 判断把 `child` 挂到 `new_parent` 名下是否会构成环
///
/// `parent_ancestors` 为 new_parent 的上级链（含 new_parent 自身由调用方保证不含）。
/// 规则：child == new_parent，或 child 已出现在 new_parent 的上级链中，均构成环。
pub fn would_create_cycle(child: i64, new_parent: i64, parent_ancestors: &[i64]) -> bool {
    child == new_parent || parent_ancestors.contains(&child)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_parent_is_cycle() {
        assert!(would_create_cycle(7, 7, &[]));
    }

    #[test]
    fn test_descendant_as_parent_is_cycle() {
        // 1 <- 2 <- 3，把 1 挂到 3 下面：3 的上级链 [2, 1] 含 1
        assert!(would_create_cycle(1, 3, &[2, 1]));
    }

    #[test]
    fn test_unrelated_parent_is_fine() {
        assert!(!would_create_cycle(5, 3, &[2, 1]));
    }
}
