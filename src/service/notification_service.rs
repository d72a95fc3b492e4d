//! 通知服务
//! 核心只负责产生领域事件并落表；推送渠道（短信/模板消息）由外部系统消费

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// 分销域事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    CommissionSettled {
        commission_id: Uuid,
        distributor_id: i64,
        amount: Decimal,
    },
    WithdrawalStatusChanged {
        withdrawal_id: Uuid,
        distributor_id: i64,
        status: String,
    },
    UpgradeAchieved {
        distributor_id: i64,
        from_tier: i32,
        to_tier: i32,
    },
}

impl DomainEvent {
    pub fn category(&self) -> &'static str {
        match self {
            DomainEvent::CommissionSettled { .. } => "commission_settled",
            DomainEvent::WithdrawalStatusChanged { .. } => "withdrawal_status_changed",
            DomainEvent::UpgradeAchieved { .. } => "upgrade_achieved",
        }
    }

    pub fn distributor_id(&self) -> i64 {
        match self {
            DomainEvent::CommissionSettled { distributor_id, .. }
            | DomainEvent::WithdrawalStatusChanged { distributor_id, .. }
            | DomainEvent::UpgradeAchieved { distributor_id, .. } => *distributor_id,
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// 投递失败只记日志：通知是旁路，绝不反向阻塞资金事务
    async fn notify(&self, event: DomainEvent);
}

/// 落库通知器：事件写入 notifications 表，外部投递系统轮询消费
pub struct PgNotifier {
    pool: PgPool,
}

impl PgNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Notifier for PgNotifier {
    async fn notify(&self, event: DomainEvent) {
        let payload = match serde_json::to_value(&event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = ?e, "Failed to serialize domain event");
                return;
            }
        };

        let result = sqlx::query(
            r#"
            INSERT INTO notifications (distributor_id, category, payload, status, created_at)
            VALUES ($1, $2, $3, 'pending', NOW())
            "#,
        )
        .bind(event.distributor_id())
        .bind(event.category())
        .bind(&payload)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                tracing::debug!(category = event.category(), "Domain event recorded");
            }
            Err(e) => {
                tracing::warn!(
                    category = event.category(),
                    error = ?e,
                    "Failed to record domain event"
                );
            }
        }
    }
}

/// 测试用：丢弃所有事件
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, event: DomainEvent) {
        tracing::trace!(category = event.category(), "Event dropped (noop notifier)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_category_and_owner() {
        let event = DomainEvent::UpgradeAchieved {
            distributor_id: 42,
            from_tier: 2,
            to_tier: 3,
        };
        assert_eq!(event.category(), "upgrade_achieved");
        assert_eq!(event.distributor_id(), 42);
    }

    #[test]
    fn test_event_serializes_tagged() {
        let event = DomainEvent::WithdrawalStatusChanged {
            withdrawal_id: Uuid::nil(),
            distributor_id: 1,
            status: "approved".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "WithdrawalStatusChanged");
        assert_eq!(value["data"]["status"], "approved");
    }
}
