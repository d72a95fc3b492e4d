//! 周期报表服务
//! 日报由原始数据聚合；周报/月报只二次汇总日报，绝不重复聚合原始数据

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tokio::time::interval;

use crate::{
    config::DistributionConfig,
    repository::{reports, Report},
};

/// 报表周期
pub const PERIOD_DAILY: &str = "daily";
pub const PERIOD_WEEKLY: &str = "weekly";
pub const PERIOD_MONTHLY: &str = "monthly";

/// 周报以周一为键
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// 月报以每月 1 号为键
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).expect("day 1 always valid")
}

fn month_end(date: NaiveDate) -> NaiveDate {
    let start = month_start(date);
    let next_month = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    next_month.expect("first of month always valid") - chrono::Duration::days(1)
}

/// 把一批日报折叠成一份汇总报表
///
/// 可加字段求和；distributor_count 取区间内最新一天的快照值；
/// active_distributor_count 取区间最大值（去重口径无法跨日相加）。
fn rollup(period: &str, date: NaiveDate, dailies: &[Report]) -> Report {
    let mut total_sales = Decimal::ZERO;
    let mut total_commission = Decimal::ZERO;
    let mut order_count = 0;
    let mut new_distributor_count = 0;
    let mut withdrawal_amount = Decimal::ZERO;
    let mut active_distributor_count = 0;

    for daily in dailies {
        total_sales += daily.total_sales;
        total_commission += daily.total_commission;
        order_count += daily.order_count;
        new_distributor_count += daily.new_distributor_count;
        withdrawal_amount += daily.withdrawal_amount;
        active_distributor_count = active_distributor_count.max(daily.active_distributor_count);
    }

    // daily_in_range 按日期升序返回，最后一条即区间内最新快照
    let distributor_count = dailies.last().map(|r| r.distributor_count).unwrap_or(0);

    Report {
        period: period.to_string(),
        date,
        total_sales,
        total_commission,
        order_count,
        distributor_count,
        new_distributor_count,
        active_distributor_count,
        withdrawal_amount,
    }
}

pub struct ReportService {
    pool: PgPool,
    config: DistributionConfig,
}

impl ReportService {
    pub fn new(pool: PgPool, config: DistributionConfig) -> Self {
        Self { pool, config }
    }

    /// 生成（或覆盖重建）某日的日报
    pub async fn generate_daily(&self, date: NaiveDate) -> Result<Report> {
        let day_start = Utc
            .from_utc_datetime(&date.and_time(NaiveTime::MIN));
        let day_end = day_start + chrono::Duration::days(1);

        let (total_sales, order_count): (Decimal, i64) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount), 0), COUNT(*)
            FROM orders
            WHERE created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await
        .context("Failed to aggregate daily orders")?;

        let total_commission: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM commissions
            WHERE created_at >= $1 AND created_at < $2 AND status != 'refunded'
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await
        .context("Failed to aggregate daily commissions")?;

        let distributor_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM distributors WHERE tier > 1")
                .fetch_one(&self.pool)
                .await?;

        let new_distributor_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM distributors
            WHERE tier > 1 AND joined_at >= $1 AND joined_at < $2
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await?;

        let active_distributor_count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT distributor_id)
            FROM orders
            WHERE distributor_id IS NOT NULL
              AND created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await?;

        let withdrawal_amount: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount), 0)
            FROM withdrawals
            WHERE status = 'completed' AND created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await?;

        let report = Report {
            period: PERIOD_DAILY.to_string(),
            date,
            total_sales,
            total_commission,
            order_count,
            distributor_count,
            new_distributor_count,
            active_distributor_count,
            withdrawal_amount,
        };
        reports::upsert(&self.pool, &report).await?;
        Ok(report)
    }

    /// 生成当周周报（由日报汇总，键为周一）
    pub async fn generate_weekly(&self, date: NaiveDate) -> Result<Report> {
        let start = week_start(date);
        let end = start + chrono::Duration::days(6);
        let dailies = reports::daily_in_range(&self.pool, start, end).await?;
        let report = rollup(PERIOD_WEEKLY, start, &dailies);
        reports::upsert(&self.pool, &report).await?;
        Ok(report)
    }

    /// 生成当月月报（由日报汇总，键为 1 号）
    pub async fn generate_monthly(&self, date: NaiveDate) -> Result<Report> {
        let start = month_start(date);
        let end = month_end(date);
        let dailies = reports::daily_in_range(&self.pool, start, end).await?;
        let report = rollup(PERIOD_MONTHLY, start, &dailies);
        reports::upsert(&self.pool, &report).await?;
        Ok(report)
    }

    /// 一轮报表刷新：今日日报 + 当周/当月滚动汇总
    pub async fn generate_current(&self, date: NaiveDate) -> Result<()> {
        self.generate_daily(date).await?;
        self.generate_weekly(date).await?;
        self.generate_monthly(date).await?;
        Ok(())
    }

    /// 启动报表后台任务（持续运行）
    pub async fn start(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_secs(self.config.report_interval_secs));

        tracing::info!(
            interval_secs = self.config.report_interval_secs,
            "Report job started"
        );

        loop {
            ticker.tick().await;

            let today = Utc::now().date_naive();
            match self.generate_current(today).await {
                Ok(()) => {
                    tracing::debug!(date = %today, "Reports regenerated");
                }
                Err(e) => {
                    tracing::error!(error = ?e, "Report generation failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn daily(date: NaiveDate, sales: &str, orders: i64, dist: i64, active: i64) -> Report {
        Report {
            period: PERIOD_DAILY.to_string(),
            date,
            total_sales: dec(sales),
            total_commission: dec(sales) * dec("0.1"),
            order_count: orders,
            distributor_count: dist,
            new_distributor_count: 1,
            active_distributor_count: active,
            withdrawal_amount: dec("10"),
        }
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2024-06-13 是周四
        let thursday = NaiveDate::from_ymd_opt(2024, 6, 13).unwrap();
        assert_eq!(
            week_start(thursday),
            NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
        );
        // 周一映射到自身
        let monday = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        assert_eq!(week_start(monday), monday);
    }

    #[test]
    fn test_month_bounds() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        assert_eq!(month_start(date), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(month_end(date), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let december = NaiveDate::from_ymd_opt(2023, 12, 5).unwrap();
        assert_eq!(month_end(december), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }

    #[test]
    fn test_rollup_sums_additive_fields() {
        let monday = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let dailies = vec![
            daily(monday, "100", 3, 50, 5),
            daily(monday + chrono::Duration::days(1), "200", 4, 52, 8),
            daily(monday + chrono::Duration::days(2), "50", 1, 53, 2),
        ];
        let weekly = rollup(PERIOD_WEEKLY, monday, &dailies);

        assert_eq!(weekly.total_sales, dec("350"));
        assert_eq!(weekly.order_count, 8);
        assert_eq!(weekly.new_distributor_count, 3);
        assert_eq!(weekly.withdrawal_amount, dec("30"));
        // 快照字段取最新，去重字段取最大
        assert_eq!(weekly.distributor_count, 53);
        assert_eq!(weekly.active_distributor_count, 8);
    }

    #[test]
    fn test_rollup_of_empty_range_is_zero() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let report = rollup(PERIOD_MONTHLY, date, &[]);
        assert_eq!(report.total_sales, Decimal::ZERO);
        assert_eq!(report.distributor_count, 0);
    }
}
