//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub distribution: DistributionConfig,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// 分销业务配置
///
/// 佣金比例与升级门槛存放在数据库规则表中可在线调整；
/// 这里只放结算/清扫节奏与提现约束等部署级参数。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
    /// 佣金结算延迟窗口（天）：订单完成后需度过退款期才入账
    pub settlement_delay_days: i64,
    /// 结算任务轮询间隔（秒）
    pub settlement_interval_secs: u64,
    /// 单次结算批量上限
    pub settlement_batch_size: i64,
    /// 最低提现金额（元）
    pub withdrawal_min_amount: Decimal,
    /// 待审核提现的过期窗口（天），过期自动取消并解冻
    pub withdrawal_expiry_days: i64,
    /// 提现过期清扫间隔（秒）
    pub withdrawal_sweep_interval_secs: u64,
    /// 报表生成间隔（秒）
    pub report_interval_secs: u64,
    /// 升级评估清扫间隔（秒）
    pub upgrade_interval_secs: u64,
    /// 分销商统计重算间隔（秒）
    pub stats_resync_interval_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://postgres@localhost:5432/fenxiao".into()),
            max_connections: std::env::var("DB_MAX_CONNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            min_connections: std::env::var("DB_MIN_CONNS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            acquire_timeout_secs: std::env::var("DB_ACQ_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8090".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            settlement_delay_days: std::env::var("SETTLEMENT_DELAY_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),
            settlement_interval_secs: std::env::var("SETTLEMENT_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600), // 每小时一轮
            settlement_batch_size: std::env::var("SETTLEMENT_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(200),
            withdrawal_min_amount: std::env::var("WITHDRAWAL_MIN_AMOUNT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Decimal::from(100)),
            withdrawal_expiry_days: std::env::var("WITHDRAWAL_EXPIRY_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            withdrawal_sweep_interval_secs: std::env::var("WITHDRAWAL_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            report_interval_secs: std::env::var("REPORT_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            upgrade_interval_secs: std::env::var("UPGRADE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
            stats_resync_interval_secs: std::env::var("STATS_RESYNC_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(21600), // 6小时全量重算一次
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            distribution: DistributionConfig::default(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self::default())
    }

    /// 从TOML配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).with_context(|| {
            format!("Failed to read config file: {}", path.as_ref().display())
        })?;
        let config: Self =
            toml::from_str(&content).context("Failed to parse config file as TOML")?;
        Ok(config)
    }

    /// 从环境变量和配置文件加载（文件配置覆盖环境变量）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("postgres://")
            && !self.database.url.starts_with("postgresql://")
        {
            anyhow::bail!("DATABASE_URL must start with postgres:// or postgresql://");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        let dist = &self.distribution;
        if dist.settlement_delay_days < 0 {
            anyhow::bail!("settlement_delay_days must be >= 0");
        }
        if dist.withdrawal_min_amount < Decimal::ZERO {
            anyhow::bail!("withdrawal_min_amount must be >= 0");
        }
        if dist.withdrawal_expiry_days <= 0 {
            anyhow::bail!("withdrawal_expiry_days must be > 0");
        }
        if dist.settlement_batch_size <= 0 {
            anyhow::bail!("settlement_batch_size must be > 0");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_distribution_config() {
        let config = Config::default();
        assert_eq!(config.distribution.settlement_delay_days, 7);
        assert_eq!(config.distribution.withdrawal_expiry_days, 30);
        assert_eq!(
            config.distribution.withdrawal_min_amount,
            Decimal::from(100)
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_toml_overrides() {
        let toml_str = r#"
            [distribution]
            settlement_delay_days = 3
            settlement_interval_secs = 600
            settlement_batch_size = 50
            withdrawal_min_amount = "50"
            withdrawal_expiry_days = 14
            withdrawal_sweep_interval_secs = 600
            report_interval_secs = 600
            upgrade_interval_secs = 600
            stats_resync_interval_secs = 600
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.distribution.settlement_delay_days, 3);
        assert_eq!(config.distribution.withdrawal_min_amount, Decimal::from(50));
    }

    #[test]
    fn test_validate_rejects_negative_delay() {
        let mut config = Config::default();
        config.distribution.settlement_delay_days = -1;
        assert!(config.validate().is_err());
    }
}
