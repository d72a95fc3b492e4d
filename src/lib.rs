//! fenxiao - 微信小程序分销佣金后端核心
//!
//! 多级分销：佣金计算/结算、提现审核、统计报表与升级评估

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod repository;
pub mod service;

// 重新导出常用类型
pub use app_state::AppState;
pub use error::{AppError, AppErrorCode};

pub mod prelude {
    pub use crate::{
        app_state::AppState,
        config::Config,
        domain::{CommissionStatus, RuleSet, WithdrawalStatus},
        error::{AppError, AppErrorCode},
    };
}
