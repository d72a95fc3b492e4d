use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppErrorCode {
    // HTTP 基础错误码
    BadRequest,
    NotFound,
    Internal,

    // 业务错误码
    DuplicateGrant,
    InvalidTransition,
    InsufficientBalance,
    BelowMinimum,
    DistributorNotFound,
    OrderNotFound,
    InvalidParameter,
    HierarchyCycle,
    DatabaseError,
    ValidationFailed,
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub code: AppErrorCode,
    pub message: String,
    pub status: StatusCode,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
}

impl AppErrorCode {
    fn as_str(&self) -> &'static str {
        match self {
            AppErrorCode::BadRequest => "bad_request",
            AppErrorCode::NotFound => "not_found",
            AppErrorCode::Internal => "internal",
            AppErrorCode::DuplicateGrant => "duplicate_grant",
            AppErrorCode::InvalidTransition => "invalid_transition",
            AppErrorCode::InsufficientBalance => "insufficient_balance",
            AppErrorCode::BelowMinimum => "below_minimum",
            AppErrorCode::DistributorNotFound => "distributor_not_found",
            AppErrorCode::OrderNotFound => "order_not_found",
            AppErrorCode::InvalidParameter => "invalid_parameter",
            AppErrorCode::HierarchyCycle => "hierarchy_cycle",
            AppErrorCode::DatabaseError => "database_error",
            AppErrorCode::ValidationFailed => "validation_failed",
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code.as_str(),
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::BadRequest,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::NotFound,
            message: msg.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::Internal,
            message: msg.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // 业务错误辅助函数

    /// 同一 (订单, 分销商, 层级) 的佣金已存在，调用方不应原样重试
    pub fn duplicate_grant(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::DuplicateGrant,
            message: msg.into(),
            status: StatusCode::CONFLICT,
        }
    }

    /// 状态机前置条件不满足，属调用方错误，不重试
    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::InvalidTransition,
            message: msg.into(),
            status: StatusCode::CONFLICT,
        }
    }

    pub fn insufficient_balance(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::InsufficientBalance,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn below_minimum(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::BelowMinimum,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn distributor_not_found(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::DistributorNotFound,
            message: msg.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn order_not_found(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::OrderNotFound,
            message: msg.into(),
            status: StatusCode::NOT_FOUND,
        }
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::InvalidParameter,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn hierarchy_cycle(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::HierarchyCycle,
            message: msg.into(),
            status: StatusCode::CONFLICT,
        }
    }

    pub fn database_error(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::DatabaseError,
            message: msg.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation_failed(msg: impl Into<String>) -> Self {
        Self {
            code: AppErrorCode::ValidationFailed,
            message: msg.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    /// 判断一个数据库错误是否为唯一约束冲突（PostgreSQL 23505）
    pub fn is_unique_violation(err: &sqlx::Error) -> bool {
        match err {
            sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
            _ => false,
        }
    }
}

// 从 SQLx 错误转换
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("Resource not found"),
            sqlx::Error::Database(ref db_err) => {
                if let Some(code) = db_err.code() {
                    if code == "23505" {
                        // PostgreSQL unique_violation：佣金/报表的幂等保护
                        return Self::duplicate_grant("Record already exists");
                    }
                    if code == "23503" {
                        // PostgreSQL foreign_key_violation
                        return Self::bad_request("Referenced entity does not exist");
                    }
                }
                Self::database_error(format!("Database error: {}", db_err))
            }
            _ => Self::database_error(format!("Database operation failed: {}", err)),
        }
    }
}

// 从 serde_json 错误转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("JSON serialization error: {}", err))
    }
}

// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // 保留服务层已分类的业务错误
        match err.downcast::<AppError>() {
            Ok(app_err) => app_err,
            Err(err) => Self::internal(format!("{}", err)),
        }
    }
}
