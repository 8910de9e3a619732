//! 错误类型定义
//!
//! 统一错误型（thiserror）。探测失败不走这里，它们在探测边界被编码成
//! `CheckResult{status: failed}`，本类型只承载需要跨层传播的故障。

use axum::http::StatusCode;
use thiserror::Error;

/// 核心错误类型
#[derive(Debug, Error)]
pub enum CheckError {
    /// 截止时间超限
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 连接 / TLS / DNS 失败
    #[error("Transport error: {0}")]
    Transport(String),

    /// 非 2xx 响应或流格式异常
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 持久层操作失败
    #[error("Database error: {0}")]
    Database(String),

    /// 配置读取或解析失败
    #[error("Configuration error: {0}")]
    Config(String),

    /// 序列化失败
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 资源不存在
    #[error("Not found: {0}")]
    NotFound(String),

    /// 内部不变量被破坏
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckError {
    /// 对外安全的错误文案
    ///
    /// 不暴露内部地址、密钥等细节；NotFound 的文案由调用方编写，可直接透出。
    pub fn external_message(&self) -> String {
        match self {
            Self::Timeout(_) => "Request timeout".to_string(),
            Self::Transport(_) => "Upstream unavailable".to_string(),
            Self::Protocol(_) => "Upstream protocol error".to_string(),
            Self::Database(_) => "Database error".to_string(),
            Self::Config(_) => "Configuration error".to_string(),
            Self::Serialization(_) => "Serialization error".to_string(),
            Self::NotFound(msg) => msg.clone(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 映射到 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Transport(_) | Self::Protocol(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) | Self::Serialization(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Config(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl From<sqlx::Error> for CheckError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<reqwest::Error> for CheckError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Result 别名
pub type AppResult<T> = Result<T, CheckError>;
