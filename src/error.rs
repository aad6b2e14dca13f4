//! MQTT Hook 错误类型
//!
//! - 配置阶段错误统一为 [`ConfigError`]，Hook 不得在配置失败后投入使用
//! - 决策与分发路径上的错误只用于日志与观测，不会回传给 Broker

use thiserror::Error;

/// 配置错误（一次性配置阶段）
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing config for hook `{hook}`")]
    MissingConfig { hook: String },

    #[error("invalid endpoint `{field}`: {reason}")]
    InvalidEndpoint { field: &'static str, reason: String },

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("hook `{0}` is already registered")]
    DuplicateHook(String),

    #[error("failed to load hook config: {0}")]
    Load(String),
}

/// 远程决策服务调用错误
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode decision request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("decision request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Request(err.to_string())
    }
}

/// 事件下游（Sink）错误
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("event envelope codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("sink `{0}` is closed")]
    Closed(String),

    #[error("sink `{0}` buffer is full")]
    Full(String),

    #[error("sink transport failed: {0}")]
    Transport(String),
}

/// Hook 层统一错误
#[derive(Debug, Error)]
pub enum HookError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

pub type Result<T> = std::result::Result<T, HookError>;
