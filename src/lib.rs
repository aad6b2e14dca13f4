//! Flare MQTT Hooks 公共库
//!
//! 为 MQTT Broker 提供可插拔的决策点与观测点：
//! - 远程认证 / ACL 鉴权 Hook（带本地限时封禁）
//! - 事件分发 Hook（按事件类别投递到下游，支持用户名屏蔽）

pub mod config;
pub mod error;
pub mod hooks;
pub mod telemetry;

pub use config::{
    EventFanoutSettings, HooksConfigLoader, HooksFileConfig, HttpAuthSettings, LoggingConfig,
};
pub use error::*;
pub use hooks::*;
