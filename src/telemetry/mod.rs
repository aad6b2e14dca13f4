//! 日志初始化
//!
//! Hook 通过 `tracing` 输出日志，由宿主 Broker 决定是否调用此处的初始化。

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingConfig;

/// 从配置初始化日志系统
///
/// 优先使用环境变量 `RUST_LOG`，否则使用配置中的日志级别（未提供配置时为 `info`）。
/// 已存在全局 subscriber 时返回 `false`，不会 panic。
///
/// # 示例
/// ```rust,ignore
/// use flare_mqtt_hooks::{LoggingConfig, telemetry::init_tracing_from_config};
///
/// init_tracing_from_config(Some(&LoggingConfig {
///     level: "debug".to_string(),
///     ..Default::default()
/// }));
/// ```
pub fn init_tracing_from_config(logging_config: Option<&LoggingConfig>) -> bool {
    let default_config = LoggingConfig::default();
    let config = logging_config.unwrap_or(&default_config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    fmt::Subscriber::builder()
        .with_target(config.with_target)
        .with_thread_ids(config.with_thread_ids)
        .with_file(config.with_file)
        .with_line_number(config.with_line_number)
        .with_env_filter(env_filter)
        .try_init()
        .is_ok()
}
