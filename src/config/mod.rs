//! Hook 配置
//!
//! 文件配置（toml）只描述可序列化的部分；传输层、下游句柄等运行时对象
//! 在构建各 Hook 的类型化配置时注入。

mod loader;

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::hooks::adapters::{BatchSettings, DecisionMethod, EventCategory, HttpAuthHookConfig};

pub use loader::HooksConfigLoader;

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_file: bool,
    pub with_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }
}

/// Hook 配置文件根
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct HooksFileConfig {
    pub logging: Option<LoggingConfig>,
    pub http_auth: Option<HttpAuthSettings>,
    pub event_fanout: Option<EventFanoutSettings>,
}

impl HooksFileConfig {
    pub(crate) fn merge(&mut self, other: HooksFileConfig) {
        if other.logging.is_some() {
            self.logging = other.logging;
        }
        if other.http_auth.is_some() {
            self.http_auth = other.http_auth;
        }
        if let Some(next) = other.event_fanout {
            if let Some(current) = self.event_fanout.as_mut() {
                current.merge(next);
            } else {
                self.event_fanout = Some(next);
            }
        }
    }
}

/// 远程鉴权 Hook 文件配置
#[derive(Debug, Clone, Deserialize)]
pub struct HttpAuthSettings {
    pub connect_endpoint: String,
    pub acl_endpoint: String,
    #[serde(default)]
    pub block_duration_ms: Option<u64>,
    #[serde(default)]
    pub method: DecisionMethod,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    3_000
}

impl HttpAuthSettings {
    pub fn into_config(self) -> HttpAuthHookConfig {
        let mut config = HttpAuthHookConfig::new(self.connect_endpoint, self.acl_endpoint)
            .with_method(self.method)
            .with_timeout(Duration::from_millis(self.timeout_ms));
        if let Some(ms) = self.block_duration_ms {
            config = config.with_block_duration(Duration::from_millis(ms));
        }
        config
    }
}

/// 事件分发 Hook 文件配置
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EventFanoutSettings {
    /// 事件类别 -> 下游名称（如 Kafka topic），未列出的类别不分发
    pub destinations: HashMap<EventCategory, String>,
    pub disallow_list: Vec<String>,
    /// 未配置时使用 [`BatchSettings::default`]
    pub batch: Option<BatchSettings>,
    pub kafka_brokers: Option<String>,
}

impl EventFanoutSettings {
    fn merge(&mut self, other: EventFanoutSettings) {
        self.destinations.extend(other.destinations);
        for username in other.disallow_list {
            if !self.disallow_list.contains(&username) {
                self.disallow_list.push(username);
            }
        }
        if other.batch.is_some() {
            self.batch = other.batch;
        }
        if other.kafka_brokers.is_some() {
            self.kafka_brokers = other.kafka_brokers;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            [logging]
            level = "debug"

            [http_auth]
            connect_endpoint = "http://auth.local/connect"
            acl_endpoint = "http://auth.local/acl"
            block_duration_ms = 60000
            method = "get"

            [event_fanout]
            disallow_list = ["blocked_user"]
            kafka_brokers = "localhost:9092"

            [event_fanout.destinations]
            published = "mqtt-publishes"
            will_sent = "mqtt-wills"

            [event_fanout.batch]
            count_threshold = 50
        "#;

        let config: HooksFileConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.logging.unwrap().level, "debug");

        let auth = config.http_auth.unwrap().into_config();
        assert_eq!(auth.block_duration, Some(Duration::from_secs(60)));
        assert_eq!(auth.method, DecisionMethod::Get);
        assert_eq!(auth.timeout, Duration::from_millis(3_000));

        let fanout = config.event_fanout.unwrap();
        assert_eq!(fanout.destinations[&EventCategory::Published], "mqtt-publishes");
        assert_eq!(fanout.destinations[&EventCategory::WillSent], "mqtt-wills");
        assert!(!fanout.destinations.contains_key(&EventCategory::Connect));
        let batch = fanout.batch.unwrap();
        assert_eq!(batch.count_threshold, 50);
        assert_eq!(batch.delay_threshold_ms, 1_000);
        assert_eq!(fanout.disallow_list, vec!["blocked_user".to_string()]);
    }

    #[test]
    fn test_missing_endpoint_is_parse_error() {
        let raw = r#"
            [http_auth]
            acl_endpoint = "http://auth.local/acl"
        "#;
        assert!(toml::from_str::<HooksFileConfig>(raw).is_err());
    }

    #[test]
    fn test_empty_config_defaults() {
        let config: HooksFileConfig = toml::from_str("").unwrap();
        assert!(config.http_auth.is_none());
        assert!(config.event_fanout.is_none());
        assert!(config.logging.is_none());
    }
}
