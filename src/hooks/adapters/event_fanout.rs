//! 事件分发 Hook
//!
//! 把 Broker 生命周期与流量事件转换为 [`EventEnvelope`]，投递到该事件类别绑定的下游。
//! 分发是旁路的：不加锁、不等待确认、不重试，任何失败只记录日志并交给错误观察者，
//! 不会影响 Broker 的消息投递。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::EventFanoutSettings;
use crate::error::{ConfigError, SinkError};

use super::super::packets::{Client, ConnectPacket, PublishPacket, SubscribePacket, UnsubscribePacket};
use super::super::types::{Capabilities, Configurable, Hook, HookEvent};
use super::envelope::{
    ConnectEvent, DisconnectEvent, EventCategory, EventEnvelope, LifecycleEvent, PublishEvent,
    SessionEvent, SubscriptionEvent,
};
use super::sink::{BatchTransport, BatchingSink, EventSink};

pub const EVENT_FANOUT_HOOK_ID: &str = "event-fanout-hook";

/// 被吞掉的编码 / 投递错误的观察点
pub trait PublishErrorObserver: Send + Sync {
    fn on_publish_error(&self, category: EventCategory, error: &SinkError);
}

impl<F> PublishErrorObserver for F
where
    F: Fn(EventCategory, &SinkError) + Send + Sync,
{
    fn on_publish_error(&self, category: EventCategory, error: &SinkError) {
        self(category, error)
    }
}

/// 事件分发 Hook 配置
#[derive(Clone, Default)]
pub struct EventFanoutHookConfig {
    pub sinks: HashMap<EventCategory, Arc<dyn EventSink>>,
    pub disallow_list: HashSet<String>,
    pub error_observer: Option<Arc<dyn PublishErrorObserver>>,
}

impl EventFanoutHookConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(mut self, category: EventCategory, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.insert(category, sink);
        self
    }

    pub fn disallow<T: Into<String>>(mut self, username: T) -> Self {
        self.disallow_list.insert(username.into());
        self
    }

    pub fn with_error_observer(mut self, observer: Arc<dyn PublishErrorObserver>) -> Self {
        self.error_observer = Some(observer);
        self
    }

    /// 按文件配置为每个已绑定的类别创建攒批 Sink，需在 tokio 运行时内调用
    pub fn from_settings(
        settings: &EventFanoutSettings,
        transport: Arc<dyn BatchTransport>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        let mut by_destination: HashMap<&str, Arc<dyn EventSink>> = HashMap::new();

        for (category, destination) in &settings.destinations {
            if destination.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "empty destination for event category `{category}`"
                )));
            }
            // 同一下游只启动一个攒批任务
            let sink = by_destination
                .entry(destination.as_str())
                .or_insert_with(|| {
                    BatchingSink::spawn(
                        destination.clone(),
                        Arc::clone(&transport),
                        settings.batch.clone().unwrap_or_default(),
                    ) as Arc<dyn EventSink>
                })
                .clone();
            config.sinks.insert(*category, sink);
        }

        config.disallow_list = settings.disallow_list.iter().cloned().collect();
        Ok(config)
    }

    /// 使用 `kafka_brokers` 构建 Kafka 批量发送通道，destination 即 Kafka topic
    #[cfg(feature = "kafka")]
    pub fn from_kafka_settings(settings: &EventFanoutSettings) -> Result<Self, ConfigError> {
        let brokers = settings
            .kafka_brokers
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("kafka_brokers is required".to_string()))?;
        let transport = super::sink::KafkaBatchTransport::new(
            brokers,
            std::time::Duration::from_millis(KAFKA_SEND_TIMEOUT_MS),
        )?;
        Self::from_settings(settings, Arc::new(transport))
    }
}

#[cfg(feature = "kafka")]
const KAFKA_SEND_TIMEOUT_MS: u64 = 5_000;

impl fmt::Debug for EventFanoutHookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bound: Vec<_> = self
            .sinks
            .iter()
            .map(|(category, sink)| (*category, sink.name().to_string()))
            .collect();
        bound.sort();
        f.debug_struct("EventFanoutHookConfig")
            .field("sinks", &bound)
            .field("disallow_list", &self.disallow_list)
            .field("error_observer", &self.error_observer.is_some())
            .finish()
    }
}

/// 事件分发 Hook
#[derive(Default)]
pub struct EventFanoutHook {
    sinks: HashMap<EventCategory, Arc<dyn EventSink>>,
    disallow_list: HashSet<String>,
    error_observer: Option<Arc<dyn PublishErrorObserver>>,
}

impl EventFanoutHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self, category: EventCategory) -> bool {
        self.sinks.contains_key(&category)
    }

    /// 关闭所有已绑定的下游并等待积压事件发送完毕，多个类别共享的下游只关闭一次
    pub async fn close(&self) {
        let mut distinct: Vec<&Arc<dyn EventSink>> = Vec::new();
        for sink in self.sinks.values() {
            if !distinct.iter().any(|seen| Arc::ptr_eq(seen, sink)) {
                distinct.push(sink);
            }
        }
        for sink in distinct {
            sink.close().await;
        }
        tracing::debug!(hook = EVENT_FANOUT_HOOK_ID, "event sinks closed");
    }

    fn emit<F>(&self, category: EventCategory, username: Option<&str>, build: F)
    where
        F: FnOnce(DateTime<Utc>) -> EventEnvelope,
    {
        let Some(sink) = self.sinks.get(&category) else {
            return;
        };

        if let Some(username) = username {
            if self.disallow_list.contains(username) {
                tracing::trace!(hook = EVENT_FANOUT_HOOK_ID, %category, username, "username disallowed, skip");
                return;
            }
        }

        let envelope = build(Utc::now());
        let result = envelope
            .encode()
            .and_then(|payload| sink.publish(payload));
        if let Err(err) = result {
            tracing::error!(
                hook = EVENT_FANOUT_HOOK_ID,
                %category,
                sink = sink.name(),
                error = %err,
                "failed to publish event"
            );
            if let Some(observer) = &self.error_observer {
                observer.on_publish_error(category, &err);
            }
        }
    }
}

impl Configurable for EventFanoutHook {
    type Config = EventFanoutHookConfig;

    fn configure(&mut self, config: EventFanoutHookConfig) -> Result<(), ConfigError> {
        if let Some((category, _)) = config.sinks.iter().find(|(_, sink)| sink.name().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "sink bound to `{category}` has an empty name"
            )));
        }
        if config.sinks.is_empty() {
            tracing::warn!(hook = EVENT_FANOUT_HOOK_ID, "no sink bound, all events will be dropped");
        }

        tracing::info!(
            hook = EVENT_FANOUT_HOOK_ID,
            config = ?config,
            "event fanout hook configured"
        );
        self.sinks = config.sinks;
        self.disallow_list = config.disallow_list;
        self.error_observer = config.error_observer;
        Ok(())
    }
}

#[async_trait]
impl Hook for EventFanoutHook {
    fn id(&self) -> &str {
        EVENT_FANOUT_HOOK_ID
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of(&[
            HookEvent::OnStarted,
            HookEvent::OnStopped,
            HookEvent::OnConnect,
            HookEvent::OnSessionEstablished,
            HookEvent::OnDisconnect,
            HookEvent::OnPublished,
            HookEvent::OnSubscribed,
            HookEvent::OnUnsubscribed,
            HookEvent::OnWillSent,
        ])
    }

    async fn on_started(&self) {
        self.emit(EventCategory::Started, None, |timestamp| {
            EventEnvelope::Started(LifecycleEvent { timestamp })
        });
    }

    async fn on_stopped(&self) {
        self.emit(EventCategory::Stopped, None, |timestamp| {
            EventEnvelope::Stopped(LifecycleEvent { timestamp })
        });
        self.close().await;
    }

    async fn on_connect(&self, client: &Client, packet: &ConnectPacket) {
        self.emit(EventCategory::Connect, Some(&client.username), |timestamp| {
            EventEnvelope::Connect(ConnectEvent {
                client_id: client.id.clone(),
                username: client.username.clone(),
                remote_addr: client.remote_addr.clone(),
                clean_start: packet.clean_start,
                timestamp,
            })
        });
    }

    async fn on_session_established(&self, client: &Client, _packet: &ConnectPacket) {
        self.emit(
            EventCategory::SessionEstablished,
            Some(&client.username),
            |timestamp| {
                EventEnvelope::SessionEstablished(SessionEvent {
                    client_id: client.id.clone(),
                    username: client.username.clone(),
                    timestamp,
                })
            },
        );
    }

    async fn on_disconnect(&self, client: &Client, reason: Option<&str>, expire: bool) {
        self.emit(EventCategory::Disconnect, Some(&client.username), |timestamp| {
            EventEnvelope::Disconnect(DisconnectEvent {
                client_id: client.id.clone(),
                username: client.username.clone(),
                reason: reason.map(str::to_string),
                expired: expire,
                timestamp,
            })
        });
    }

    async fn on_published(&self, client: &Client, packet: &PublishPacket) {
        self.emit(EventCategory::Published, Some(&client.username), |timestamp| {
            EventEnvelope::Published(publish_event(client, packet, timestamp))
        });
    }

    async fn on_subscribed(&self, client: &Client, packet: &SubscribePacket) {
        for filter in &packet.filters {
            self.emit(EventCategory::Subscribed, Some(&client.username), |timestamp| {
                EventEnvelope::Subscribed(SubscriptionEvent {
                    client_id: client.id.clone(),
                    username: client.username.clone(),
                    topic: filter.filter.clone(),
                    qos: Some(filter.qos),
                    timestamp,
                })
            });
        }
    }

    async fn on_unsubscribed(&self, client: &Client, packet: &UnsubscribePacket) {
        for filter in &packet.filters {
            self.emit(EventCategory::Unsubscribed, Some(&client.username), |timestamp| {
                EventEnvelope::Unsubscribed(SubscriptionEvent {
                    client_id: client.id.clone(),
                    username: client.username.clone(),
                    topic: filter.clone(),
                    qos: None,
                    timestamp,
                })
            });
        }
    }

    async fn on_will_sent(&self, client: &Client, will: &PublishPacket) {
        self.emit(EventCategory::WillSent, Some(&client.username), |timestamp| {
            EventEnvelope::WillSent(publish_event(client, will, timestamp))
        });
    }
}

fn publish_event(client: &Client, packet: &PublishPacket, timestamp: DateTime<Utc>) -> PublishEvent {
    PublishEvent {
        client_id: client.id.clone(),
        username: client.username.clone(),
        topic: packet.topic.clone(),
        payload: packet.payload.to_vec(),
        qos: packet.qos,
        retain: packet.retain,
        timestamp,
    }
}
