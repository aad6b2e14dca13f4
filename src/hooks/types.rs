use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::packets::{Client, ConnectPacket, PublishPacket, SubscribePacket, UnsubscribePacket};

/// Broker 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    OnStarted,
    OnStopped,
    OnConnectAuthenticate,
    OnACLCheck,
    OnConnect,
    OnSessionEstablished,
    OnDisconnect,
    OnPublished,
    OnSubscribed,
    OnUnsubscribed,
    OnWillSent,
}

impl HookEvent {
    pub const ALL: [HookEvent; 11] = [
        HookEvent::OnStarted,
        HookEvent::OnStopped,
        HookEvent::OnConnectAuthenticate,
        HookEvent::OnACLCheck,
        HookEvent::OnConnect,
        HookEvent::OnSessionEstablished,
        HookEvent::OnDisconnect,
        HookEvent::OnPublished,
        HookEvent::OnSubscribed,
        HookEvent::OnUnsubscribed,
        HookEvent::OnWillSent,
    ];

    const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// 决策类事件（回调返回 bool 并影响 Broker 行为）
    pub fn is_decision(self) -> bool {
        matches!(self, HookEvent::OnConnectAuthenticate | HookEvent::OnACLCheck)
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Hook 声明的事件能力集合（位掩码）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Capabilities(u32);

impl Capabilities {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn of(events: &[HookEvent]) -> Self {
        events
            .iter()
            .fold(Self::empty(), |caps, event| caps.with(*event))
    }

    pub const fn with(self, event: HookEvent) -> Self {
        Self(self.0 | event.bit())
    }

    pub fn insert(&mut self, event: HookEvent) {
        self.0 |= event.bit();
    }

    pub const fn contains(&self, event: HookEvent) -> bool {
        self.0 & event.bit() != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = HookEvent> + '_ {
        HookEvent::ALL
            .into_iter()
            .filter(move |event| self.contains(*event))
    }
}

/// Hook 描述信息（注册后不可变）
#[derive(Debug, Clone)]
pub struct HookDescriptor {
    pub id: Arc<str>,
    pub capabilities: Capabilities,
}

/// Broker 扩展 Hook
///
/// Broker 通过 [`Hook::provides`] 判断是否投递某类事件；未覆盖的回调为空实现，
/// 决策类回调默认拒绝。回调可能被并发调用。
#[async_trait]
pub trait Hook: Send + Sync {
    fn id(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn provides(&self, event: HookEvent) -> bool {
        self.capabilities().contains(event)
    }

    fn descriptor(&self) -> HookDescriptor {
        HookDescriptor {
            id: Arc::from(self.id()),
            capabilities: self.capabilities(),
        }
    }

    async fn on_started(&self) {}

    async fn on_stopped(&self) {}

    async fn on_connect_authenticate(&self, _client: &Client, _packet: &ConnectPacket) -> bool {
        false
    }

    async fn on_acl_check(&self, _client: &Client, _topic: &str, _write: bool) -> bool {
        false
    }

    async fn on_connect(&self, _client: &Client, _packet: &ConnectPacket) {}

    async fn on_session_established(&self, _client: &Client, _packet: &ConnectPacket) {}

    async fn on_disconnect(&self, _client: &Client, _reason: Option<&str>, _expire: bool) {}

    async fn on_published(&self, _client: &Client, _packet: &PublishPacket) {}

    async fn on_subscribed(&self, _client: &Client, _packet: &SubscribePacket) {}

    async fn on_unsubscribed(&self, _client: &Client, _packet: &UnsubscribePacket) {}

    async fn on_will_sent(&self, _client: &Client, _will: &PublishPacket) {}
}

/// 一次性类型化配置
pub trait Configurable {
    type Config;

    fn configure(&mut self, config: Self::Config) -> Result<(), ConfigError>;
}

#[async_trait]
impl<T> Hook for Arc<T>
where
    T: Hook + ?Sized,
{
    fn id(&self) -> &str {
        (**self).id()
    }

    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn provides(&self, event: HookEvent) -> bool {
        (**self).provides(event)
    }

    async fn on_started(&self) {
        (**self).on_started().await
    }

    async fn on_stopped(&self) {
        (**self).on_stopped().await
    }

    async fn on_connect_authenticate(&self, client: &Client, packet: &ConnectPacket) -> bool {
        (**self).on_connect_authenticate(client, packet).await
    }

    async fn on_acl_check(&self, client: &Client, topic: &str, write: bool) -> bool {
        (**self).on_acl_check(client, topic, write).await
    }

    async fn on_connect(&self, client: &Client, packet: &ConnectPacket) {
        (**self).on_connect(client, packet).await
    }

    async fn on_session_established(&self, client: &Client, packet: &ConnectPacket) {
        (**self).on_session_established(client, packet).await
    }

    async fn on_disconnect(&self, client: &Client, reason: Option<&str>, expire: bool) {
        (**self).on_disconnect(client, reason, expire).await
    }

    async fn on_published(&self, client: &Client, packet: &PublishPacket) {
        (**self).on_published(client, packet).await
    }

    async fn on_subscribed(&self, client: &Client, packet: &SubscribePacket) {
        (**self).on_subscribed(client, packet).await
    }

    async fn on_unsubscribed(&self, client: &Client, packet: &UnsubscribePacket) {
        (**self).on_unsubscribed(client, packet).await
    }

    async fn on_will_sent(&self, client: &Client, will: &PublishPacket) {
        (**self).on_will_sent(client, will).await
    }
}
