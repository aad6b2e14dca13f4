use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::ConfigError;

use super::packets::{Client, ConnectPacket, PublishPacket, SubscribePacket, UnsubscribePacket};
use super::types::{Configurable, Hook, HookDescriptor, HookEvent};

/// Broker 侧 Hook 注册中心
///
/// 只有配置成功的 Hook 才会进入注册表，因此回调不会触达未配置的 Hook。
/// 决策类事件任一 Hook 放行即放行；观测类事件投递给所有声明该能力的 Hook。
#[derive(Default)]
pub struct HookRegistry {
    hooks: RwLock<Vec<Arc<dyn Hook>>>,
}

impl HookRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 配置并注册 Hook，配置缺失、配置失败或身份重复时拒绝
    pub async fn add_hook<H>(&self, mut hook: H, config: Option<H::Config>) -> Result<(), ConfigError>
    where
        H: Hook + Configurable + 'static,
    {
        let config = config.ok_or_else(|| ConfigError::MissingConfig {
            hook: hook.id().to_string(),
        })?;
        hook.configure(config)?;
        self.register(Arc::new(hook)).await
    }

    /// 注册已完成配置的 Hook
    pub async fn register(&self, hook: Arc<dyn Hook>) -> Result<(), ConfigError> {
        let mut guard = self.hooks.write().await;
        if guard.iter().any(|existing| existing.id() == hook.id()) {
            return Err(ConfigError::DuplicateHook(hook.id().to_string()));
        }
        tracing::info!(
            hook = %hook.id(),
            capabilities = ?hook.capabilities().iter().collect::<Vec<_>>(),
            "hook registered"
        );
        guard.push(hook);
        Ok(())
    }

    pub async fn descriptors(&self) -> Vec<HookDescriptor> {
        self.hooks
            .read()
            .await
            .iter()
            .map(|hook| hook.descriptor())
            .collect()
    }

    pub async fn provides(&self, event: HookEvent) -> bool {
        self.hooks
            .read()
            .await
            .iter()
            .any(|hook| hook.provides(event))
    }

    /// 复制出声明该能力的 Hook，回调期间不持有注册表锁
    async fn providers(&self, event: HookEvent) -> Vec<Arc<dyn Hook>> {
        self.hooks
            .read()
            .await
            .iter()
            .filter(|hook| hook.provides(event))
            .cloned()
            .collect()
    }

    pub async fn on_started(&self) {
        for hook in self.providers(HookEvent::OnStarted).await {
            hook.on_started().await;
        }
    }

    pub async fn on_stopped(&self) {
        for hook in self.providers(HookEvent::OnStopped).await {
            hook.on_stopped().await;
        }
    }

    pub async fn on_connect_authenticate(&self, client: &Client, packet: &ConnectPacket) -> bool {
        for hook in self.providers(HookEvent::OnConnectAuthenticate).await {
            if hook.on_connect_authenticate(client, packet).await {
                return true;
            }
        }
        tracing::debug!(client_id = %client.id, "connect rejected by hooks");
        false
    }

    pub async fn on_acl_check(&self, client: &Client, topic: &str, write: bool) -> bool {
        for hook in self.providers(HookEvent::OnACLCheck).await {
            if hook.on_acl_check(client, topic, write).await {
                return true;
            }
        }
        tracing::debug!(client_id = %client.id, topic, write, "acl check rejected by hooks");
        false
    }

    pub async fn on_connect(&self, client: &Client, packet: &ConnectPacket) {
        for hook in self.providers(HookEvent::OnConnect).await {
            hook.on_connect(client, packet).await;
        }
    }

    pub async fn on_session_established(&self, client: &Client, packet: &ConnectPacket) {
        for hook in self.providers(HookEvent::OnSessionEstablished).await {
            hook.on_session_established(client, packet).await;
        }
    }

    pub async fn on_disconnect(&self, client: &Client, reason: Option<&str>, expire: bool) {
        for hook in self.providers(HookEvent::OnDisconnect).await {
            hook.on_disconnect(client, reason, expire).await;
        }
    }

    pub async fn on_published(&self, client: &Client, packet: &PublishPacket) {
        for hook in self.providers(HookEvent::OnPublished).await {
            hook.on_published(client, packet).await;
        }
    }

    pub async fn on_subscribed(&self, client: &Client, packet: &SubscribePacket) {
        for hook in self.providers(HookEvent::OnSubscribed).await {
            hook.on_subscribed(client, packet).await;
        }
    }

    pub async fn on_unsubscribed(&self, client: &Client, packet: &UnsubscribePacket) {
        for hook in self.providers(HookEvent::OnUnsubscribed).await {
            hook.on_unsubscribed(client, packet).await;
        }
    }

    pub async fn on_will_sent(&self, client: &Client, will: &PublishPacket) {
        for hook in self.providers(HookEvent::OnWillSent).await {
            hook.on_will_sent(client, will).await;
        }
    }
}
