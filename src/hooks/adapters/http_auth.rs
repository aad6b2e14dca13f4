//! 远程认证 / ACL 鉴权 Hook
//!
//! 连接认证与主题读写鉴权均委托给外部决策服务，以响应状态码作为唯一决策依据：
//! - 2xx 放行
//! - 401 / 403 拒绝，配置了封禁时长时同时封禁该客户端
//! - 其他状态码或传输失败一律拒绝（fail-closed）

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::error::{ConfigError, TransportError};

use super::super::packets::{Client, ConnectPacket};
use super::super::types::{Capabilities, Configurable, Hook, HookEvent};
use super::blocklist::ClientBlockList;
use super::transport::{DecisionCall, DecisionMethod, DecisionTransport, ReqwestTransport};

pub const HTTP_AUTH_HOOK_ID: &str = "http-auth-hook";

const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3_000);

/// 远程决策请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AuthDecisionRequest<'a> {
    Connect {
        client_id: &'a str,
        username: &'a str,
        password: Cow<'a, str>,
    },
    Acl {
        username: &'a str,
        client_id: &'a str,
        topic: &'a str,
        access: &'static str,
    },
}

impl<'a> AuthDecisionRequest<'a> {
    pub fn connect(client: &'a Client, packet: &'a ConnectPacket) -> Self {
        AuthDecisionRequest::Connect {
            client_id: &client.id,
            username: &packet.username,
            password: String::from_utf8_lossy(&packet.password),
        }
    }

    pub fn acl(client: &'a Client, topic: &'a str, write: bool) -> Self {
        AuthDecisionRequest::Acl {
            username: &client.username,
            client_id: &client.id,
            topic,
            access: if write { "true" } else { "false" },
        }
    }
}

/// 远程决策结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecisionOutcome {
    Allow,
    Deny,
    DenyAndBlock,
}

impl AuthDecisionOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => AuthDecisionOutcome::Allow,
            401 | 403 => AuthDecisionOutcome::DenyAndBlock,
            _ => AuthDecisionOutcome::Deny,
        }
    }

    pub fn is_allowed(self) -> bool {
        matches!(self, AuthDecisionOutcome::Allow)
    }
}

/// 远程鉴权 Hook 配置
#[derive(Clone)]
pub struct HttpAuthHookConfig {
    pub connect_endpoint: String,
    pub acl_endpoint: String,
    /// 401/403 后的封禁时长，未配置时不分配封禁表
    pub block_duration: Option<Duration>,
    pub method: DecisionMethod,
    /// 注入的传输层；为空时按 `timeout` 构建默认 reqwest 客户端
    pub transport: Option<Arc<dyn DecisionTransport>>,
    pub timeout: Duration,
}

impl HttpAuthHookConfig {
    pub fn new<C: Into<String>, A: Into<String>>(connect_endpoint: C, acl_endpoint: A) -> Self {
        Self {
            connect_endpoint: connect_endpoint.into(),
            acl_endpoint: acl_endpoint.into(),
            block_duration: None,
            method: DecisionMethod::Post,
            transport: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_block_duration(mut self, duration: Duration) -> Self {
        self.block_duration = Some(duration);
        self
    }

    pub fn with_method(mut self, method: DecisionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn DecisionTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        validate_endpoint("connect_endpoint", &self.connect_endpoint)?;
        validate_endpoint("acl_endpoint", &self.acl_endpoint)?;
        if self.block_duration == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid(
                "block_duration must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for HttpAuthHookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpAuthHookConfig")
            .field("connect_endpoint", &self.connect_endpoint)
            .field("acl_endpoint", &self.acl_endpoint)
            .field("block_duration", &self.block_duration)
            .field("method", &self.method)
            .field("transport", &self.transport.as_ref().map(|_| "custom"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn validate_endpoint(field: &'static str, endpoint: &str) -> Result<(), ConfigError> {
    if endpoint.trim().is_empty() {
        return Err(ConfigError::InvalidEndpoint {
            field,
            reason: "endpoint is empty".to_string(),
        });
    }
    let url = Url::parse(endpoint).map_err(|err| ConfigError::InvalidEndpoint {
        field,
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidEndpoint {
            field,
            reason: format!("unsupported scheme `{other}`"),
        }),
    }
}

/// 未配置时的占位传输，任何调用都失败，从而保持 fail-closed
struct UnconfiguredTransport;

#[async_trait]
impl DecisionTransport for UnconfiguredTransport {
    async fn round_trip(&self, _call: DecisionCall) -> Result<u16, TransportError> {
        Err(TransportError::Request("hook is not configured".to_string()))
    }
}

/// 远程认证 / ACL 鉴权 Hook
pub struct HttpAuthHook {
    connect_endpoint: String,
    acl_endpoint: String,
    method: DecisionMethod,
    transport: Arc<dyn DecisionTransport>,
    blocklist: Option<ClientBlockList>,
}

impl Default for HttpAuthHook {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpAuthHook {
    pub fn new() -> Self {
        Self {
            connect_endpoint: String::new(),
            acl_endpoint: String::new(),
            method: DecisionMethod::Post,
            transport: Arc::new(UnconfiguredTransport),
            blocklist: None,
        }
    }

    pub fn blocklist(&self) -> Option<&ClientBlockList> {
        self.blocklist.as_ref()
    }

    async fn check(&self, client_id: &str, endpoint: &str, request: AuthDecisionRequest<'_>) -> bool {
        if let Some(blocklist) = &self.blocklist {
            if blocklist.is_blocked(client_id).await {
                tracing::debug!(hook = HTTP_AUTH_HOOK_ID, client_id, "client blocked, deny without remote call");
                return false;
            }
        }

        let body = match self.method {
            DecisionMethod::Post => match serde_json::to_vec(&request) {
                Ok(body) => Some(body),
                Err(err) => {
                    tracing::error!(hook = HTTP_AUTH_HOOK_ID, client_id, error = %err, "failed to encode decision request");
                    return false;
                }
            },
            DecisionMethod::Get => None,
        };

        let call = DecisionCall {
            method: self.method,
            endpoint: endpoint.to_string(),
            body,
        };
        let status = match self.transport.round_trip(call).await {
            Ok(status) => status,
            Err(err) => {
                tracing::error!(
                    hook = HTTP_AUTH_HOOK_ID,
                    client_id,
                    endpoint,
                    error = %err,
                    "decision request failed, deny"
                );
                return false;
            }
        };

        let outcome = AuthDecisionOutcome::from_status(status);
        match outcome {
            AuthDecisionOutcome::Allow => {}
            AuthDecisionOutcome::Deny => {
                tracing::debug!(hook = HTTP_AUTH_HOOK_ID, client_id, endpoint, status, "decision denied");
            }
            AuthDecisionOutcome::DenyAndBlock => {
                if let Some(blocklist) = &self.blocklist {
                    blocklist.block(client_id).await;
                    tracing::warn!(
                        hook = HTTP_AUTH_HOOK_ID,
                        client_id,
                        status,
                        block_secs = blocklist.duration().as_secs_f64(),
                        "decision denied, client blocked"
                    );
                } else {
                    tracing::debug!(hook = HTTP_AUTH_HOOK_ID, client_id, endpoint, status, "decision denied");
                }
            }
        }
        outcome.is_allowed()
    }
}

impl Configurable for HttpAuthHook {
    type Config = HttpAuthHookConfig;

    fn configure(&mut self, config: HttpAuthHookConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let transport: Arc<dyn DecisionTransport> = match config.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(config.timeout)?),
        };

        self.connect_endpoint = config.connect_endpoint;
        self.acl_endpoint = config.acl_endpoint;
        self.method = config.method;
        self.transport = transport;
        self.blocklist = config.block_duration.map(ClientBlockList::new);

        tracing::info!(
            hook = HTTP_AUTH_HOOK_ID,
            connect_endpoint = %self.connect_endpoint,
            acl_endpoint = %self.acl_endpoint,
            blocking = self.blocklist.is_some(),
            "http auth hook configured"
        );
        Ok(())
    }
}

#[async_trait]
impl Hook for HttpAuthHook {
    fn id(&self) -> &str {
        HTTP_AUTH_HOOK_ID
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::of(&[HookEvent::OnConnectAuthenticate, HookEvent::OnACLCheck])
    }

    async fn on_connect_authenticate(&self, client: &Client, packet: &ConnectPacket) -> bool {
        let request = AuthDecisionRequest::connect(client, packet);
        self.check(&client.id, &self.connect_endpoint, request).await
    }

    async fn on_acl_check(&self, client: &Client, topic: &str, write: bool) -> bool {
        let request = AuthDecisionRequest::acl(client, topic, write);
        self.check(&client.id, &self.acl_endpoint, request).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    const CONNECT_HOST: &str = "http://clientauthenticationhost.com";
    const ACL_HOST: &str = "http://aclhost.com";

    /// 按脚本返回状态码并记录调用
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<u16, TransportError>>>,
        calls: Mutex<Vec<DecisionCall>>,
    }

    impl ScriptedTransport {
        fn with(responses: Vec<Result<u16, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn last_call(&self) -> DecisionCall {
            self.calls.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl DecisionTransport for ScriptedTransport {
        async fn round_trip(&self, call: DecisionCall) -> Result<u16, TransportError> {
            self.calls.lock().unwrap().push(call);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(200))
        }
    }

    fn configured(transport: Arc<ScriptedTransport>, block: Option<Duration>) -> HttpAuthHook {
        let mut config = HttpAuthHookConfig::new(CONNECT_HOST, ACL_HOST).with_transport(transport);
        if let Some(duration) = block {
            config = config.with_block_duration(duration);
        }
        let mut hook = HttpAuthHook::new();
        hook.configure(config).unwrap();
        hook
    }

    fn client() -> Client {
        Client::new("default_client_id").with_username("alice")
    }

    #[test]
    fn test_id_and_provides() {
        let hook = HttpAuthHook::new();
        assert_eq!(hook.id(), "http-auth-hook");
        assert!(hook.provides(HookEvent::OnACLCheck));
        assert!(hook.provides(HookEvent::OnConnectAuthenticate));
        assert!(!hook.provides(HookEvent::OnPublished));

        let configured = configured(ScriptedTransport::with(vec![]), None);
        assert_eq!(hook.capabilities(), configured.capabilities());
    }

    #[test]
    fn test_status_contract() {
        assert_eq!(AuthDecisionOutcome::from_status(200), AuthDecisionOutcome::Allow);
        assert_eq!(AuthDecisionOutcome::from_status(204), AuthDecisionOutcome::Allow);
        assert_eq!(AuthDecisionOutcome::from_status(401), AuthDecisionOutcome::DenyAndBlock);
        assert_eq!(AuthDecisionOutcome::from_status(403), AuthDecisionOutcome::DenyAndBlock);
        assert_eq!(AuthDecisionOutcome::from_status(418), AuthDecisionOutcome::Deny);
        assert_eq!(AuthDecisionOutcome::from_status(500), AuthDecisionOutcome::Deny);
        assert_eq!(AuthDecisionOutcome::from_status(302), AuthDecisionOutcome::Deny);
    }

    #[test]
    fn test_configure_rejects_missing_endpoints() {
        let mut hook = HttpAuthHook::new();
        let err = hook
            .configure(HttpAuthHookConfig::new("", ACL_HOST))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { field: "connect_endpoint", .. }));

        let err = hook
            .configure(HttpAuthHookConfig::new(CONNECT_HOST, "not a url"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { field: "acl_endpoint", .. }));

        let err = hook
            .configure(HttpAuthHookConfig::new(CONNECT_HOST, "ftp://aclhost.com"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_configure_rejects_zero_block_duration() {
        let mut hook = HttpAuthHook::new();
        let config = HttpAuthHookConfig::new(CONNECT_HOST, ACL_HOST)
            .with_transport(ScriptedTransport::with(vec![]))
            .with_block_duration(Duration::ZERO);
        assert!(matches!(hook.configure(config), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_configure_rejects_zero_timeout() {
        let mut hook = HttpAuthHook::new();
        let config = HttpAuthHookConfig::new(CONNECT_HOST, ACL_HOST).with_timeout(Duration::ZERO);
        let err = hook.configure(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref reason) if reason.contains("timeout")));
    }

    #[test]
    fn test_blocklist_only_allocated_when_configured() {
        let hook = configured(ScriptedTransport::with(vec![]), None);
        assert!(hook.blocklist().is_none());

        let hook = configured(ScriptedTransport::with(vec![]), Some(Duration::from_secs(60)));
        assert!(hook.blocklist().is_some());
    }

    #[tokio::test]
    async fn test_unconfigured_hook_fails_closed() {
        let hook = HttpAuthHook::new();
        assert!(!hook.on_connect_authenticate(&client(), &ConnectPacket::default()).await);
        assert!(!hook.on_acl_check(&client(), "/topic", false).await);
    }

    #[tokio::test]
    async fn test_connect_allowed_on_200() {
        let transport = ScriptedTransport::with(vec![Ok(200)]);
        let hook = configured(transport.clone(), None);

        let packet = ConnectPacket::new("alice", "s3cret");
        assert!(hook.on_connect_authenticate(&client(), &packet).await);

        let call = transport.last_call();
        assert_eq!(call.endpoint, CONNECT_HOST);
        assert_eq!(call.method, DecisionMethod::Post);
        let body: serde_json::Value = serde_json::from_slice(&call.body.unwrap()).unwrap();
        assert_eq!(body["client_id"], "default_client_id");
        assert_eq!(body["username"], "alice");
        assert_eq!(body["password"], "s3cret");
    }

    #[tokio::test]
    async fn test_connect_denied_on_transport_error_and_non_2xx() {
        let transport = ScriptedTransport::with(vec![
            Err(TransportError::Request("connection refused".into())),
            Ok(418),
        ]);
        let hook = configured(transport.clone(), Some(Duration::from_secs(60)));

        let packet = ConnectPacket::default();
        assert!(!hook.on_connect_authenticate(&client(), &packet).await);
        assert!(!hook.on_connect_authenticate(&client(), &packet).await);
        assert_eq!(transport.call_count(), 2);
        // 非 401/403 不触发封禁
        assert!(hook.blocklist().unwrap().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_unauthorized_blocks_client() {
        let transport = ScriptedTransport::with(vec![Ok(401), Ok(200)]);
        let hook = configured(transport.clone(), Some(Duration::from_secs(60)));
        let packet = ConnectPacket::new("alice", "wrong");

        assert!(!hook.on_connect_authenticate(&client(), &packet).await);
        assert_eq!(transport.call_count(), 1);

        // 封禁窗口内直接拒绝，不发起远程调用
        assert!(!hook.on_connect_authenticate(&client(), &packet).await);
        assert!(!hook.on_acl_check(&client(), "/topic", true).await);
        assert_eq!(transport.call_count(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(hook.on_connect_authenticate(&client(), &packet).await);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_forbidden_without_block_duration_keeps_calling() {
        let transport = ScriptedTransport::with(vec![Ok(403), Ok(403)]);
        let hook = configured(transport.clone(), None);

        assert!(!hook.on_acl_check(&client(), "/topic", false).await);
        assert!(!hook.on_acl_check(&client(), "/topic", false).await);
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_acl_payload() {
        let transport = ScriptedTransport::with(vec![Ok(200), Ok(200)]);
        let hook = configured(transport.clone(), None);

        assert!(hook.on_acl_check(&client(), "sensors/1", true).await);
        let call = transport.last_call();
        assert_eq!(call.endpoint, ACL_HOST);
        let body: serde_json::Value = serde_json::from_slice(&call.body.unwrap()).unwrap();
        assert_eq!(body["username"], "alice");
        assert_eq!(body["client_id"], "default_client_id");
        assert_eq!(body["topic"], "sensors/1");
        assert_eq!(body["access"], "true");

        assert!(hook.on_acl_check(&client(), "sensors/1", false).await);
        let body: serde_json::Value =
            serde_json::from_slice(&transport.last_call().body.unwrap()).unwrap();
        assert_eq!(body["access"], "false");
    }

    #[tokio::test]
    async fn test_acl_denied_on_transport_error() {
        let transport =
            ScriptedTransport::with(vec![Err(TransportError::Request("unreachable".into()))]);
        let hook = configured(transport, None);
        assert!(!hook.on_acl_check(&client(), "/topic", false).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_block_is_cleared() {
        let transport = ScriptedTransport::with(vec![Ok(403), Ok(200)]);
        let hook = configured(transport.clone(), Some(Duration::from_micros(1)));

        assert!(!hook.on_acl_check(&client(), "/topic", false).await);
        tokio::time::advance(Duration::from_millis(1)).await;

        assert!(hook.on_acl_check(&client(), "/topic", false).await);
        assert_eq!(transport.call_count(), 2);
        assert!(hook.blocklist().unwrap().is_empty().await);
    }

    #[tokio::test]
    async fn test_get_mode_sends_no_body() {
        let transport = ScriptedTransport::with(vec![Ok(204)]);
        let mut hook = HttpAuthHook::new();
        hook.configure(
            HttpAuthHookConfig::new(CONNECT_HOST, ACL_HOST)
                .with_method(DecisionMethod::Get)
                .with_transport(transport.clone()),
        )
        .unwrap();

        assert!(hook.on_acl_check(&client(), "/topic", false).await);
        let call = transport.last_call();
        assert_eq!(call.method, DecisionMethod::Get);
        assert!(call.body.is_none());
    }
}
