use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};

use crate::error::{ConfigError, TransportError};

/// 决策请求方式
///
/// `Post` 携带 JSON 请求体；`Get` 为无请求体的精简模式，仅依据状态码决策。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMethod {
    #[default]
    Post,
    Get,
}

/// 一次远程决策调用
#[derive(Debug, Clone)]
pub struct DecisionCall {
    pub method: DecisionMethod,
    pub endpoint: String,
    pub body: Option<Vec<u8>>,
}

/// 远程决策服务传输层，只关心往返后的状态码
#[async_trait]
pub trait DecisionTransport: Send + Sync {
    async fn round_trip(&self, call: DecisionCall) -> Result<u16, TransportError>;
}

/// 基于 reqwest 的默认传输实现，超时在此处配置
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|err| ConfigError::Invalid(format!("failed to build http client: {err}")))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DecisionTransport for ReqwestTransport {
    async fn round_trip(&self, call: DecisionCall) -> Result<u16, TransportError> {
        let method = match call.method {
            DecisionMethod::Post => Method::POST,
            DecisionMethod::Get => Method::GET,
        };

        let mut builder = self.client.request(method, &call.endpoint);
        if let Some(body) = call.body {
            builder = builder.header("content-type", "application/json").body(body);
        }

        let response = builder.send().await?;
        Ok(response.status().as_u16())
    }
}
