//! Broker 在回调中传入的客户端与报文视图
//!
//! 只保留 Hook 需要读取的字段，报文解析由 Broker 完成。

use bytes::Bytes;

/// 已连接（或正在连接）的客户端
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub username: String,
    pub remote_addr: Option<String>,
}

impl Client {
    pub fn new<T: Into<String>>(id: T) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_username<T: Into<String>>(mut self, username: T) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_remote_addr<T: Into<String>>(mut self, addr: T) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }
}

/// CONNECT 报文中的凭据部分
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectPacket {
    pub username: String,
    pub password: Bytes,
    pub clean_start: bool,
    pub keepalive: u16,
}

impl ConnectPacket {
    pub fn new<U: Into<String>, P: Into<Bytes>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            clean_start: true,
            keepalive: 60,
        }
    }
}

/// PUBLISH 报文（也用于遗嘱消息）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishPacket {
    pub topic: String,
    pub payload: Bytes,
    pub qos: u8,
    pub retain: bool,
}

impl PublishPacket {
    pub fn new<T: Into<String>, P: Into<Bytes>>(topic: T, payload: P) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos: 0,
            retain: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub filter: String,
    pub qos: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscribePacket {
    pub filters: Vec<SubscriptionFilter>,
}

impl SubscribePacket {
    pub fn single<T: Into<String>>(filter: T, qos: u8) -> Self {
        Self {
            filters: vec![SubscriptionFilter {
                filter: filter.into(),
                qos,
            }],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnsubscribePacket {
    pub filters: Vec<String>,
}
