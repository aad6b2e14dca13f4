//! MQTT Broker Hook 扩展模块
//!
//! - 定义 Hook 契约：身份、声明的事件能力、一次性类型化配置与事件回调
//! - 提供 Broker 侧的 Hook 注册与按能力分发
//! - 内置远程认证鉴权 Hook 与事件分发 Hook

pub mod adapters;
mod packets;
mod registry;
mod types;

pub use adapters::{
    AuthDecisionOutcome, AuthDecisionRequest, BatchSettings, BatchTransport, BatchingSink,
    ClientBlockList, DecisionCall, DecisionMethod, DecisionTransport, EventCategory,
    EventEnvelope, EventFanoutHook, EventFanoutHookConfig, EventSink, HttpAuthHook,
    HttpAuthHookConfig, PublishErrorObserver, ReqwestTransport,
};
pub use packets::{
    Client, ConnectPacket, PublishPacket, SubscribePacket, SubscriptionFilter, UnsubscribePacket,
};
pub use registry::HookRegistry;
pub use types::{Capabilities, Configurable, Hook, HookDescriptor, HookEvent};
