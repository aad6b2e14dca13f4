//! 内置 Hook 实现及其依赖的传输层、下游与事件信封

mod blocklist;
mod envelope;
mod event_fanout;
mod http_auth;
mod sink;
mod transport;

pub use blocklist::ClientBlockList;
pub use envelope::{
    ConnectEvent, DisconnectEvent, EventCategory, EventEnvelope, LifecycleEvent, PublishEvent,
    SessionEvent, SubscriptionEvent,
};
pub use event_fanout::{
    EVENT_FANOUT_HOOK_ID, EventFanoutHook, EventFanoutHookConfig, PublishErrorObserver,
};
pub use http_auth::{
    AuthDecisionOutcome, AuthDecisionRequest, HTTP_AUTH_HOOK_ID, HttpAuthHook, HttpAuthHookConfig,
};
#[cfg(feature = "kafka")]
pub use sink::KafkaBatchTransport;
pub use sink::{BatchSettings, BatchTransport, BatchingSink, EventSink};
pub use transport::{DecisionCall, DecisionMethod, DecisionTransport, ReqwestTransport};
