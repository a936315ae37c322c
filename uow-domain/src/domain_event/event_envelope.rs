use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::domain_event_trait::{DomainEvent, ErasedEvent};
use super::event_context::EventContext;
use super::metadata::Metadata;

/// 事件信封：从实体上收集后的领域事件
///
/// 载荷以类型擦除形式保存，使不同聚合类型的事件可以放在同一批次中分发；
/// 进程内订阅者可以通过 `downcast_ref` 取回具体事件类型。
#[derive(Clone)]
pub struct EventEnvelope {
    pub metadata: Metadata,
    pub context: EventContext,
    payload: Arc<dyn ErasedEvent>,
}

impl EventEnvelope {
    pub fn new<E>(metadata: Metadata, payload: E, context: EventContext) -> Self
    where
        E: DomainEvent,
    {
        Self {
            metadata,
            context,
            payload: Arc::new(payload),
        }
    }

    pub fn event_id(&self) -> &str {
        self.payload.erased_event_id()
    }

    pub fn event_type(&self) -> &str {
        self.payload.erased_event_type()
    }

    pub fn event_version(&self) -> usize {
        self.payload.erased_event_version()
    }

    pub fn aggregate_id(&self) -> &str {
        self.metadata.aggregate_id()
    }

    pub fn aggregate_type(&self) -> &str {
        self.metadata.aggregate_type()
    }

    /// 将载荷序列化为 JSON
    pub fn to_payload(&self) -> serde_json::Result<Value> {
        self.payload.to_payload()
    }

    /// 还原为具体事件类型；类型不符时返回 `None`
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: DomainEvent,
    {
        self.payload.as_any().downcast_ref::<E>()
    }
}

impl fmt::Debug for EventEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEnvelope")
            .field("metadata", &self.metadata)
            .field("context", &self.context)
            .field("payload", &self.payload)
            .finish()
    }
}
