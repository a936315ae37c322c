use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;

/// 领域事件载荷需要满足的通用能力边界
pub trait DomainEvent: Clone + PartialEq + fmt::Debug + Serialize + Send + Sync + 'static {
    /// 事件唯一标识
    fn event_id(&self) -> &str;

    /// 事件类型（形如 `OrderEvent.Placed` 或自定义类型名）
    fn event_type(&self) -> &str;

    /// 事件载荷版本
    fn event_version(&self) -> usize;
}

/// 类型擦除后的事件，供跨聚合类型的收集与分发使用
pub(crate) trait ErasedEvent: fmt::Debug + Send + Sync {
    fn erased_event_id(&self) -> &str;

    fn erased_event_type(&self) -> &str;

    fn erased_event_version(&self) -> usize;

    fn to_payload(&self) -> serde_json::Result<Value>;

    fn as_any(&self) -> &dyn Any;
}

impl<E> ErasedEvent for E
where
    E: DomainEvent,
{
    fn erased_event_id(&self) -> &str {
        DomainEvent::event_id(self)
    }

    fn erased_event_type(&self) -> &str {
        DomainEvent::event_type(self)
    }

    fn erased_event_version(&self) -> usize {
        DomainEvent::event_version(self)
    }

    fn to_payload(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
