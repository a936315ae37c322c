//! 领域事件（Domain Event）
//!
//! 定义事件载荷需要实现的最小接口（`DomainEvent`）、实体上的待发布队列
//! （`EventQueue`），以及收集后携带元数据与业务语境的 `EventEnvelope`。

mod domain_event_trait;
mod event_context;
mod event_envelope;
mod event_queue;
mod metadata;

pub use domain_event_trait::DomainEvent;
pub use event_context::EventContext;
pub use event_envelope::EventEnvelope;
pub use event_queue::EventQueue;
pub use metadata::Metadata;
