//! 聚合（Aggregate）与事件来源（EventSource）
//!
//! 聚合在执行业务操作时把领域事件追加到自身的 `EventQueue`，
//! 工作单元在持久化前通过对象安全的 `EventSource` 统一收集这些事件，
//! 而无需关心具体的聚合类型。
//!
use crate::domain_event::{DomainEvent, EventContext, EventEnvelope, EventQueue, Metadata};
use crate::entity::Entity;
use chrono::Utc;

/// 可产生领域事件的聚合根
pub trait Aggregate: Entity + 'static {
    /// 聚合类型名（写入事件元数据与存储记录）
    const TYPE: &'static str;

    /// 该聚合产生的领域事件类型
    type Event: DomainEvent;

    /// 待发布事件队列
    fn events(&self) -> &EventQueue<Self::Event>;

    fn events_mut(&mut self) -> &mut EventQueue<Self::Event>;

    /// 记录一个领域事件，等待工作单元收集
    fn raise(&mut self, event: Self::Event) {
        self.events_mut().raise(event);
    }
}

/// 被跟踪实体的事件视图（对象安全）
pub trait EventSource: Send + Sync {
    fn aggregate_id(&self) -> String;

    fn aggregate_type(&self) -> &'static str;

    fn pending_event_count(&self) -> usize;

    fn has_pending_events(&self) -> bool {
        self.pending_event_count() > 0
    }

    /// 取走全部待发布事件并封装为信封，实体上的队列随即为空
    fn detach_events(&mut self, context: &EventContext) -> Vec<EventEnvelope>;
}

impl<A> EventSource for A
where
    A: Aggregate,
{
    fn aggregate_id(&self) -> String {
        self.id().to_string()
    }

    fn aggregate_type(&self) -> &'static str {
        A::TYPE
    }

    fn pending_event_count(&self) -> usize {
        self.events().len()
    }

    fn detach_events(&mut self, context: &EventContext) -> Vec<EventEnvelope> {
        let aggregate_id = self.id().to_string();
        let occurred_at = Utc::now();

        self.events_mut()
            .take()
            .into_iter()
            .map(|event| {
                let metadata = Metadata::builder()
                    .aggregate_id(aggregate_id.clone())
                    .aggregate_type(A::TYPE)
                    .occurred_at(occurred_at)
                    .build();
                EventEnvelope::new(metadata, event, context.clone())
            })
            .collect()
    }
}

/// 按枚举顺序收集所有来源上的事件：先按来源顺序，再按各自的产生顺序
pub fn harvest<'a, I>(sources: I, context: &EventContext) -> Vec<EventEnvelope>
where
    I: IntoIterator<Item = &'a mut dyn EventSource>,
{
    sources
        .into_iter()
        .filter(|source| source.has_pending_events())
        .flat_map(|source| source.detach_events(context))
        .collect()
}
