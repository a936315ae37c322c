//! 进程内事件分发器（InMemoryEventDispatcher）
//!
//! 按事件类型匹配已注册的处理器，并发执行；全部处理器执行完毕后，
//! 若有任一失败则以 `DomainError::EventDispatch` 汇报。
//!
use super::handler::HandledEventType;
use super::{EventDispatcher, EventHandler};
use crate::domain_event::EventEnvelope;
use crate::error::{DomainError, DomainResult as Result};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::future::join_all;
use std::sync::Arc;

/// 基于内存注册表的事件分发器
#[derive(Default)]
pub struct InMemoryEventDispatcher {
    by_type: DashMap<String, Vec<Arc<dyn EventHandler>>>,
    all: DashMap<String, Arc<dyn EventHandler>>,
}

impl InMemoryEventDispatcher {
    pub fn new(handlers: Vec<Arc<dyn EventHandler>>) -> Self {
        let dispatcher = Self::default();
        for h in handlers {
            dispatcher.register(h);
        }
        dispatcher
    }

    /// 注册处理器
    pub fn register(&self, handler: Arc<dyn EventHandler>) {
        match handler.handled_event_type() {
            HandledEventType::All => {
                self.all.insert(handler.handler_name().to_string(), handler);
            }
            HandledEventType::One(t) => {
                self.by_type.entry(t).or_default().push(handler);
            }
            HandledEventType::Many(ts) => {
                for t in ts {
                    self.by_type.entry(t).or_default().push(handler.clone());
                }
            }
        }
    }

    fn matching(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        let mut merged: Vec<Arc<dyn EventHandler>> = Vec::new();
        if let Some(list) = self.by_type.get(event_type) {
            merged.extend(list.iter().cloned());
        }
        merged.extend(self.all.iter().map(|entry| entry.value().clone()));
        merged
    }
}

#[async_trait]
impl EventDispatcher for InMemoryEventDispatcher {
    async fn publish(&self, event: &EventEnvelope) -> Result<()> {
        let handlers = self.matching(event.event_type());
        if handlers.is_empty() {
            return Ok(());
        }

        let outcomes = join_all(handlers.iter().map(|h| h.handle(event))).await;
        let failures: Vec<String> = handlers
            .iter()
            .zip(outcomes)
            .filter_map(|(h, outcome)| {
                let err = outcome.err()?;
                tracing::warn!(
                    handler = h.handler_name(),
                    event_id = event.event_id(),
                    event_type = event.event_type(),
                    error = %err,
                    "event handler failed"
                );
                Some(format!("{}: {err}", h.handler_name()))
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(DomainError::EventDispatch {
                event_type: event.event_type().to_string(),
                reason: failures.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::{DomainEvent, EventContext, Metadata};
    use serde::Serialize;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Ping {
        id: String,
        kind: &'static str,
    }

    impl DomainEvent for Ping {
        fn event_id(&self) -> &str {
            &self.id
        }
        fn event_type(&self) -> &str {
            self.kind
        }
        fn event_version(&self) -> usize {
            1
        }
    }

    struct SpyHandler {
        name: &'static str,
        types: HandledEventType,
        fail: bool,
        handled: AtomicUsize,
    }

    impl SpyHandler {
        fn new(name: &'static str, types: HandledEventType, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                types,
                fail,
                handled: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl EventHandler for SpyHandler {
        fn handler_name(&self) -> &str {
            self.name
        }
        fn handled_event_type(&self) -> HandledEventType {
            self.types.clone()
        }
        async fn handle(&self, event: &EventEnvelope) -> Result<()> {
            self.handled.fetch_add(1, Ordering::SeqCst);
            assert!(event.downcast_ref::<Ping>().is_some());
            if self.fail {
                return Err(DomainError::EventHandler {
                    handler: self.name.into(),
                    reason: "fail requested".into(),
                });
            }
            Ok(())
        }
    }

    fn ping(kind: &'static str) -> EventEnvelope {
        EventEnvelope::new(
            Metadata::builder()
                .aggregate_id("p-1")
                .aggregate_type("pinger")
                .build(),
            Ping {
                id: ulid::Ulid::new().to_string(),
                kind,
            },
            EventContext::default(),
        )
    }

    #[tokio::test]
    async fn routes_by_type_and_wildcard() {
        let one = SpyHandler::new("one", HandledEventType::One("Ping".into()), false);
        let many = SpyHandler::new(
            "many",
            HandledEventType::Many(vec!["Ping".into(), "Pong".into()]),
            false,
        );
        let all = SpyHandler::new("all", HandledEventType::All, false);
        let dispatcher = InMemoryEventDispatcher::new(vec![one.clone(), many.clone(), all.clone()]);

        dispatcher.publish(&ping("Ping")).await.unwrap();
        dispatcher.publish(&ping("Pong")).await.unwrap();
        dispatcher.publish(&ping("Other")).await.unwrap();

        assert_eq!(one.handled.load(Ordering::SeqCst), 1);
        assert_eq!(many.handled.load(Ordering::SeqCst), 2);
        assert_eq!(all.handled.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failure_is_reported_after_every_handler_ran() {
        let bad = SpyHandler::new("bad", HandledEventType::One("Ping".into()), true);
        let good = SpyHandler::new("good", HandledEventType::All, false);
        let dispatcher = InMemoryEventDispatcher::new(vec![bad.clone(), good.clone()]);

        let err = dispatcher.publish(&ping("Ping")).await.unwrap_err();
        match err {
            DomainError::EventDispatch { event_type, reason } => {
                assert_eq!(event_type, "Ping");
                assert!(reason.contains("bad"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(bad.handled.load(Ordering::SeqCst), 1);
        assert_eq!(good.handled.load(Ordering::SeqCst), 1);
    }
}
