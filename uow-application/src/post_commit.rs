//! 提交后阶段：分发事件并写入事件存储
//!
//! 只在数据库事务提交成功之后运行。所有事件并发分发并全部等待完成；
//! 任一分发失败时不写事件存储，已提交的行状态保持不变。
//!
use crate::error::{AppError, AppResult};
use futures_util::future::join_all;
use uow_domain::domain_event::EventEnvelope;
use uow_domain::error::DomainError;
use uow_domain::eventing::EventDispatcher;
use uow_domain::persist::{EventRecord, EventStoreWriter};

pub async fn dispatch_and_store(
    dispatcher: &dyn EventDispatcher,
    store: &dyn EventStoreWriter,
    events: &[EventEnvelope],
    records: Vec<EventRecord>,
) -> AppResult<()> {
    if events.is_empty() {
        return Ok(());
    }
    debug_assert_eq!(events.len(), records.len());

    let results = join_all(events.iter().map(|event| dispatcher.publish(event))).await;
    let errors: Vec<DomainError> = results.into_iter().filter_map(Result::err).collect();
    if !errors.is_empty() {
        return Err(AppError::Dispatch {
            total: events.len(),
            errors,
        });
    }

    store.append(records).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde::Serialize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uow_domain::domain_event::{DomainEvent, EventContext, Metadata};
    use uow_domain::error::DomainResult;
    use uow_domain::persist::{InMemoryEventStore, to_records};

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Pinged {
        id: String,
    }

    impl DomainEvent for Pinged {
        fn event_id(&self) -> &str {
            &self.id
        }
        fn event_type(&self) -> &str {
            "Pinged"
        }
        fn event_version(&self) -> usize {
            1
        }
    }

    #[derive(Default)]
    struct CountingDispatcher {
        calls: AtomicUsize,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl EventDispatcher for CountingDispatcher {
        async fn publish(&self, event: &EventEnvelope) -> DomainResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.as_deref() == Some(event.event_id()) {
                return Err(DomainError::EventDispatch {
                    event_type: event.event_type().to_string(),
                    reason: "subscriber unavailable".into(),
                });
            }
            Ok(())
        }
    }

    fn envelopes(n: usize) -> Vec<EventEnvelope> {
        (0..n)
            .map(|i| {
                EventEnvelope::new(
                    Metadata::builder()
                        .aggregate_id("p-1")
                        .aggregate_type("probe")
                        .build(),
                    Pinged {
                        id: format!("ev-{i}"),
                    },
                    EventContext::default(),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_batch_touches_nothing() {
        let dispatcher = CountingDispatcher::default();
        let store = InMemoryEventStore::new();
        dispatch_and_store(&dispatcher, &store, &[], Vec::new())
            .await
            .unwrap();
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn all_events_dispatched_then_stored_in_one_append() {
        let dispatcher = Arc::new(CountingDispatcher::default());
        let store = InMemoryEventStore::new();
        let events = envelopes(3);
        let records = to_records(&events).unwrap();

        dispatch_and_store(dispatcher.as_ref(), &store, &events, records)
            .await
            .unwrap();

        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
        let stored: Vec<String> = store
            .records()
            .await
            .iter()
            .map(|r| r.event_id().to_string())
            .collect();
        assert_eq!(stored, vec!["ev-0", "ev-1", "ev-2"]);
    }

    #[tokio::test]
    async fn one_failure_skips_the_store_but_every_event_is_attempted() {
        let dispatcher = CountingDispatcher {
            fail_on: Some("ev-0".into()),
            ..Default::default()
        };
        let store = InMemoryEventStore::new();
        let events = envelopes(3);
        let records = to_records(&events).unwrap();

        let err = dispatch_and_store(&dispatcher, &store, &events, records)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Dispatch { total: 3, ref errors } if errors.len() == 1));
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 3);
        assert!(store.is_empty().await);
    }
}
