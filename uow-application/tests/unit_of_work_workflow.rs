mod support;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use support::{Customer, Order, harness, order_id};
use tokio_util::sync::CancellationToken;
use uow_application::{DataContext, EntryState, InMemoryDataContext, InMemoryDatabase, UnitOfWork};
use uow_domain::aggregate::EventSource;
use uow_domain::domain_event::{EventContext, EventEnvelope};
use uow_domain::error::DomainResult;
use uow_domain::eventing::EventDispatcher;
use uow_domain::persist::{EventRecord, EventStoreWriter};

/// 分发器与事件存储共用的调用日志
#[derive(Default)]
struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }

    fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

struct LoggingDispatcher(Arc<CallLog>);

#[async_trait]
impl EventDispatcher for LoggingDispatcher {
    async fn publish(&self, event: &EventEnvelope) -> DomainResult<()> {
        self.0.push(format!("publish {}", event.aggregate_id()));
        tokio::task::yield_now().await;
        self.0.push(format!("published {}", event.aggregate_id()));
        Ok(())
    }
}

struct LoggingStore(Arc<CallLog>);

#[async_trait]
impl EventStoreWriter for LoggingStore {
    async fn append(&self, records: Vec<EventRecord>) -> DomainResult<()> {
        let ids: Vec<&str> = records.iter().map(|r| r.aggregate_id()).collect();
        self.0.push(format!("append {}", ids.join(",")));
        Ok(())
    }
}

#[tokio::test]
async fn saving_without_events_commits_rows_and_leaves_the_log_untouched() -> AnyResult<()> {
    let mut h = harness();
    h.uow.repository::<Order>().add(Order::draft("o-1", 100))?;
    assert!(h.uow.save_changes(&CancellationToken::new()).await?);

    assert_eq!(h.db.row_count().await, 1);
    assert_eq!(h.db.commit_count(), 1);
    assert!(h.store.is_empty().await);
    assert!(h.recorder.seen().is_empty());

    let report = h.uow.last_session().unwrap();
    assert_eq!(report.rows_affected, 1);
    assert_eq!(report.events_dispatched, 0);
    Ok(())
}

#[tokio::test]
async fn events_of_all_tracked_entities_are_dispatched_and_stored_in_harvest_order() -> AnyResult<()>
{
    let mut h = harness();
    h.uow.set_event_context(
        EventContext::builder()
            .correlation_id("checkout-42".to_string())
            .actor_type("user".to_string())
            .actor_id("u-7".to_string())
            .build(),
    );

    {
        let mut orders = h.uow.repository::<Order>();
        let first = orders.add(Order::place("o-1", 10))?;
        first.add_line("sku-1", 2, 5);
        orders.add(Order::place("o-2", 30))?;
    }
    h.uow
        .repository::<Customer>()
        .add(Customer::register("c-1", "ann@example.com"))?;

    assert!(h.uow.save_changes(&CancellationToken::new()).await?);

    let records = h.store.records().await;
    let kinds: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.aggregate_id(), r.event_type()))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("o-1", "OrderEvent.Placed"),
            ("o-1", "OrderEvent.LineAdded"),
            ("o-2", "OrderEvent.Placed"),
            ("c-1", "CustomerEvent.Registered"),
        ]
    );
    assert!(records.iter().all(|r| r.correlation_id() == Some("checkout-42")));
    assert!(records.iter().all(|r| r.actor_id() == Some("u-7")));
    assert_eq!(records[3].aggregate_type(), "Customer");

    // 每个事件恰好分发一次
    let mut seen = h.recorder.seen();
    let mut stored: Vec<String> = records.iter().map(|r| r.event_id().to_string()).collect();
    seen.sort();
    stored.sort();
    assert_eq!(seen, stored);

    let ctx = h.uow.context_mut();
    let order = ctx.tracked_mut::<Order>(&order_id("o-1")).unwrap();
    assert!(!order.has_pending_events());
    assert_eq!(ctx.state_of::<Order>(&order_id("o-1")), Some(EntryState::Unchanged));

    let report = h.uow.last_session().unwrap();
    assert_eq!(report.attempts, 1);
    assert_eq!(report.rows_affected, 3);
    assert_eq!(report.events_dispatched, 4);
    assert_eq!(report.records_stored, 4);
    Ok(())
}

#[tokio::test]
async fn later_sessions_only_publish_newly_raised_events() -> AnyResult<()> {
    let mut h = harness();
    h.uow.repository::<Order>().add(Order::place("o-1", 10))?;
    h.uow.save_changes(&CancellationToken::new()).await?;

    {
        let mut orders = h.uow.repository::<Order>();
        let mut order = orders.get_by_id(&order_id("o-1")).await?.unwrap();
        order.cancel("customer request");
        orders.update(order)?;
    }
    h.uow.save_changes(&CancellationToken::new()).await?;

    let types: Vec<String> = h
        .store
        .records_for("order", "o-1")
        .await
        .iter()
        .map(|r| r.event_type().to_string())
        .collect();
    assert_eq!(types, vec!["OrderEvent.Placed", "order.cancelled"]);

    let stored = h.db.load::<Order>(&order_id("o-1")).await?.unwrap();
    assert!(stored.cancelled);
    assert_eq!(h.db.commit_count(), 2);
    Ok(())
}

#[tokio::test]
async fn deleting_by_id_removes_the_committed_row() -> AnyResult<()> {
    let mut h = harness();
    h.db.seed(&Order::place("o-9", 1)).await?;

    let deleted = h.uow.repository::<Order>().delete_by_id(&order_id("o-9")).await?;
    assert_eq!(deleted.total, 1);
    h.uow.save_changes(&CancellationToken::new()).await?;

    assert_eq!(h.db.row_count().await, 0);
    assert_eq!(h.uow.context().tracked_count(), 0);
    Ok(())
}

#[tokio::test]
async fn every_dispatch_completes_before_a_single_store_append() -> AnyResult<()> {
    let log = Arc::new(CallLog::default());
    let db = InMemoryDatabase::new();
    let mut uow = UnitOfWork::builder()
        .context(InMemoryDataContext::new(db.clone()))
        .event_dispatcher(Arc::new(LoggingDispatcher(log.clone())))
        .event_store(Arc::new(LoggingStore(log.clone())))
        .build();
    {
        let mut orders = uow.repository::<Order>();
        orders.add(Order::place("o-1", 10))?;
        orders.add(Order::place("o-2", 20))?;
    }

    assert!(uow.save_changes(&CancellationToken::new()).await?);

    let lines = log.lines();
    assert_eq!(lines.len(), 5);
    let appends: Vec<&String> = lines.iter().filter(|l| l.starts_with("append")).collect();
    assert_eq!(appends, vec!["append o-1,o-2"]);
    assert_eq!(lines.last().map(String::as_str), Some("append o-1,o-2"));
    assert_eq!(lines.iter().filter(|l| l.starts_with("published")).count(), 2);
    assert_eq!(db.row_count().await, 2);
    Ok(())
}

#[tokio::test]
async fn an_entity_added_and_deleted_in_one_session_publishes_nothing() -> AnyResult<()> {
    let mut h = harness();
    {
        let mut orders = h.uow.repository::<Order>();
        orders.add(Order::place("o-1", 10))?;
        orders.add(Order::place("o-2", 20))?;
        orders.delete_by_id(&order_id("o-1")).await?;
    }

    assert!(h.uow.save_changes(&CancellationToken::new()).await?);

    assert_eq!(h.db.row_count().await, 1);
    assert!(h.db.load::<Order>(&order_id("o-1")).await?.is_none());
    let records = h.store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].aggregate_id(), "o-2");
    assert_eq!(h.recorder.seen().len(), 1);
    assert_eq!(h.uow.last_session().unwrap().events_dispatched, 1);
    assert_eq!(h.uow.context().tracked_count(), 1);
    Ok(())
}

#[tokio::test]
async fn a_deleted_order_can_be_added_again_in_the_same_session() -> AnyResult<()> {
    let mut h = harness();
    h.db.seed(&Order::draft("o-1", 1)).await?;
    {
        let mut orders = h.uow.repository::<Order>();
        orders.delete_by_id(&order_id("o-1")).await?;
        orders.add(Order::place("o-1", 50))?;
    }
    assert_eq!(
        h.uow.context().state_of::<Order>(&order_id("o-1")),
        Some(EntryState::Modified)
    );

    assert!(h.uow.save_changes(&CancellationToken::new()).await?);

    let stored = h.db.load::<Order>(&order_id("o-1")).await?.unwrap();
    assert_eq!(stored.total, 50);
    assert_eq!(h.db.row_count().await, 1);
    assert_eq!(h.store.len().await, 1);
    Ok(())
}
