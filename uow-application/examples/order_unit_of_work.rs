use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uow_application::{
    Fault, FaultPoint, InMemoryDataContext, InMemoryDatabase, RetryPolicy,
    RetryingExecutionStrategy, UnitOfWork,
};
use uow_domain::aggregate::Aggregate;
use uow_domain::domain_event::{EventContext, EventEnvelope};
use uow_domain::error::DomainResult;
use uow_domain::eventing::{EventHandler, HandledEventType, InMemoryEventDispatcher};
use uow_domain::persist::InMemoryEventStore;
use uow_macros::{domain_event, entity, entity_id};

#[entity_id]
struct OrderId(String);

#[domain_event(version = 1)]
enum OrderEvent {
    Placed { total: u64 },
    #[event(event_type = "order.shipped")]
    Shipped { carrier: String },
}

#[entity(id = OrderId, event = OrderEvent, aggregate_type = "order")]
struct Order {
    total: u64,
    shipped: bool,
}

impl Order {
    fn place(id: &str, total: u64) -> Self {
        let mut order = Order {
            id: OrderId::new(id.to_string()),
            total,
            shipped: false,
            events: Default::default(),
        };
        order.raise(OrderEvent::Placed {
            id: ulid::Ulid::new().to_string(),
            total,
        });
        order
    }

    fn ship(&mut self, carrier: &str) {
        self.shipped = true;
        self.raise(OrderEvent::Shipped {
            id: ulid::Ulid::new().to_string(),
            carrier: carrier.to_string(),
        });
    }
}

struct PrintHandler;

#[async_trait]
impl EventHandler for PrintHandler {
    fn handler_name(&self) -> &str {
        "print"
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::All
    }

    async fn handle(&self, event: &EventEnvelope) -> DomainResult<()> {
        println!(
            "  -> {} {} on {}#{}",
            event.event_type(),
            event.event_id(),
            event.aggregate_type(),
            event.aggregate_id()
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let db = InMemoryDatabase::new();
    let store = Arc::new(InMemoryEventStore::new());
    let dispatcher = InMemoryEventDispatcher::new(vec![Arc::new(PrintHandler) as Arc<dyn EventHandler>]);

    let mut uow = UnitOfWork::builder()
        .context(InMemoryDataContext::new(db.clone()))
        .event_dispatcher(Arc::new(dispatcher))
        .event_store(store.clone())
        .execution_strategy(Arc::new(RetryingExecutionStrategy::new(
            RetryPolicy::builder()
                .base_delay(Duration::from_millis(20))
                .build(),
        )))
        .event_context(
            EventContext::builder()
                .actor_type("user".to_string())
                .actor_id("u-1".to_string())
                .build(),
        )
        .build();
    let cancel = CancellationToken::new();

    println!("place two orders:");
    {
        let mut orders = uow.repository::<Order>();
        orders.add(Order::place("o-1", 120))?;
        orders.add(Order::place("o-2", 80))?;
    }
    uow.save_changes(&cancel).await?;

    // 第一次提交失败，工作单元在新事务中重试，事件只发布一次
    println!("ship o-1 with a transient commit failure:");
    db.inject(Fault::transient(FaultPoint::Commit)).await;
    {
        let mut orders = uow.repository::<Order>();
        if let Some(mut order) = orders.get_by_id(&OrderId::new("o-1".to_string())).await? {
            order.ship("ups");
            orders.update(order)?;
        }
    }
    uow.save_changes(&cancel).await?;

    if let Some(report) = uow.last_session() {
        println!(
            "attempts={} transactions={} events={}",
            report.attempts,
            report.transaction_ids.len(),
            report.events_dispatched
        );
    }
    println!("rows={} stored events={}", db.row_count().await, store.len().await);
    for record in store.records().await {
        println!(
            "  #{:?} {} {}",
            record.sequence_number(),
            record.event_type(),
            record.aggregate_id()
        );
    }
    Ok(())
}
