#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uow_application::{
    InMemoryDataContext, InMemoryDatabase, RetryPolicy, RetryingExecutionStrategy, UnitOfWork,
};
use uow_domain::aggregate::Aggregate;
use uow_domain::domain_event::EventEnvelope;
use uow_domain::error::{DomainError, DomainResult};
use uow_domain::eventing::{EventHandler, HandledEventType, InMemoryEventDispatcher};
use uow_domain::persist::{EventRecord, EventStoreWriter, InMemoryEventStore};
use uow_macros::{domain_event, entity, entity_id};

#[entity_id]
pub struct OrderId(String);

#[domain_event(version = 1)]
pub enum OrderEvent {
    Placed { total: u64 },
    LineAdded { sku: String, qty: u32 },
    #[event(event_type = "order.cancelled")]
    Cancelled { reason: String },
}

#[entity(id = OrderId, event = OrderEvent, aggregate_type = "order")]
pub struct Order {
    pub total: u64,
    pub cancelled: bool,
}

impl Order {
    /// 不产生事件的订单
    pub fn draft(id: &str, total: u64) -> Self {
        Order {
            id: OrderId::new(id.to_string()),
            total,
            cancelled: false,
            events: Default::default(),
        }
    }

    pub fn place(id: &str, total: u64) -> Self {
        let mut order = Self::draft(id, total);
        order.raise(OrderEvent::Placed {
            id: event_id(),
            total,
        });
        order
    }

    pub fn add_line(&mut self, sku: &str, qty: u32, price: u64) {
        self.total += price * u64::from(qty);
        self.raise(OrderEvent::LineAdded {
            id: event_id(),
            sku: sku.to_string(),
            qty,
        });
    }

    pub fn cancel(&mut self, reason: &str) {
        self.cancelled = true;
        self.raise(OrderEvent::Cancelled {
            id: event_id(),
            reason: reason.to_string(),
        });
    }
}

#[domain_event]
pub enum CustomerEvent {
    Registered { email: String },
}

#[entity(event = CustomerEvent)]
pub struct Customer {
    pub email: String,
}

impl Customer {
    pub fn register(id: &str, email: &str) -> Self {
        let mut customer = Customer {
            id: id.to_string(),
            email: email.to_string(),
            events: Default::default(),
        };
        customer.raise(CustomerEvent::Registered {
            id: event_id(),
            email: email.to_string(),
        });
        customer
    }
}

pub fn event_id() -> String {
    ulid::Ulid::new().to_string()
}

pub fn order_id(id: &str) -> OrderId {
    OrderId::new(id.to_string())
}

/// 记录收到事件 ID 的订阅者；可配置为对某类事件失败
pub struct Recorder {
    name: String,
    fail_on: Option<String>,
    pub seen: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_on: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_on(name: &str, event_type: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            fail_on: Some(event_type.to_string()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for Recorder {
    fn handler_name(&self) -> &str {
        &self.name
    }

    fn handled_event_type(&self) -> HandledEventType {
        HandledEventType::All
    }

    async fn handle(&self, event: &EventEnvelope) -> DomainResult<()> {
        self.seen.lock().unwrap().push(event.event_id().to_string());
        if self.fail_on.as_deref() == Some(event.event_type()) {
            return Err(DomainError::EventHandler {
                handler: self.name.clone(),
                reason: "subscriber rejected event".into(),
            });
        }
        Ok(())
    }
}

/// 总是失败的事件存储
#[derive(Default)]
pub struct BrokenStore {
    pub calls: AtomicUsize,
}

#[async_trait]
impl EventStoreWriter for BrokenStore {
    async fn append(&self, _records: Vec<EventRecord>) -> DomainResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DomainError::event_store("event log unavailable"))
    }
}

pub struct Harness {
    pub db: Arc<InMemoryDatabase>,
    pub store: Arc<InMemoryEventStore>,
    pub recorder: Arc<Recorder>,
    pub uow: UnitOfWork<InMemoryDataContext>,
}

pub fn fast_retry(max_retries: u32) -> Arc<RetryingExecutionStrategy> {
    Arc::new(RetryingExecutionStrategy::new(
        RetryPolicy::builder()
            .max_retries(max_retries)
            .base_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(5))
            .build(),
    ))
}

pub fn harness() -> Harness {
    harness_with(Recorder::new("audit"))
}

pub fn harness_with(recorder: Arc<Recorder>) -> Harness {
    let db = InMemoryDatabase::new();
    let store = Arc::new(InMemoryEventStore::new());
    let dispatcher = InMemoryEventDispatcher::new(vec![recorder.clone() as Arc<dyn EventHandler>]);
    let uow = UnitOfWork::builder()
        .context(InMemoryDataContext::new(db.clone()))
        .event_dispatcher(Arc::new(dispatcher))
        .event_store(store.clone())
        .execution_strategy(fast_retry(3))
        .build();
    Harness {
        db,
        store,
        recorder,
        uow,
    }
}
