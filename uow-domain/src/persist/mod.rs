//! 事件持久化（persist）
//!
//! 定义事件存储记录（`EventRecord`）、由信封到记录的转换，
//! 以及追加式事件存储的写入协议（`EventStoreWriter`）与内存实现。
//!
//! 具体存储后端（如 Postgres）由上层提供实现并注入。
//!
mod event_record;
mod event_store;
mod event_store_inmemory;

pub use event_record::{EventRecord, to_records};
pub use event_store::EventStoreWriter;
pub use event_store_inmemory::InMemoryEventStore;
