//! 内存版事件存储（InMemoryEventStore）
//!
//! 满足 `EventStoreWriter` 协议的轻量实现：
//! - 追加时按顺序分配全局位点；
//! - 同一批次内或与已有记录的事件 ID 重复时，整批拒绝；
//! - 典型用途：测试环境、示例与本地开发。
//!
use crate::error::{DomainError, DomainResult as Result};
use crate::persist::{EventRecord, EventStoreWriter};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Log {
    records: Vec<EventRecord>,
    event_ids: HashSet<String>,
}

/// 内存事件存储，克隆后共享同一份日志
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按追加顺序返回全部记录
    pub async fn records(&self) -> Vec<EventRecord> {
        self.log.read().await.records.clone()
    }

    /// 返回某个聚合的全部记录
    pub async fn records_for(&self, aggregate_type: &str, aggregate_id: &str) -> Vec<EventRecord> {
        self.log
            .read()
            .await
            .records
            .iter()
            .filter(|r| r.aggregate_type() == aggregate_type && r.aggregate_id() == aggregate_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.log.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EventStoreWriter for InMemoryEventStore {
    async fn append(&self, records: Vec<EventRecord>) -> Result<()> {
        let mut log = self.log.write().await;

        let mut batch_ids = HashSet::with_capacity(records.len());
        for record in &records {
            let id = record.event_id();
            if log.event_ids.contains(id) || !batch_ids.insert(id.to_string()) {
                return Err(DomainError::DuplicateEvent {
                    event_id: id.to_string(),
                });
            }
        }

        let mut next = log.records.len() as i64 + 1;
        for record in records {
            log.event_ids.insert(record.event_id().to_string());
            log.records.push(record.with_sequence_number(next));
            next += 1;
        }

        Ok(())
    }
}
