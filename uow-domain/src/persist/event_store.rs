//! 事件存储写入协议（EventStoreWriter）
//!
//! 追加式、持久化的事件日志，独立于关系型存储的行状态。
//! 每次调用携带一整批记录，要么全部写入，要么全部不写入。
//!
use crate::{error::DomainResult as Result, persist::EventRecord};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EventStoreWriter: Send + Sync {
    /// 原子地追加一批事件记录
    async fn append(&self, records: Vec<EventRecord>) -> Result<()>;
}

#[async_trait]
impl<T> EventStoreWriter for Arc<T>
where
    T: EventStoreWriter + ?Sized,
{
    async fn append(&self, records: Vec<EventRecord>) -> Result<()> {
        (**self).append(records).await
    }
}
