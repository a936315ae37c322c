//! 事件分发协议（EventDispatcher）
//!
//! 将单个事件交付给零个或多个进程内处理器。每个事件一次调用，
//! 调用之间可以并发等待，分发器本身不承诺顺序。
//!
use crate::{domain_event::EventEnvelope, error::DomainResult as Result};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn publish(&self, event: &EventEnvelope) -> Result<()>;
}

#[async_trait]
impl<T> EventDispatcher for Arc<T>
where
    T: EventDispatcher + ?Sized,
{
    async fn publish(&self, event: &EventEnvelope) -> Result<()> {
        (**self).publish(event).await
    }
}
