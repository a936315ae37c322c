//! 事件处理器（EventHandler）
//!
//! 进程内订阅者：声明名称与订阅的事件类型，并处理收到的事件信封。
//!
use crate::{domain_event::EventEnvelope, error::DomainResult};
use async_trait::async_trait;

#[derive(Clone, Debug)]
pub enum HandledEventType {
    One(String),
    Many(Vec<String>),
    All,
}

/// 事件处理器：处理某一类或多类事件
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于日志与失败归因）
    fn handler_name(&self) -> &str;
    /// 返回该处理器订阅的事件类型
    fn handled_event_type(&self) -> HandledEventType;
    /// 处理事件
    async fn handle(&self, event: &EventEnvelope) -> DomainResult<()>;
}
