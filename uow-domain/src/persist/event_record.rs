//! 事件存储记录（EventRecord）
//!
//! 领域事件在追加式事件存储中的序列化形态，由收集到的 `EventEnvelope`
//! 一对一构造，构造后不可变。
//!
use crate::{
    domain_event::EventEnvelope,
    error::{DomainError, DomainResult},
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
pub struct EventRecord {
    /// 事件唯一标识符（事件存储据此去重）
    event_id: String,
    /// 事件类型名
    event_type: String,
    /// 事件载荷版本
    event_version: usize,
    /// 全局位点，由事件存储在追加时赋值
    sequence_number: Option<i64>,
    /// 事件所属聚合的标识
    aggregate_id: String,
    /// 事件所属聚合的类型
    aggregate_type: String,
    /// 关联 ID，同一次工作单元内的事件共享
    correlation_id: Option<String>,
    /// 因果 ID
    causation_id: Option<String>,
    /// 触发事件的主体类型
    actor_type: Option<String>,
    /// 触发事件的主体 ID
    actor_id: Option<String>,
    /// 事件发生时间
    occurred_at: DateTime<Utc>,
    /// 序列化后的事件载荷
    payload: Value,
    /// 序列化后的业务语境
    context: Value,
}

impl EventRecord {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> usize {
        self.event_version
    }

    pub fn sequence_number(&self) -> Option<i64> {
        self.sequence_number
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn actor_type(&self) -> Option<&str> {
        self.actor_type.as_deref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    /// 由存储层在追加时赋予全局位点
    pub fn with_sequence_number(mut self, sequence_number: i64) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }
}

impl TryFrom<&EventEnvelope> for EventRecord {
    type Error = serde_json::Error;

    fn try_from(envelope: &EventEnvelope) -> Result<Self, Self::Error> {
        Ok(EventRecord {
            event_id: envelope.event_id().to_string(),
            event_type: envelope.event_type().to_string(),
            event_version: envelope.event_version(),
            sequence_number: None,
            aggregate_id: envelope.aggregate_id().to_string(),
            aggregate_type: envelope.aggregate_type().to_string(),
            correlation_id: envelope.context.correlation_id().map(|s| s.to_string()),
            causation_id: envelope.context.causation_id().map(|s| s.to_string()),
            actor_type: envelope.context.actor_type().map(|s| s.to_string()),
            actor_id: envelope.context.actor_id().map(|s| s.to_string()),
            occurred_at: *envelope.metadata.occurred_at(),
            payload: envelope.to_payload()?,
            context: serde_json::to_value(&envelope.context)?,
        })
    }
}

/// 将一批信封按原顺序一对一转换为存储记录
pub fn to_records(events: &[EventEnvelope]) -> DomainResult<Vec<EventRecord>> {
    let records = events
        .iter()
        .map(EventRecord::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map_err(DomainError::from)?;

    Ok(records)
}
