//! 领域层统一错误定义
//!
//! 聚焦序列化、事件分发与事件存储的最小必要集合，
//! 应用层通过 `#[from]` 统一转换为自身的错误类型。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    // --- 事件分发 ---
    #[error("event dispatch error: event={event_type}, reason={reason}")]
    EventDispatch { event_type: String, reason: String },
    #[error("event handler error: handler={handler}, reason={reason}")]
    EventHandler { handler: String, reason: String },

    // --- 事件存储 ---
    #[error("event store error: {reason}")]
    EventStore { reason: String },
    #[error("duplicate event: id={event_id}")]
    DuplicateEvent { event_id: String },
    #[error("database error: {reason}")]
    Database { reason: String },
}

impl DomainError {
    pub fn event_store(reason: impl Into<String>) -> Self {
        DomainError::EventStore {
            reason: reason.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

// 允许在基础设施层直接使用 `?` 将 sqlx 错误转换为 DomainError
#[cfg(feature = "infra-sqlx")]
impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::Database {
            reason: err.to_string(),
        }
    }
}
