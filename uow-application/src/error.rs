//! 应用层统一错误定义
//!
//! 工作单元只依据 `is_transient` 判断是否重试，
//! 因此存储类错误需携带 `StorageErrorKind` 分类。
//!
use uow_domain::error::DomainError;

/// 存储错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorKind {
    /// 连接中断、超时等，重试可能成功
    Transient,
    /// 序列化失败、死锁等并发冲突，换一个新事务重试可能成功
    Conflict,
    /// 唯一键、外键等约束违例
    Constraint,
    Other,
}

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("domain: {0}")]
    Domain(#[from] DomainError),

    #[error("configuration: {0}")]
    Configuration(String),

    #[error("storage ({kind:?}): {reason}")]
    Storage {
        kind: StorageErrorKind,
        reason: String,
    },

    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<AppError>,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("tracking: {0}")]
    Tracking(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("event dispatch failed: {failed} of {total} events", failed = .errors.len())]
    Dispatch {
        total: usize,
        errors: Vec<DomainError>,
    },
}

impl AppError {
    pub fn storage(kind: StorageErrorKind, reason: impl Into<String>) -> Self {
        AppError::Storage {
            kind,
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::storage(StorageErrorKind::Transient, reason)
    }

    pub fn constraint(reason: impl Into<String>) -> Self {
        Self::storage(StorageErrorKind::Constraint, reason)
    }

    /// 是否值得在新事务中重试
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Storage {
                kind: StorageErrorKind::Transient | StorageErrorKind::Conflict,
                ..
            }
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;

// SQLSTATE 分类：40001 序列化失败、40P01 死锁、08xxx 连接异常、23xxx 约束违例
#[cfg(feature = "infra-sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("40001") | Some("40P01") => StorageErrorKind::Conflict,
                Some(code) if code.starts_with("08") => StorageErrorKind::Transient,
                Some(code) if code.starts_with("23") => StorageErrorKind::Constraint,
                _ => StorageErrorKind::Other,
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StorageErrorKind::Transient,
            sqlx::Error::RowNotFound => return AppError::NotFound(err.to_string()),
            sqlx::Error::Configuration(_) => return AppError::Configuration(err.to_string()),
            _ => StorageErrorKind::Other,
        };
        AppError::storage(kind, err.to_string())
    }
}
