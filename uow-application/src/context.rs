//! 变更跟踪上下文（DataContext）与事务（Transaction）协议
//!
//! 工作单元对存储的全部要求都收敛在这里：
//! - 开启指定隔离级别的事务；
//! - 在事务内冲刷已跟踪的变更，但不“接受”它们，以便重试时可再次冲刷；
//! - 提交成功后接受变更；
//! - 以对象安全的 `EventSource` 枚举被跟踪实体，供收集领域事件。
//!
use crate::error::AppResult;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use uow_domain::{aggregate::Aggregate, aggregate::EventSource, specification::Specification};
use uuid::Uuid;

/// 上下文种类；工作单元只在关系型上下文上运行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Relational,
    NonRelational,
}

/// 事务隔离级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// 被跟踪实体的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Added,
    Modified,
    Deleted,
    Unchanged,
}

/// 可被上下文跟踪并持久化的聚合
pub trait PersistentAggregate: Aggregate + Clone + Serialize + DeserializeOwned {}

impl<A> PersistentAggregate for A where A: Aggregate + Clone + Serialize + DeserializeOwned {}

/// 存储事务
///
/// `commit` / `rollback` 消耗事务本身；提交失败时实现方负责释放事务。
/// 未完成即被丢弃的事务视为回滚。
#[async_trait]
pub trait Transaction: Send {
    fn id(&self) -> Uuid;

    fn isolation(&self) -> IsolationLevel;

    async fn commit(self) -> AppResult<()>;

    async fn rollback(self) -> AppResult<()>;
}

#[async_trait]
pub trait DataContext: Send + Sync {
    type Transaction: Transaction;

    fn kind(&self) -> ContextKind;

    async fn begin_transaction(&mut self, isolation: IsolationLevel)
    -> AppResult<Self::Transaction>;

    /// 在事务内写出全部已跟踪变更，返回受影响行数
    async fn persist(&mut self, transaction: &mut Self::Transaction) -> AppResult<usize>;

    /// 将已跟踪变更标记为已持久化（仅在提交成功后调用）
    fn accept_changes(&mut self);

    /// 按跟踪顺序列出被跟踪实体
    fn event_sources(&mut self) -> Vec<&mut dyn EventSource>;

    /// 以给定状态跟踪实体；同一键已被跟踪且未标记删除时再以新增状态跟踪返回 `AppError::Tracking`
    fn track<A: PersistentAggregate>(&mut self, entity: A, state: EntryState) -> AppResult<&mut A>;

    fn tracked_mut<A: PersistentAggregate>(&mut self, id: &A::Id) -> Option<&mut A>;

    /// 读取已提交状态（不跟踪）
    async fn find<A: PersistentAggregate>(&self, id: &A::Id) -> AppResult<Option<A>>;

    async fn query<A: PersistentAggregate>(&self, spec: &dyn Specification<A>) -> AppResult<Vec<A>>;
}
