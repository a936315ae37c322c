//! 工作单元应用层（uow-application）
//!
//! - `context`：变更跟踪上下文与事务协议
//! - `inmemory_context`：基于内存的关系型上下文，可注入故障
//! - `repository`：借用自工作单元的命令侧仓储
//! - `execution_strategy`：瞬时错误的重试策略
//! - `post_commit`：提交后的事件分发与事件存储写入
//! - `unit_of_work`：编排以上各部分的工作单元
//!
pub mod context;
pub mod error;
pub mod execution_strategy;
pub mod inmemory_context;
pub mod post_commit;
pub mod repository;
pub mod unit_of_work;

pub use context::{ContextKind, DataContext, EntryState, IsolationLevel, PersistentAggregate, Transaction};
pub use error::{AppError, AppResult, StorageErrorKind};
pub use execution_strategy::{ExecutionStrategy, NoRetryStrategy, RetryPolicy, RetryingExecutionStrategy};
pub use inmemory_context::{Fault, FaultPoint, InMemoryDataContext, InMemoryDatabase, InMemoryTransaction};
pub use repository::CommandRepository;
pub use unit_of_work::{SessionReport, UnitOfWork, UnitOfWorkConfig};
