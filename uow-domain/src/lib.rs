//! 工作单元领域层基础库（uow-domain）
//!
//! 提供写侧工作单元所依赖的领域构件：
//! - 实体（`entity`）与可产生领域事件的聚合（`aggregate`）
//! - 领域事件、待发布队列与类型擦除的事件信封（`domain_event`）
//! - 事件存储记录与追加式存储协议（`persist`）
//! - 进程内事件分发与处理器（`eventing`）
//! - 规约（`specification`），供仓储按条件筛选
//!
//! 本 crate 不关心事务与重试，只定义领域层接口与最小必要的错误类型；
//! 事务编排由 `uow-application` 完成。
//!
//! 典型用法：
//! 1. 用 `#[entity]` 与 `#[domain_event]` 定义聚合及其事件；
//! 2. 在业务方法中通过 `Aggregate::raise` 记录事件；
//! 3. 由工作单元在提交前收集事件（`aggregate::harvest`），
//!    提交后交给 `EventDispatcher` 并写入 `EventStoreWriter`。
//!
pub mod aggregate;
pub mod domain_event;
pub mod entity;
pub mod error;
pub mod eventing;
pub mod persist;
pub mod specification;

// 允许在本 crate 内部通过 ::uow_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::uow_domain 路径。
extern crate self as uow_domain;
