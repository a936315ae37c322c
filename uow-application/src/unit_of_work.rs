//! 工作单元（UnitOfWork）
//!
//! 把一次业务操作中登记的全部变更与其产生的领域事件作为一个整体保存：
//!
//! 1. 在新事务中收集被跟踪实体上的待发布事件（收集后实体队列即为空）；
//! 2. 由事件构建存储记录，冲刷变更并提交事务；
//! 3. 失败则回滚；瞬时错误交给执行策略决定是否在新事务中重试，
//!    已被收集的事件随之带入下一次尝试，既不重复也不丢失；
//! 4. 提交成功后接受变更，再并发分发事件、追加事件存储。
//!
//! 取消令牌在入口、开启事务、冲刷以及提交前生效；提交后不再响应取消。
//!
//! 提交与事件存储之间不存在跨资源的原子性：提交后阶段失败时，
//! 行状态已持久化而事件未被记录，调用方会收到错误并可据此补偿。
//!
use crate::context::{ContextKind, DataContext, IsolationLevel, PersistentAggregate, Transaction};
use crate::error::{AppError, AppResult};
use crate::execution_strategy::{ExecutionStrategy, RetryingExecutionStrategy};
use crate::post_commit::dispatch_and_store;
use crate::repository::CommandRepository;
use bon::Builder;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uow_domain::aggregate::harvest;
use uow_domain::domain_event::{EventContext, EventEnvelope};
use uow_domain::eventing::EventDispatcher;
use uow_domain::persist::{EventRecord, EventStoreWriter, to_records};
use uuid::Uuid;

/// 工作单元配置
#[derive(Builder, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnitOfWorkConfig {
    /// 每次尝试开启事务时使用的隔离级别
    #[builder(default)]
    pub isolation: IsolationLevel,
}

/// 最近一次 `save_changes` 的诊断信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub attempts: u32,
    /// 每次尝试开启的事务，按时间顺序
    pub transaction_ids: Vec<Uuid>,
    pub rows_affected: usize,
    pub events_dispatched: usize,
    pub records_stored: usize,
    pub committed: bool,
}

#[derive(Builder)]
pub struct UnitOfWork<C: DataContext> {
    context: C,
    event_dispatcher: Arc<dyn EventDispatcher>,
    event_store: Arc<dyn EventStoreWriter>,
    #[builder(default = Arc::new(RetryingExecutionStrategy::default()) as Arc<dyn ExecutionStrategy>)]
    execution_strategy: Arc<dyn ExecutionStrategy>,
    #[builder(default)]
    config: UnitOfWorkConfig,
    /// 本工作单元内所有事件共享的业务语境
    #[builder(default)]
    event_context: EventContext,
    #[builder(skip)]
    last_session: Option<SessionReport>,
}

// 一次尝试失败时的错误及已被收集的事件
struct AttemptFailure {
    error: AppError,
    events: Vec<EventEnvelope>,
}

struct Committed {
    transaction_id: Uuid,
    rows: usize,
    events: Vec<EventEnvelope>,
    records: Vec<EventRecord>,
}

impl<C: DataContext> UnitOfWork<C> {
    /// 借出单类型仓储；仓储登记的变更在 `save_changes` 时统一保存
    pub fn repository<A: PersistentAggregate>(&mut self) -> CommandRepository<'_, C, A> {
        CommandRepository::new(&mut self.context)
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn event_context(&self) -> &EventContext {
        &self.event_context
    }

    pub fn set_event_context(&mut self, event_context: EventContext) {
        self.event_context = event_context;
    }

    pub fn last_session(&self) -> Option<&SessionReport> {
        self.last_session.as_ref()
    }

    /// 保存全部已登记变更并发布其领域事件
    ///
    /// 成功返回 `true`。失败时：
    /// - 非瞬时错误原样返回；
    /// - 瞬时错误在重试次数用尽后返回 `AppError::RetriesExhausted`；
    /// - 提交后阶段失败返回 `AppError::Dispatch` 或 `AppError::Domain`，此时行状态已提交。
    pub async fn save_changes(&mut self, cancel: &CancellationToken) -> AppResult<bool> {
        let event_context = self.event_context.with_correlation();
        let span = tracing::info_span!(
            "save_changes",
            correlation_id = event_context.correlation_id().unwrap_or_default()
        );

        async move {
            let mut report = SessionReport::default();
            let result = self.execute(cancel, &event_context, &mut report).await;
            self.last_session = Some(report);
            result
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &mut self,
        cancel: &CancellationToken,
        event_context: &EventContext,
        report: &mut SessionReport,
    ) -> AppResult<bool> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        if self.context.kind() != ContextKind::Relational {
            return Err(AppError::Configuration(
                "unit of work requires a relational data context".into(),
            ));
        }

        let mut carried = Vec::new();
        let mut attempt: u32 = 0;
        let committed = loop {
            attempt += 1;
            report.attempts = attempt;

            let failure = match self
                .attempt(attempt, carried, event_context, cancel, report)
                .await
            {
                Ok(committed) => break committed,
                Err(failure) => failure,
            };
            let AttemptFailure { error, events } = failure;

            if !error.is_transient() {
                return Err(error);
            }
            let Some(delay) = self.execution_strategy.next_delay(attempt, &error) else {
                if self.execution_strategy.retries_on_failure() {
                    tracing::error!(attempts = attempt, error = %error, "retries exhausted");
                    return Err(AppError::RetriesExhausted {
                        attempts: attempt,
                        source: Box::new(error),
                    });
                }
                return Err(error);
            };

            tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                carried_events = events.len(),
                error = %error,
                "transient failure, retrying in a new transaction"
            );
            carried = events;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        };

        self.context.accept_changes();
        report.committed = true;
        report.rows_affected = committed.rows;

        // 提交后不再响应取消
        let count = committed.events.len();
        if let Err(error) = dispatch_and_store(
            &*self.event_dispatcher,
            &*self.event_store,
            &committed.events,
            committed.records,
        )
        .await
        {
            tracing::error!(
                transaction_id = %committed.transaction_id,
                events = count,
                error = %error,
                "post-commit phase failed, committed rows have no stored events"
            );
            return Err(error);
        }

        report.events_dispatched = count;
        report.records_stored = count;
        tracing::info!(
            transaction_id = %committed.transaction_id,
            attempts = attempt,
            rows = committed.rows,
            events = count,
            "changes saved"
        );
        Ok(true)
    }

    async fn attempt(
        &mut self,
        attempt: u32,
        carried: Vec<EventEnvelope>,
        event_context: &EventContext,
        cancel: &CancellationToken,
        report: &mut SessionReport,
    ) -> Result<Committed, AttemptFailure> {
        let isolation = self.config.isolation;
        let mut tx = match cancellable(cancel, self.context.begin_transaction(isolation)).await {
            Ok(tx) => tx,
            Err(error) => {
                tracing::error!(attempt, error = %error, "failed to begin transaction");
                return Err(AttemptFailure {
                    error,
                    events: carried,
                });
            }
        };
        let transaction_id = tx.id();
        report.transaction_ids.push(transaction_id);

        let mut events = carried;
        events.extend(harvest(self.context.event_sources(), event_context));

        let (rows, records) = match self.persist(&mut tx, &events, cancel).await {
            Ok(persisted) => persisted,
            Err(error) => {
                tracing::error!(%transaction_id, attempt, error = %error, "save failed, rolling back");
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(%transaction_id, error = %rollback_error, "rollback failed");
                }
                return Err(AttemptFailure { error, events });
            }
        };

        if let Err(error) = tx.commit().await {
            tracing::error!(%transaction_id, attempt, error = %error, "commit failed, transaction released");
            return Err(AttemptFailure { error, events });
        }
        tracing::debug!(%transaction_id, attempt, rows, events = events.len(), "transaction committed");

        Ok(Committed {
            transaction_id,
            rows,
            events,
            records,
        })
    }

    async fn persist(
        &mut self,
        tx: &mut C::Transaction,
        events: &[EventEnvelope],
        cancel: &CancellationToken,
    ) -> AppResult<(usize, Vec<EventRecord>)> {
        let records = to_records(events)?;
        let rows = cancellable(cancel, self.context.persist(tx)).await?;
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok((rows, records))
    }
}

async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        result = fut => result,
    }
}
