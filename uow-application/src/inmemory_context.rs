//! 基于内存的关系型上下文实现
//!
//! - `InMemoryDatabase`：以（聚合类型, 标识）为键的 JSON 行表，可注入故障；
//! - `InMemoryDataContext`：按跟踪顺序保存实体及其状态的变更跟踪器；
//! - `InMemoryTransaction`：暂存行写入，提交时在写锁内一次性应用，
//!   回滚或被丢弃时直接作废。
//!
//! 约束检查发生两次：冲刷时对照已提交状态，提交时在写锁内复核，
//! 以便并发事务抢先插入同一键时以约束违例失败。
//!
use crate::context::{
    ContextKind, DataContext, EntryState, IsolationLevel, PersistentAggregate, Transaction,
};
use crate::error::{AppError, AppResult, StorageErrorKind};
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};
use uow_domain::aggregate::{Aggregate, EventSource};
use uow_domain::entity::Entity;
use uow_domain::error::DomainError;
use uow_domain::specification::Specification;
use uuid::Uuid;

type RowKey = (&'static str, String);

fn row_key<A: PersistentAggregate>(id: &A::Id) -> RowKey {
    (A::TYPE, id.to_string())
}

fn describe(key: &RowKey) -> String {
    format!("{}#{}", key.0, key.1)
}

/// 故障注入点
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    Begin,
    Persist,
    Commit,
}

/// 一次性故障：在对应注入点被消费一次
#[derive(Debug, Clone)]
pub struct Fault {
    pub point: FaultPoint,
    pub kind: StorageErrorKind,
    pub reason: String,
}

impl Fault {
    pub fn new(point: FaultPoint, kind: StorageErrorKind, reason: impl Into<String>) -> Self {
        Self {
            point,
            kind,
            reason: reason.into(),
        }
    }

    pub fn transient(point: FaultPoint) -> Self {
        Self::new(point, StorageErrorKind::Transient, "injected transient failure")
    }

    pub fn fatal(point: FaultPoint) -> Self {
        Self::new(point, StorageErrorKind::Other, "injected fatal failure")
    }

    fn into_error(self) -> AppError {
        AppError::storage(self.kind, self.reason)
    }
}

/// 共享的内存“数据库”
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    rows: RwLock<BTreeMap<RowKey, Value>>,
    faults: Mutex<VecDeque<Fault>>,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl InMemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 注入故障；同一注入点的多个故障按注入顺序依次生效
    pub async fn inject(&self, fault: Fault) {
        self.faults.lock().await.push_back(fault);
    }

    async fn take_fault(&self, point: FaultPoint) -> Option<Fault> {
        let mut faults = self.faults.lock().await;
        let index = faults.iter().position(|f| f.point == point)?;
        faults.remove(index)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub async fn row_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// 直接写入一行已提交数据（绕过事务）
    pub async fn seed<A: PersistentAggregate>(&self, entity: &A) -> AppResult<()> {
        let row = serde_json::to_value(entity).map_err(DomainError::from)?;
        self.rows
            .write()
            .await
            .insert(row_key::<A>(entity.id()), row);
        Ok(())
    }

    pub async fn load<A: PersistentAggregate>(&self, id: &A::Id) -> AppResult<Option<A>> {
        let rows = self.rows.read().await;
        match rows.get(&row_key::<A>(id)) {
            Some(row) => Ok(Some(decode(row)?)),
            None => Ok(None),
        }
    }

    pub async fn load_all<A: PersistentAggregate>(&self) -> AppResult<Vec<A>> {
        let rows = self.rows.read().await;
        rows.iter()
            .filter(|((ty, _), _)| *ty == A::TYPE)
            .map(|(_, row)| decode(row))
            .collect()
    }
}

fn decode<A: PersistentAggregate>(row: &Value) -> AppResult<A> {
    Ok(serde_json::from_value(row.clone()).map_err(DomainError::from)?)
}

#[derive(Debug)]
enum RowWrite {
    Insert(RowKey, Value),
    Update(RowKey, Value),
    Delete(RowKey),
}

/// 内存事务
#[derive(Debug)]
pub struct InMemoryTransaction {
    id: Uuid,
    isolation: IsolationLevel,
    db: Arc<InMemoryDatabase>,
    staged: Vec<RowWrite>,
    finished: bool,
}

impl InMemoryTransaction {
    fn stage(&mut self, writes: Vec<RowWrite>) {
        self.staged.extend(writes);
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    fn id(&self) -> Uuid {
        self.id
    }

    fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    async fn commit(mut self) -> AppResult<()> {
        if let Some(fault) = self.db.take_fault(FaultPoint::Commit).await {
            return Err(fault.into_error());
        }

        let writes = std::mem::take(&mut self.staged);
        {
            let mut rows = self.db.rows.write().await;
            for write in &writes {
                match write {
                    RowWrite::Insert(key, _) if rows.contains_key(key) => {
                        return Err(AppError::constraint(format!(
                            "duplicate key {}",
                            describe(key)
                        )));
                    }
                    RowWrite::Update(key, _) | RowWrite::Delete(key) if !rows.contains_key(key) => {
                        return Err(AppError::NotFound(describe(key)));
                    }
                    _ => {}
                }
            }
            for write in writes {
                match write {
                    RowWrite::Insert(key, row) | RowWrite::Update(key, row) => {
                        rows.insert(key, row);
                    }
                    RowWrite::Delete(key) => {
                        rows.remove(&key);
                    }
                }
            }
        }

        self.finished = true;
        self.db.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(mut self) -> AppResult<()> {
        self.staged.clear();
        self.finished = true;
        self.db.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            self.db.rollbacks.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(transaction_id = %self.id, "transaction released without commit");
        }
    }
}

// 被跟踪实体的类型擦除视图
trait TrackedEntity: Send + Sync {
    fn to_row(&self) -> serde_json::Result<Value>;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn as_event_source(&mut self) -> &mut dyn EventSource;
}

impl<A> TrackedEntity for A
where
    A: PersistentAggregate,
{
    fn to_row(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_event_source(&mut self) -> &mut dyn EventSource {
        self
    }
}

struct Entry {
    key: RowKey,
    state: EntryState,
    // 自上次接受变更以来新增，尚不存在于已提交状态中
    added: bool,
    entity: Box<dyn TrackedEntity>,
}

impl Entry {
    // 新增后又被删除：既不写出也不发布事件
    fn is_detached(&self) -> bool {
        self.added && self.state == EntryState::Deleted
    }
}

/// 内存变更跟踪上下文
pub struct InMemoryDataContext {
    db: Arc<InMemoryDatabase>,
    kind: ContextKind,
    entries: Vec<Entry>,
}

impl InMemoryDataContext {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self {
            db,
            kind: ContextKind::Relational,
            entries: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: ContextKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn database(&self) -> &Arc<InMemoryDatabase> {
        &self.db
    }

    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    pub fn state_of<A: PersistentAggregate>(&self, id: &A::Id) -> Option<EntryState> {
        let key = row_key::<A>(id);
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.state)
    }

    fn position(&self, key: &RowKey) -> Option<usize> {
        self.entries.iter().position(|e| &e.key == key)
    }
}

#[async_trait]
impl DataContext for InMemoryDataContext {
    type Transaction = InMemoryTransaction;

    fn kind(&self) -> ContextKind {
        self.kind
    }

    async fn begin_transaction(
        &mut self,
        isolation: IsolationLevel,
    ) -> AppResult<Self::Transaction> {
        if let Some(fault) = self.db.take_fault(FaultPoint::Begin).await {
            return Err(fault.into_error());
        }
        Ok(InMemoryTransaction {
            id: Uuid::new_v4(),
            isolation,
            db: Arc::clone(&self.db),
            staged: Vec::new(),
            finished: false,
        })
    }

    async fn persist(&mut self, transaction: &mut Self::Transaction) -> AppResult<usize> {
        if let Some(fault) = self.db.take_fault(FaultPoint::Persist).await {
            return Err(fault.into_error());
        }

        let rows = self.db.rows.read().await;
        let mut writes = Vec::new();
        for entry in &self.entries {
            let key = entry.key.clone();
            match entry.state {
                EntryState::Unchanged => {}
                EntryState::Added => {
                    if rows.contains_key(&key) {
                        return Err(AppError::constraint(format!(
                            "duplicate key {}",
                            describe(&key)
                        )));
                    }
                    let row = entry.entity.to_row().map_err(DomainError::from)?;
                    writes.push(RowWrite::Insert(key, row));
                }
                EntryState::Modified => {
                    if !rows.contains_key(&key) {
                        return Err(AppError::NotFound(describe(&key)));
                    }
                    let row = entry.entity.to_row().map_err(DomainError::from)?;
                    writes.push(RowWrite::Update(key, row));
                }
                EntryState::Deleted if entry.is_detached() => {}
                EntryState::Deleted => {
                    if !rows.contains_key(&key) {
                        return Err(AppError::NotFound(describe(&key)));
                    }
                    writes.push(RowWrite::Delete(key));
                }
            }
        }
        drop(rows);

        let affected = writes.len();
        transaction.stage(writes);
        Ok(affected)
    }

    fn accept_changes(&mut self) {
        self.entries.retain(|e| e.state != EntryState::Deleted);
        for entry in &mut self.entries {
            entry.state = EntryState::Unchanged;
            entry.added = false;
        }
    }

    fn event_sources(&mut self) -> Vec<&mut dyn EventSource> {
        self.entries
            .iter_mut()
            .filter(|e| !e.is_detached())
            .map(|e| e.entity.as_event_source())
            .collect()
    }

    fn track<A: PersistentAggregate>(
        &mut self,
        mut entity: A,
        state: EntryState,
    ) -> AppResult<&mut A> {
        let key = row_key::<A>(entity.id());

        let index = match self.position(&key) {
            Some(index) => {
                let entry = &mut self.entries[index];
                // 已标记删除的键可以重新新增
                if state == EntryState::Added && entry.state != EntryState::Deleted {
                    return Err(AppError::Tracking(format!(
                        "{} is already tracked",
                        describe(&key)
                    )));
                }
                let Some(previous) = entry.entity.as_any_mut().downcast_mut::<A>() else {
                    return Err(AppError::Tracking(format!(
                        "{} is tracked as a different type",
                        describe(&key)
                    )));
                };

                // 替换实例时保留旧实例上尚未收集的事件，且排在新事件之前；
                // 新增后又被删除的实例已脱离跟踪，其事件作废
                let mut pending = previous.events_mut().take();
                if entry.is_detached() {
                    pending.clear();
                }
                pending.extend(entity.events_mut().take());
                for event in pending {
                    entity.raise(event);
                }

                entry.state = match state {
                    EntryState::Unchanged => entry.state,
                    EntryState::Modified if entry.added => EntryState::Added,
                    // 删除后重新新增的已提交行改为整行更新
                    EntryState::Added if !entry.added => EntryState::Modified,
                    other => other,
                };
                entry.entity = Box::new(entity);
                index
            }
            None => {
                self.entries.push(Entry {
                    key: key.clone(),
                    state,
                    added: state == EntryState::Added,
                    entity: Box::new(entity),
                });
                self.entries.len() - 1
            }
        };

        self.entries[index]
            .entity
            .as_any_mut()
            .downcast_mut::<A>()
            .ok_or_else(|| AppError::Tracking(describe(&key)))
    }

    fn tracked_mut<A: PersistentAggregate>(&mut self, id: &A::Id) -> Option<&mut A> {
        let index = self.position(&row_key::<A>(id))?;
        self.entries[index].entity.as_any_mut().downcast_mut::<A>()
    }

    async fn find<A: PersistentAggregate>(&self, id: &A::Id) -> AppResult<Option<A>> {
        self.db.load::<A>(id).await
    }

    async fn query<A: PersistentAggregate>(
        &self,
        spec: &dyn Specification<A>,
    ) -> AppResult<Vec<A>> {
        let all = self.db.load_all::<A>().await?;
        Ok(all
            .into_iter()
            .filter(|candidate| spec.is_satisfied_by(candidate))
            .collect())
    }
}
