//! 命令侧通用仓储（CommandRepository）
//!
//! 仓储只把变更登记到所属工作单元的上下文中，从不自行开启事务；
//! 真正写入存储发生在 `UnitOfWork::save_changes`。
//!
use crate::context::{DataContext, EntryState, PersistentAggregate};
use crate::error::{AppError, AppResult};
use std::marker::PhantomData;
use uow_domain::specification::Specification;

/// 借用自工作单元的单类型仓储
pub struct CommandRepository<'a, C, A> {
    context: &'a mut C,
    _marker: PhantomData<fn() -> A>,
}

impl<'a, C, A> CommandRepository<'a, C, A>
where
    C: DataContext,
    A: PersistentAggregate,
{
    pub(crate) fn new(context: &'a mut C) -> Self {
        Self {
            context,
            _marker: PhantomData,
        }
    }

    /// 登记新增实体，返回上下文中被跟踪的实例
    pub fn add(&mut self, entity: A) -> AppResult<&mut A> {
        ensure_assigned(&entity)?;
        self.context.track(entity, EntryState::Added)
    }

    pub fn add_batch(&mut self, entities: Vec<A>) -> AppResult<usize> {
        ensure_batch(&entities)?;
        let count = entities.len();
        for entity in entities {
            self.context.track(entity, EntryState::Added)?;
        }
        Ok(count)
    }

    pub fn update(&mut self, entity: A) -> AppResult<&mut A> {
        ensure_assigned(&entity)?;
        self.context.track(entity, EntryState::Modified)
    }

    pub fn update_batch(&mut self, entities: Vec<A>) -> AppResult<usize> {
        ensure_batch(&entities)?;
        let count = entities.len();
        for entity in entities {
            self.context.track(entity, EntryState::Modified)?;
        }
        Ok(count)
    }

    pub fn delete(&mut self, entity: A) -> AppResult<()> {
        ensure_assigned(&entity)?;
        self.context.track(entity, EntryState::Deleted)?;
        Ok(())
    }

    pub fn delete_batch(&mut self, entities: Vec<A>) -> AppResult<usize> {
        ensure_batch(&entities)?;
        let count = entities.len();
        for entity in entities {
            self.context.track(entity, EntryState::Deleted)?;
        }
        Ok(count)
    }

    /// 按标识删除；优先使用已跟踪的实例，否则读取已提交状态
    pub async fn delete_by_id(&mut self, id: &A::Id) -> AppResult<A> {
        ensure_id::<A>(id)?;

        let entity = match self.context.tracked_mut::<A>(id) {
            Some(tracked) => {
                let mut copy = tracked.clone();
                // 副本不携带事件，待发布事件仍留在被跟踪实例上
                copy.events_mut().take();
                copy
            }
            None => self
                .context
                .find::<A>(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("{}#{}", A::TYPE, id)))?,
        };

        self.context.track(entity.clone(), EntryState::Deleted)?;
        Ok(entity)
    }

    /// 读取已提交状态，不跟踪
    pub async fn get_by_id(&self, id: &A::Id) -> AppResult<Option<A>> {
        ensure_id::<A>(id)?;
        self.context.find::<A>(id).await
    }

    pub async fn get_by_predicate<S>(&self, spec: &S) -> AppResult<Vec<A>>
    where
        S: Specification<A>,
    {
        self.context.query::<A>(spec).await
    }

    /// 取得已跟踪实例的可变引用，用于在原实例上执行业务操作
    pub fn tracked_mut(&mut self, id: &A::Id) -> Option<&mut A> {
        self.context.tracked_mut::<A>(id)
    }
}

fn ensure_id<A: PersistentAggregate>(id: &A::Id) -> AppResult<()> {
    if *id == A::Id::default() {
        return Err(AppError::InvalidArgument(format!(
            "{} id must not be the default value",
            A::TYPE
        )));
    }
    Ok(())
}

fn ensure_assigned<A: PersistentAggregate>(entity: &A) -> AppResult<()> {
    if entity.has_default_id() {
        return Err(AppError::InvalidArgument(format!(
            "{} id must not be the default value",
            A::TYPE
        )));
    }
    Ok(())
}

fn ensure_batch<A: PersistentAggregate>(entities: &[A]) -> AppResult<()> {
    if entities.is_empty() {
        return Err(AppError::InvalidArgument(format!(
            "{} batch must not be empty",
            A::TYPE
        )));
    }
    for (i, entity) in entities.iter().enumerate() {
        ensure_assigned(entity)?;
        if entities[..i].iter().any(|other| other.id() == entity.id()) {
            return Err(AppError::InvalidArgument(format!(
                "duplicate {} id {} in batch",
                A::TYPE,
                entity.id()
            )));
        }
    }
    Ok(())
}
