/// 规约模式的核心 trait
///
/// 用于封装查询条件与业务规则，仓储按规约筛选实体；
/// 任意 `Fn(&T) -> bool` 闭包也是一个规约。
pub trait Specification<T>: Send + Sync {
    /// 检查候选对象是否满足规约
    fn is_satisfied_by(&self, candidate: &T) -> bool;

    /// 与另一个规约进行 AND 组合
    fn and<S>(self, other: S) -> AndSpecification<T>
    where
        Self: Sized + 'static,
        S: Specification<T> + 'static,
    {
        AndSpecification {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// 与另一个规约进行 OR 组合
    fn or<S>(self, other: S) -> OrSpecification<T>
    where
        Self: Sized + 'static,
        S: Specification<T> + 'static,
    {
        OrSpecification {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// 对规约取反
    fn not(self) -> NotSpecification<T>
    where
        Self: Sized + 'static,
    {
        NotSpecification {
            inner: Box::new(self),
        }
    }
}

impl<T, F> Specification<T> for F
where
    F: Fn(&T) -> bool + Send + Sync,
{
    fn is_satisfied_by(&self, candidate: &T) -> bool {
        self(candidate)
    }
}

/// AND 组合规约
pub struct AndSpecification<T> {
    left: Box<dyn Specification<T>>,
    right: Box<dyn Specification<T>>,
}

impl<T> Specification<T> for AndSpecification<T> {
    fn is_satisfied_by(&self, candidate: &T) -> bool {
        self.left.is_satisfied_by(candidate) && self.right.is_satisfied_by(candidate)
    }
}

/// OR 组合规约
pub struct OrSpecification<T> {
    left: Box<dyn Specification<T>>,
    right: Box<dyn Specification<T>>,
}

impl<T> Specification<T> for OrSpecification<T> {
    fn is_satisfied_by(&self, candidate: &T) -> bool {
        self.left.is_satisfied_by(candidate) || self.right.is_satisfied_by(candidate)
    }
}

/// NOT 规约
pub struct NotSpecification<T> {
    inner: Box<dyn Specification<T>>,
}

impl<T> Specification<T> for NotSpecification<T> {
    fn is_satisfied_by(&self, candidate: &T) -> bool {
        !self.inner.is_satisfied_by(candidate)
    }
}
