//! 实体（Entity）基础抽象
//!
//! 通用仓储只依赖这一项能力：实体具备某种键类型的唯一标识。
//!
use std::fmt::{Debug, Display};

/// 具备唯一标识的实体抽象
pub trait Entity: Send + Sync {
    /// 实体标识类型
    ///
    /// `Default` 值被视为“未赋值”的标识，仓储会拒绝此类输入。
    type Id: Clone + Debug + Display + PartialEq + Default + Send + Sync + 'static;

    /// 获取实体标识
    fn id(&self) -> &Self::Id;

    /// 标识是否为默认值（未赋值）
    fn has_default_id(&self) -> bool {
        *self.id() == Self::Id::default()
    }
}
