//! 工作单元领域构件的过程宏（uow-macros）
//!
//! - `#[entity]`：注入标识与事件队列字段，实现 `Entity` / `Aggregate`
//! - `#[domain_event]`：为事件枚举注入事件 ID 字段并实现 `DomainEvent`
//! - `#[entity_id]`：把单字段 tuple struct 包装为可用作实体标识的类型
//!
use proc_macro::TokenStream;

mod domain_event;
mod entity;
mod entity_id;
mod utils;

/// 实体/聚合宏
///
/// ```ignore
/// #[entity(id = OrderId, event = OrderEvent)]
/// struct Order {
///     total: u64,
/// }
/// ```
#[proc_macro_attribute]
pub fn entity(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity::expand(attr, item)
}

/// 领域事件宏
///
/// ```ignore
/// #[domain_event(version = 1)]
/// enum OrderEvent {
///     Placed { total: u64 },
///     #[event(event_type = "order.cancelled")]
///     Cancelled { reason: String },
/// }
/// ```
#[proc_macro_attribute]
pub fn domain_event(attr: TokenStream, item: TokenStream) -> TokenStream {
    domain_event::expand(attr, item)
}

/// 实体标识宏
#[proc_macro_attribute]
pub fn entity_id(attr: TokenStream, item: TokenStream) -> TokenStream {
    entity_id::expand(attr, item)
}
