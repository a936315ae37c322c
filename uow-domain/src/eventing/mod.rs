//! 事件子系统（eventing）
//!
//! 提交后把领域事件交付给进程内订阅者所需的抽象与实现：
//! - `EventDispatcher`：单事件分发协议；
//! - `EventHandler`：订阅某类/多类/全部事件的处理器；
//! - `InMemoryEventDispatcher`：基于内存注册表的并发分发实现。
//!
pub mod dispatcher;
pub mod dispatcher_inmemory;
pub mod handler;

pub use dispatcher::EventDispatcher;
pub use dispatcher_inmemory::InMemoryEventDispatcher;
pub use handler::{EventHandler, HandledEventType};
