use bon::Builder;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 一次工作单元内所有事件共享的业务语境
#[derive(Builder, Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// 关联ID
    correlation_id: Option<String>,
    /// 因果ID
    causation_id: Option<String>,
    /// 触发事件的主体类型（如用户、系统等）
    actor_type: Option<String>,
    /// 触发事件的主体ID
    actor_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    extensions: Option<serde_json::Value>,
}

impl EventContext {
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub fn actor_type(&self) -> Option<&str> {
        self.actor_type.as_deref()
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn extensions(&self) -> Option<&serde_json::Value> {
        self.extensions.as_ref()
    }

    /// 返回带关联ID的语境；缺失时生成一个新的 UUID
    pub fn with_correlation(&self) -> Self {
        let mut ctx = self.clone();
        if ctx.correlation_id.is_none() {
            ctx.correlation_id = Some(Uuid::new_v4().to_string());
        }
        ctx
    }
}
