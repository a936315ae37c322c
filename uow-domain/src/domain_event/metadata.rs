use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 事件被收集时附加的元数据
#[derive(Builder, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[builder(into)]
    aggregate_id: String,
    #[builder(into)]
    aggregate_type: String,
    #[builder(default = Utc::now())]
    occurred_at: DateTime<Utc>,
}

impl Metadata {
    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn occurred_at(&self) -> &DateTime<Utc> {
        &self.occurred_at
    }
}
