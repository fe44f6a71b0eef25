use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Short navigation label derived from one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    pub message_id: String,
    pub content: String,
    pub user_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}
