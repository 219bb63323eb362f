use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pages read in one sitting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSession {
    pub id: String,
    pub book_id: String,
    pub date: DateTime<Utc>,
    pub pages_read: i64,
}
