//! Calendar entities returned and accepted by the repository.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCalendarEntry {
    pub title: String,
    pub date: NaiveDate,
    pub notes: String,
    pub color_hex: String,
    pub content_type_tag: String,
    /// Run that produced the entry, if any.
    pub batch_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub notes: String,
    pub color_hex: String,
    pub content_type_tag: String,
    pub batch_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
