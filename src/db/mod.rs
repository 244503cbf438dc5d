//! Calendar persistence: entity models, SQL repository and the store seam.
//!
//! - `model`: calendar entities.
//! - `repo`: SQL-only functions plus [`SqliteCalendar`], the SQLite-backed
//!   [`CalendarStore`].
//!
//! The batch runner only sees [`CalendarStore`]; tests substitute their own.

use anyhow::Result;
use async_trait::async_trait;

pub mod model;
pub mod repo;

pub use model::{CalendarEntry, NewCalendarEntry};
pub use repo::*;

#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn create_entry(&self, entry: NewCalendarEntry) -> Result<CalendarEntry>;
}
