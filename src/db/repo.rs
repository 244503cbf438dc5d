use super::model::{CalendarEntry, NewCalendarEntry};
use super::CalendarStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

pub type Pool = SqlitePool;

const ENTRY_COLUMNS: &str =
    "id, title, entry_date, notes, color_hex, content_type, batch_id, created_at";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open calendar database {}", normalized))?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// For file-backed SQLite URLs, expand a leading `~/`, make sure the parent
/// directory exists and ask SQLite to create the file. In-memory and
/// non-sqlite URLs pass through unchanged.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let query = match query_part {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{}&mode=rwc", q),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{}?{}", expanded_path, query)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn entry_from_row(row: &SqliteRow) -> Result<CalendarEntry> {
    Ok(CalendarEntry {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        date: row.try_get("entry_date")?,
        notes: row.try_get("notes")?,
        color_hex: row.try_get("color_hex")?,
        content_type_tag: row.try_get("content_type")?,
        batch_id: row.try_get("batch_id")?,
        created_at: row.try_get("created_at")?,
    })
}

#[instrument(skip_all)]
pub async fn insert_entry(pool: &Pool, entry: &NewCalendarEntry) -> Result<CalendarEntry> {
    let created_at = Utc::now();
    let id: i64 = sqlx::query(
        "INSERT INTO calendar_entries (title, entry_date, notes, color_hex, content_type, batch_id, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&entry.title)
    .bind(entry.date)
    .bind(&entry.notes)
    .bind(&entry.color_hex)
    .bind(&entry.content_type_tag)
    .bind(entry.batch_id.as_deref())
    .bind(created_at)
    .fetch_one(pool)
    .await
    .context("failed to insert calendar entry")?
    .get("id");

    debug!(id, date = %entry.date, "inserted calendar entry");
    Ok(CalendarEntry {
        id,
        title: entry.title.clone(),
        date: entry.date,
        notes: entry.notes.clone(),
        color_hex: entry.color_hex.clone(),
        content_type_tag: entry.content_type_tag.clone(),
        batch_id: entry.batch_id.clone(),
        created_at,
    })
}

/// Entries dated within `[from, to]`, ordered by date then insertion.
#[instrument(skip_all)]
pub async fn list_entries_between(
    pool: &Pool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<CalendarEntry>> {
    let sql = format!(
        "SELECT {} FROM calendar_entries WHERE entry_date >= ? AND entry_date <= ? ORDER BY entry_date ASC, id ASC",
        ENTRY_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
    rows.iter().map(entry_from_row).collect()
}

#[instrument(skip_all)]
pub async fn list_entries_for_batch(pool: &Pool, batch_id: &str) -> Result<Vec<CalendarEntry>> {
    let sql = format!(
        "SELECT {} FROM calendar_entries WHERE batch_id = ? ORDER BY id ASC",
        ENTRY_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(batch_id).fetch_all(pool).await?;
    rows.iter().map(entry_from_row).collect()
}

pub async fn count_entries(pool: &Pool) -> Result<i64> {
    let cnt: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM calendar_entries")
        .fetch_one(pool)
        .await?;
    Ok(cnt)
}

/// [`CalendarStore`] backed by the SQLite calendar table.
#[derive(Debug, Clone)]
pub struct SqliteCalendar {
    pool: Pool,
}

impl SqliteCalendar {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl CalendarStore for SqliteCalendar {
    async fn create_entry(&self, entry: NewCalendarEntry) -> Result<CalendarEntry> {
        insert_entry(&self.pool, &entry).await
    }
}
