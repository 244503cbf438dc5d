//! Expands an anchor date and a timeframe into the ordered list of days a batch covers.
//!
//! The result never depends on the wall clock, only on the anchor date, the
//! timeframe and the week-start convention.

use chrono::{Datelike, Duration, NaiveDate};

use crate::model::{TimeframeKind, WeekStart};

/// Resolve using the default week start (Monday).
pub fn resolve(anchor: NaiveDate, kind: TimeframeKind) -> Vec<NaiveDate> {
    resolve_with(anchor, kind, WeekStart::default())
}

pub fn resolve_with(anchor: NaiveDate, kind: TimeframeKind, week_start: WeekStart) -> Vec<NaiveDate> {
    match kind {
        TimeframeKind::Single => vec![anchor],
        TimeframeKind::Week => consecutive(week_start_of(anchor, week_start), 7),
        TimeframeKind::Month => {
            let Some(first) = anchor.with_day(1) else {
                return vec![anchor];
            };
            consecutive(first, days_in_month(anchor.year(), anchor.month()))
        }
    }
}

/// First day of the week containing `anchor`.
pub fn week_start_of(anchor: NaiveDate, week_start: WeekStart) -> NaiveDate {
    let offset = match week_start {
        WeekStart::Monday => anchor.weekday().num_days_from_monday(),
        WeekStart::Sunday => anchor.weekday().num_days_from_sunday(),
    };
    anchor
        .checked_sub_signed(Duration::days(i64::from(offset)))
        .unwrap_or(NaiveDate::MIN)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        // December of the last representable year.
        _ => 31,
    }
}

// Stops early at the end of the representable range rather than panicking.
fn consecutive(start: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count as usize);
    let mut cursor = Some(start);
    while let Some(day) = cursor {
        if dates.len() == count as usize {
            break;
        }
        dates.push(day);
        cursor = day.succ_opt();
    }
    dates
}
