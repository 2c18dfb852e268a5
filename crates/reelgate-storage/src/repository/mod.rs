//! Database repositories for each table.

pub mod feedback;
pub mod patterns;
pub mod requesters;
pub mod reviews;

pub use feedback::FeedbackRepo;
pub use patterns::PatternsRepo;
pub use requesters::RequestersRepo;
pub use reviews::ReviewsRepo;

use chrono::{DateTime, Utc};
use reelgate_core::Decision;
use rusqlite::types::Type;
use rusqlite::Row;
use serde::de::DeserializeOwned;

/// Parse a timestamp written either by SQLite `datetime('now')` or as RFC 3339.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

/// Read a decision column, failing the row on an unknown label.
pub(crate) fn decision_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decision> {
    let raw: String = row.get(idx)?;
    Decision::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown decision '{raw}'").into(),
        )
    })
}

/// Read a JSON text column into `T`.
pub(crate) fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
