//! Pending review queue repository.

use chrono::Utc;
use reelgate_core::review::ReviewItem;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{json_column, parse_datetime};
use crate::error::Result;
use crate::models::{PendingReview, ReviewStatus};

const SELECT_COLUMNS: &str = "SELECT id, request_id, title, reason, confidence, path, snapshot,
        status, feedback_id, resolved_by, resolved_at, created_at
     FROM pending_reviews";

/// Repository for the review queue.
pub struct ReviewsRepo;

impl ReviewsRepo {
    /// Queue an escalated request.
    pub fn insert(conn: &Connection, item: &ReviewItem) -> Result<i64> {
        let path = serde_json::to_string(&item.path)?;
        let snapshot = serde_json::to_string(&item.snapshot)?;

        conn.execute(
            "INSERT INTO pending_reviews (request_id, title, reason, confidence, path, snapshot, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                item.request_id,
                item.snapshot.title,
                item.reason,
                f64::from(item.confidence),
                path,
                snapshot,
                ReviewStatus::Open.as_str(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a review by ID.
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<PendingReview>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let review = conn.query_row(&sql, [id], map_review).optional()?;
        Ok(review)
    }

    /// Get reviews in a given state, oldest first.
    pub fn get_by_status(
        conn: &Connection,
        status: ReviewStatus,
        limit: i64,
    ) -> Result<Vec<PendingReview>> {
        let sql = format!("{SELECT_COLUMNS} WHERE status = ?1 ORDER BY id ASC LIMIT ?2");
        let mut stmt = conn.prepare(&sql)?;
        let reviews = stmt
            .query_map(params![status.as_str(), limit], map_review)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(reviews)
    }

    /// Count reviews in a given state.
    pub fn count_by_status(conn: &Connection, status: ReviewStatus) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM pending_reviews WHERE status = ?1",
            [status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Close an open review. Returns false if it was not open.
    pub fn mark_resolved(
        conn: &Connection,
        id: i64,
        feedback_id: i64,
        resolved_by: Option<&str>,
    ) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let updated = conn.execute(
            "UPDATE pending_reviews
             SET status = ?1, feedback_id = ?2, resolved_by = ?3, resolved_at = ?4
             WHERE id = ?5 AND status = ?6",
            params![
                ReviewStatus::Resolved.as_str(),
                feedback_id,
                resolved_by,
                now,
                id,
                ReviewStatus::Open.as_str(),
            ],
        )?;
        Ok(updated > 0)
    }
}

fn map_review(row: &Row<'_>) -> rusqlite::Result<PendingReview> {
    let status: String = row.get(7)?;
    Ok(PendingReview {
        id: row.get(0)?,
        request_id: row.get(1)?,
        title: row.get(2)?,
        reason: row.get(3)?,
        confidence: row.get::<_, f64>(4)? as f32,
        path: json_column(row, 5)?,
        snapshot: json_column(row, 6)?,
        status: ReviewStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                Type::Text,
                format!("unknown review status '{status}'").into(),
            )
        })?,
        feedback_id: row.get(8)?,
        resolved_by: row.get(9)?,
        resolved_at: row.get::<_, Option<String>>(10)?.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(11)?),
    })
}
