//! Staff feedback repository.

use reelgate_core::learning::{FeedbackRecord, NewFeedback};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{decision_column, json_column, parse_datetime};
use crate::error::Result;

const SELECT_COLUMNS: &str = "SELECT id, request_id, ai_decision, ai_confidence, ai_reason,
        human_decision, human_reason, staff_username, snapshot, learning_applied, created_at
     FROM human_feedback";

/// Repository for feedback operations.
pub struct FeedbackRepo;

impl FeedbackRepo {
    /// Insert a feedback record. Learning is never applied here.
    pub fn insert(conn: &Connection, feedback: &NewFeedback) -> Result<i64> {
        let snapshot = serde_json::to_string(&feedback.snapshot)?;

        conn.execute(
            "INSERT INTO human_feedback (request_id, requester_id, title, ai_decision, ai_confidence,
                ai_reason, human_decision, human_reason, staff_username, snapshot)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                feedback.request_id,
                feedback.snapshot.requester_id,
                feedback.snapshot.title,
                feedback.ai_decision.as_str(),
                feedback.ai_confidence.map(f64::from),
                feedback.ai_reason,
                feedback.human_decision.as_str(),
                feedback.human_reason,
                feedback.staff_username,
                snapshot,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a feedback record by ID.
    pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<FeedbackRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let record = conn.query_row(&sql, [id], map_record).optional()?;
        Ok(record)
    }

    /// Count records not yet absorbed by a batch pass.
    pub fn count_pending(conn: &Connection) -> Result<u64> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM human_feedback WHERE learning_applied = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    /// Get every un-applied record, oldest first.
    pub fn get_pending(conn: &Connection) -> Result<Vec<FeedbackRecord>> {
        let sql = format!("{SELECT_COLUMNS} WHERE learning_applied = 0 ORDER BY id ASC");
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], map_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Get the most recent records.
    pub fn get_recent(conn: &Connection, limit: i64) -> Result<Vec<FeedbackRecord>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1");
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([limit], map_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Mark a record as absorbed by a batch pass.
    pub fn mark_applied(conn: &Connection, id: i64) -> Result<bool> {
        let updated = conn.execute(
            "UPDATE human_feedback SET learning_applied = 1 WHERE id = ?1",
            [id],
        )?;
        Ok(updated > 0)
    }
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<FeedbackRecord> {
    Ok(FeedbackRecord {
        id: row.get(0)?,
        feedback: NewFeedback {
            request_id: row.get(1)?,
            ai_decision: decision_column(row, 2)?,
            ai_confidence: row.get::<_, Option<f64>>(3)?.map(|c| c as f32),
            ai_reason: row.get(4)?,
            human_decision: decision_column(row, 5)?,
            human_reason: row.get(6)?,
            staff_username: row.get(7)?,
            snapshot: json_column(row, 8)?,
        },
        learning_applied: row.get::<_, i32>(9)? != 0,
        created_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;
    use reelgate_core::{Decision, ModerationRequest};

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn sample(human: Decision) -> NewFeedback {
        let snapshot = ModerationRequest::new("42", "Planet Earth")
            .with_genres(["Documentary"])
            .with_requester("u1", "Ann");
        NewFeedback::new(snapshot, Decision::NeedsReview, human, "Great series")
            .with_ai_details(0.65, "Long series")
            .with_staff("mod_jo")
    }

    #[test]
    fn test_insert_and_get() {
        let conn = setup_db();
        let id = FeedbackRepo::insert(&conn, &sample(Decision::Approved)).unwrap();

        let record = FeedbackRepo::get_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(record.feedback, sample(Decision::Approved));
        assert!(!record.learning_applied);
    }

    #[test]
    fn test_get_missing() {
        let conn = setup_db();
        assert!(FeedbackRepo::get_by_id(&conn, 99).unwrap().is_none());
    }

    #[test]
    fn test_pending_and_mark_applied() {
        let conn = setup_db();
        let first = FeedbackRepo::insert(&conn, &sample(Decision::Approved)).unwrap();
        FeedbackRepo::insert(&conn, &sample(Decision::Rejected)).unwrap();
        assert_eq!(FeedbackRepo::count_pending(&conn).unwrap(), 2);

        assert!(FeedbackRepo::mark_applied(&conn, first).unwrap());
        assert_eq!(FeedbackRepo::count_pending(&conn).unwrap(), 1);

        let pending = FeedbackRepo::get_pending(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].feedback.human_decision, Decision::Rejected);
    }

    #[test]
    fn test_get_recent_newest_first() {
        let conn = setup_db();
        FeedbackRepo::insert(&conn, &sample(Decision::Approved)).unwrap();
        let last = FeedbackRepo::insert(&conn, &sample(Decision::Rejected)).unwrap();

        let recent = FeedbackRepo::get_recent(&conn, 1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, last);
    }

    #[test]
    fn test_corrupt_decision_is_an_error() {
        let conn = setup_db();
        let id = FeedbackRepo::insert(&conn, &sample(Decision::Approved)).unwrap();
        conn.execute(
            "UPDATE human_feedback SET human_decision = 'MAYBE' WHERE id = ?1",
            [id],
        )
        .unwrap();
        assert!(FeedbackRepo::get_by_id(&conn, id).is_err());
    }
}
