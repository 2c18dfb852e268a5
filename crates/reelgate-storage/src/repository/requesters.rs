//! Per-requester statistics repository.

use reelgate_core::Decision;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::parse_datetime;
use crate::error::Result;
use crate::models::RequesterStats;

/// Repository for requester statistics.
pub struct RequestersRepo;

impl RequestersRepo {
    /// Count one staff verdict against a requester.
    pub fn record_verdict(
        conn: &Connection,
        requester_id: &str,
        display_name: &str,
        decision: Decision,
    ) -> Result<()> {
        let approved = i64::from(decision == Decision::Approved);
        let rejected = i64::from(decision == Decision::Rejected);

        conn.execute(
            "INSERT INTO requester_stats (requester_id, display_name, total_requests, approved_count, rejected_count)
             VALUES (?1, ?2, 1, ?3, ?4)
             ON CONFLICT (requester_id) DO UPDATE SET
                display_name = CASE WHEN excluded.display_name = '' THEN display_name ELSE excluded.display_name END,
                total_requests = total_requests + 1,
                approved_count = approved_count + excluded.approved_count,
                rejected_count = rejected_count + excluded.rejected_count,
                updated_at = datetime('now')",
            params![requester_id, display_name, approved, rejected],
        )?;
        Ok(())
    }

    /// Get statistics for one requester.
    pub fn get(conn: &Connection, requester_id: &str) -> Result<Option<RequesterStats>> {
        let stats = conn
            .query_row(
                "SELECT requester_id, display_name, total_requests, approved_count, rejected_count, updated_at
                 FROM requester_stats WHERE requester_id = ?1",
                [requester_id],
                map_stats,
            )
            .optional()?;
        Ok(stats)
    }

    /// Requesters with the most resolved requests first.
    pub fn get_top(conn: &Connection, limit: i64) -> Result<Vec<RequesterStats>> {
        let mut stmt = conn.prepare(
            "SELECT requester_id, display_name, total_requests, approved_count, rejected_count, updated_at
             FROM requester_stats ORDER BY total_requests DESC, requester_id ASC LIMIT ?1",
        )?;
        let stats = stmt
            .query_map([limit], map_stats)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }
}

fn map_stats(row: &Row<'_>) -> rusqlite::Result<RequesterStats> {
    Ok(RequesterStats {
        requester_id: row.get(0)?,
        display_name: row.get(1)?,
        total_requests: row.get(2)?,
        approved_count: row.get(3)?,
        rejected_count: row.get(4)?,
        updated_at: parse_datetime(&row.get::<_, String>(5)?),
    })
}
