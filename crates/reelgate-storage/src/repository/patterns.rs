//! Learned pattern repository.

use reelgate_core::learning::{LearnedPattern, PatternKind};
use reelgate_core::Decision;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::decision_column;
use crate::error::Result;

/// Repository for learned pattern operations.
pub struct PatternsRepo;

impl PatternsRepo {
    /// Increment the counter for a (kind, value, decision) triple, creating it at 1.
    pub fn upsert(
        conn: &Connection,
        kind: PatternKind,
        value: &str,
        decision: Decision,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO learned_patterns (pattern_type, pattern_value, decision, occurrences)
             VALUES (?1, ?2, ?3, 1)
             ON CONFLICT (pattern_type, pattern_value, decision)
             DO UPDATE SET occurrences = occurrences + 1, updated_at = datetime('now')",
            params![kind.as_str(), value, decision.as_str()],
        )?;
        Ok(())
    }

    /// Highest-occurrence pattern for a value. Ties go to the oldest row.
    pub fn top_for_value(
        conn: &Connection,
        kind: PatternKind,
        value: &str,
    ) -> Result<Option<LearnedPattern>> {
        let pattern = conn
            .query_row(
                "SELECT pattern_type, pattern_value, decision, occurrences
                 FROM learned_patterns
                 WHERE pattern_type = ?1 AND pattern_value = ?2
                 ORDER BY occurrences DESC, id ASC
                 LIMIT 1",
                params![kind.as_str(), value],
                map_pattern,
            )
            .optional()?;
        Ok(pattern)
    }

    /// All patterns, most frequent first.
    pub fn get_all(conn: &Connection) -> Result<Vec<LearnedPattern>> {
        let mut stmt = conn.prepare(
            "SELECT pattern_type, pattern_value, decision, occurrences
             FROM learned_patterns
             ORDER BY occurrences DESC, id ASC",
        )?;
        let patterns = stmt
            .query_map([], map_pattern)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(patterns)
    }
}

fn map_pattern(row: &Row<'_>) -> rusqlite::Result<LearnedPattern> {
    let kind: String = row.get(0)?;
    Ok(LearnedPattern {
        kind: PatternKind::parse(&kind).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                Type::Text,
                format!("unknown pattern type '{kind}'").into(),
            )
        })?,
        value: row.get(1)?,
        decision: decision_column(row, 2)?,
        occurrences: row.get(3)?,
    })
}
