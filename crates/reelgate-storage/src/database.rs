//! High-level database interface.
//!
//! [`Database`] is the persistent implementation of both core contracts:
//! [`PatternStore`] for the learning loop and [`ReviewQueue`] for
//! escalations. Each write that touches more than one table runs in a
//! single transaction while holding the pool lock.

use std::path::PathBuf;

use directories::ProjectDirs;
use reelgate_core::learning::{
    FeedbackRecord, FeedbackRecorder, LearnReport, LearnedPattern, LearningError, NewFeedback,
    PatternKind, PatternStore, RecordOutcome,
};
use reelgate_core::review::{ReviewItem, ReviewQueue, ReviewQueueError};
use reelgate_core::Decision;
use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};
use crate::models::{PendingReview, RequesterStats, ReviewStatus};
use crate::pool::ConnectionPool;
use crate::repository::{FeedbackRepo, PatternsRepo, RequestersRepo, ReviewsRepo};

/// High-level database interface for Reelgate.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Create a new database in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Create a new database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// Get the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "reelgate", "reelgate")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("reelgate.db"))
    }

    // === Feedback ===

    /// Store a staff verdict and count it against the requester.
    pub fn insert_feedback(&self, feedback: &NewFeedback) -> Result<i64> {
        feedback.validate()?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let id = write_feedback(&tx, feedback)?;
        tx.commit()?;
        Ok(id)
    }

    /// Get a feedback record by ID.
    pub fn get_feedback(&self, id: i64) -> Result<Option<FeedbackRecord>> {
        let conn = self.pool.get()?;
        FeedbackRepo::get_by_id(&conn, id)
    }

    /// Get the most recent feedback records.
    pub fn recent_feedback(&self, limit: i64) -> Result<Vec<FeedbackRecord>> {
        let conn = self.pool.get()?;
        FeedbackRepo::get_recent(&conn, limit)
    }

    /// Count feedback not yet absorbed by a batch pass.
    pub fn count_pending_feedback(&self) -> Result<u64> {
        let conn = self.pool.get()?;
        FeedbackRepo::count_pending(&conn)
    }

    /// Fold every un-applied feedback record into genre patterns.
    pub fn learn_from_feedback(&self) -> Result<LearnReport> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let mut report = LearnReport::default();

        for record in FeedbackRepo::get_pending(&tx)? {
            let decision = record.feedback.human_decision;
            for genre in record.feedback.learnable_genres() {
                PatternsRepo::upsert(&tx, PatternKind::Genre, &genre, decision)?;
                report.patterns_updated += 1;
            }
            FeedbackRepo::mark_applied(&tx, record.id)?;
            report.feedback_processed += 1;
        }

        tx.commit()?;

        if report.feedback_processed > 0 {
            info!(
                feedback = report.feedback_processed,
                patterns = report.patterns_updated,
                "Learned patterns from feedback"
            );
        }
        Ok(report)
    }

    // === Patterns ===

    /// Highest-occurrence pattern for a value.
    pub fn find_top_pattern(&self, kind: PatternKind, value: &str) -> Result<Option<LearnedPattern>> {
        let conn = self.pool.get()?;
        PatternsRepo::top_for_value(&conn, kind, value)
    }

    /// All learned patterns, most frequent first.
    pub fn list_patterns(&self) -> Result<Vec<LearnedPattern>> {
        let conn = self.pool.get()?;
        PatternsRepo::get_all(&conn)
    }

    // === Reviews ===

    /// Queue an escalated request for staff.
    pub fn enqueue_review(&self, item: &ReviewItem) -> Result<i64> {
        let conn = self.pool.get()?;
        let id = ReviewsRepo::insert(&conn, item)?;
        debug!(review_id = id, request_id = %item.request_id, "Queued for review");
        Ok(id)
    }

    /// Get a review by ID.
    pub fn get_review(&self, id: i64) -> Result<Option<PendingReview>> {
        let conn = self.pool.get()?;
        ReviewsRepo::get_by_id(&conn, id)
    }

    /// Open reviews, oldest first.
    pub fn list_open_reviews(&self, limit: i64) -> Result<Vec<PendingReview>> {
        let conn = self.pool.get()?;
        ReviewsRepo::get_by_status(&conn, ReviewStatus::Open, limit)
    }

    /// Number of open reviews.
    pub fn count_open_reviews(&self) -> Result<i64> {
        let conn = self.pool.get()?;
        ReviewsRepo::count_by_status(&conn, ReviewStatus::Open)
    }

    /// Close a review with a staff verdict and feed it to the learning loop.
    ///
    /// The open check, the feedback insert and the status change commit in
    /// one transaction under the pool lock, so a review yields at most one
    /// feedback record. `recorder` must share this database; it then decides
    /// whether a learn pass runs. A failed pass leaves the feedback pending
    /// for the next one.
    pub fn resolve_review(
        &self,
        id: i64,
        human_decision: Decision,
        reason: &str,
        staff: Option<&str>,
        recorder: &FeedbackRecorder,
    ) -> Result<RecordOutcome> {
        let feedback_id = {
            let mut conn = self.pool.get()?;
            let tx = conn.transaction()?;

            let review = ReviewsRepo::get_by_id(&tx, id)?
                .ok_or_else(|| StorageError::NotFound(format!("review {id}")))?;
            if !review.is_open() {
                return Err(StorageError::InvalidState(format!(
                    "review {id} is already resolved"
                )));
            }

            let mut feedback = NewFeedback::new(
                review.snapshot,
                Decision::NeedsReview,
                human_decision,
                reason,
            )
            .with_ai_details(review.confidence, review.reason);
            if let Some(staff) = staff {
                feedback = feedback.with_staff(staff);
            }
            feedback.validate()?;

            let feedback_id = write_feedback(&tx, &feedback)?;
            if !ReviewsRepo::mark_resolved(&tx, id, feedback_id, staff)? {
                return Err(StorageError::InvalidState(format!(
                    "review {id} is already resolved"
                )));
            }
            tx.commit()?;
            feedback_id
        };
        info!(review_id = id, feedback_id, decision = %human_decision, "Review resolved");

        match recorder.schedule(feedback_id) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(review_id = id, error = %e, "Learning pass failed, feedback left pending");
                Ok(RecordOutcome {
                    feedback_id,
                    learned: None,
                })
            }
        }
    }

    // === Requesters ===

    /// Statistics for one requester.
    pub fn requester_stats(&self, requester_id: &str) -> Result<Option<RequesterStats>> {
        let conn = self.pool.get()?;
        RequestersRepo::get(&conn, requester_id)
    }

    /// Requesters with the most resolved requests.
    pub fn top_requesters(&self, limit: i64) -> Result<Vec<RequesterStats>> {
        let conn = self.pool.get()?;
        RequestersRepo::get_top(&conn, limit)
    }
}

/// Inserts feedback and counts it against the requester.
fn write_feedback(conn: &Connection, feedback: &NewFeedback) -> Result<i64> {
    let id = FeedbackRepo::insert(conn, feedback)?;

    let requester = &feedback.snapshot;
    if !requester.requester_id.is_empty() {
        RequestersRepo::record_verdict(
            conn,
            &requester.requester_id,
            &requester.requester_display_name,
            feedback.human_decision,
        )?;
    }
    Ok(id)
}

impl PatternStore for Database {
    fn record_feedback(&self, feedback: NewFeedback) -> std::result::Result<i64, LearningError> {
        Ok(self.insert_feedback(&feedback)?)
    }

    fn pending_feedback_count(&self) -> std::result::Result<u64, LearningError> {
        Ok(self.count_pending_feedback()?)
    }

    fn batch_learn(&self) -> std::result::Result<LearnReport, LearningError> {
        Ok(self.learn_from_feedback()?)
    }

    fn top_pattern(
        &self,
        kind: PatternKind,
        value: &str,
    ) -> std::result::Result<Option<LearnedPattern>, LearningError> {
        Ok(self.find_top_pattern(kind, value)?)
    }

    fn patterns(&self) -> std::result::Result<Vec<LearnedPattern>, LearningError> {
        Ok(self.list_patterns()?)
    }
}

impl ReviewQueue for Database {
    fn submit(&self, item: ReviewItem) -> std::result::Result<(), ReviewQueueError> {
        self.enqueue_review(&item)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use reelgate_core::{
        DecisionEngine, DecisionPath, FinalDecision, ModerationRequest, RuleConfiguration, RuleId,
    };

    fn documentary(id: &str, requester: &str) -> ModerationRequest {
        ModerationRequest::new(id, "Planet")
            .with_genres(["Documentaire"])
            .with_requester(requester, "Ann")
    }

    fn escalation(request: &ModerationRequest) -> ReviewItem {
        let decision = FinalDecision {
            decision: Decision::NeedsReview,
            confidence: 0.5,
            reason: "No rule matched, requires human verification".to_string(),
            path: DecisionPath::Fallback {
                rule: RuleId::NoMatch,
            },
        };
        ReviewItem::new(request, &decision)
    }

    // ==================== Feedback Tests ====================

    #[test]
    fn test_feedback_updates_requester_stats() {
        let db = Database::in_memory().unwrap();
        let approved = NewFeedback::new(
            documentary("1", "u1"),
            Decision::NeedsReview,
            Decision::Approved,
            "ok",
        );
        let rejected = NewFeedback::new(
            documentary("2", "u1"),
            Decision::NeedsReview,
            Decision::Rejected,
            "no",
        );
        db.insert_feedback(&approved).unwrap();
        db.insert_feedback(&rejected).unwrap();

        let stats = db.requester_stats("u1").unwrap().unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.approved_count, 1);
        assert_eq!(stats.rejected_count, 1);
        assert_eq!(db.count_pending_feedback().unwrap(), 2);
        assert_eq!(db.recent_feedback(10).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_feedback_is_rejected() {
        let db = Database::in_memory().unwrap();
        let feedback = NewFeedback::new(
            documentary("1", "u1"),
            Decision::NeedsReview,
            Decision::NeedsReview,
            "unsure",
        );
        let err = db.record_feedback(feedback).unwrap_err();
        assert!(matches!(err, LearningError::InvalidFeedback(_)));
        assert_eq!(db.count_pending_feedback().unwrap(), 0);
        assert!(db.requester_stats("u1").unwrap().is_none());
    }

    #[test]
    fn test_anonymous_feedback_skips_stats() {
        let db = Database::in_memory().unwrap();
        let snapshot = ModerationRequest::new("1", "x").with_genres(["Drama"]);
        db.insert_feedback(&NewFeedback::new(
            snapshot,
            Decision::NeedsReview,
            Decision::Approved,
            "",
        ))
        .unwrap();
        assert!(db.top_requesters(10).unwrap().is_empty());
    }

    // ==================== Learning Tests ====================

    #[test]
    fn test_batch_learn_and_suggest() {
        let db = Database::in_memory().unwrap();
        for i in 0..100 {
            let human = if i < 80 {
                Decision::Approved
            } else {
                Decision::Rejected
            };
            db.record_feedback(NewFeedback::new(
                documentary(&i.to_string(), "u1"),
                Decision::NeedsReview,
                human,
                "",
            ))
            .unwrap();
        }

        let report = db.batch_learn().unwrap();
        assert_eq!(report.feedback_processed, 100);
        assert_eq!(report.patterns_updated, 100);
        assert_eq!(db.pending_feedback_count().unwrap(), 0);

        let patterns = db.patterns().unwrap();
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0].value, "Documentary");
        assert_eq!(patterns[0].occurrences, 80);

        let request = ModerationRequest::new("new", "Oceans").with_genres(["Documentary"]);
        let suggestion = db.suggest(&request).unwrap().unwrap();
        assert_eq!(suggestion.decision, Decision::Approved);
        assert_eq!(suggestion.confidence, 0.85);
    }

    #[test]
    fn test_batch_learn_is_idempotent() {
        let db = Database::in_memory().unwrap();
        db.record_feedback(NewFeedback::new(
            documentary("1", "u1"),
            Decision::NeedsReview,
            Decision::Rejected,
            "",
        ))
        .unwrap();
        db.batch_learn().unwrap();
        let before = db.patterns().unwrap();

        assert_eq!(db.batch_learn().unwrap(), LearnReport::default());
        assert_eq!(db.patterns().unwrap(), before);
    }

    #[test]
    fn test_recorder_triggers_learning() {
        let db = Database::in_memory().unwrap();
        let recorder = FeedbackRecorder::new(Arc::new(db.clone()), 2);

        let first = recorder
            .record(NewFeedback::new(
                documentary("1", "u1"),
                Decision::NeedsReview,
                Decision::Approved,
                "",
            ))
            .unwrap();
        assert!(first.learned.is_none());

        let second = recorder
            .record(NewFeedback::new(
                documentary("2", "u1"),
                Decision::NeedsReview,
                Decision::Approved,
                "",
            ))
            .unwrap();
        assert_eq!(second.learned.unwrap().feedback_processed, 2);
        assert_eq!(db.list_patterns().unwrap()[0].occurrences, 2);
    }

    // ==================== Review Tests ====================

    #[test]
    fn test_submit_and_resolve_review() {
        let db = Database::in_memory().unwrap();
        let recorder = FeedbackRecorder::new(Arc::new(db.clone()), 100);
        let request = documentary("42", "u1");

        db.submit(escalation(&request)).unwrap();
        let open = db.list_open_reviews(10).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].request_id, "42");

        let outcome = db
            .resolve_review(open[0].id, Decision::Approved, "Great doc", Some("mod_jo"), &recorder)
            .unwrap();
        assert!(outcome.learned.is_none());
        assert_eq!(db.count_open_reviews().unwrap(), 0);

        let record = db.get_feedback(outcome.feedback_id).unwrap().unwrap();
        assert_eq!(record.feedback.request_id, "42");
        assert_eq!(record.feedback.ai_decision, Decision::NeedsReview);
        assert_eq!(record.feedback.ai_confidence, Some(0.5));
        assert_eq!(record.feedback.human_decision, Decision::Approved);
        assert_eq!(record.feedback.staff_username.as_deref(), Some("mod_jo"));

        let review = db.get_review(open[0].id).unwrap().unwrap();
        assert_eq!(review.feedback_id, Some(outcome.feedback_id));
    }

    #[test]
    fn test_resolve_review_twice_fails() {
        let db = Database::in_memory().unwrap();
        let recorder = FeedbackRecorder::new(Arc::new(db.clone()), 100);
        let id = db.enqueue_review(&escalation(&documentary("1", "u1"))).unwrap();

        db.resolve_review(id, Decision::Rejected, "", None, &recorder)
            .unwrap();
        let err = db
            .resolve_review(id, Decision::Rejected, "", None, &recorder)
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidState(_)));
        assert_eq!(db.count_pending_feedback().unwrap(), 1);
    }

    #[test]
    fn test_resolve_with_non_terminal_verdict_keeps_review_open() {
        let db = Database::in_memory().unwrap();
        let recorder = FeedbackRecorder::new(Arc::new(db.clone()), 100);
        let id = db.enqueue_review(&escalation(&documentary("1", "u1"))).unwrap();

        let err = db
            .resolve_review(id, Decision::NeedsReview, "", None, &recorder)
            .unwrap_err();
        assert!(matches!(err, StorageError::Learning(_)));
        assert!(db.get_review(id).unwrap().unwrap().is_open());
    }

    #[test]
    fn test_concurrent_resolves_record_once() {
        let db = Arc::new(Database::in_memory().unwrap());
        let recorder = FeedbackRecorder::new(db.clone(), 100);
        let id = db.enqueue_review(&escalation(&documentary("1", "u1"))).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                let recorder = recorder.clone();
                std::thread::spawn(move || {
                    db.resolve_review(id, Decision::Approved, "", None, &recorder)
                })
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, StorageError::InvalidState(_))));
        assert_eq!(db.recent_feedback(10).unwrap().len(), 1);
        assert_eq!(db.requester_stats("u1").unwrap().unwrap().total_requests, 1);
    }

    #[test]
    fn test_failed_learn_pass_still_closes_review() {
        struct NoLearning;

        impl PatternStore for NoLearning {
            fn record_feedback(&self, _: NewFeedback) -> std::result::Result<i64, LearningError> {
                Err(LearningError::Backend("read-only".to_string()))
            }
            fn pending_feedback_count(&self) -> std::result::Result<u64, LearningError> {
                Ok(1)
            }
            fn batch_learn(&self) -> std::result::Result<LearnReport, LearningError> {
                Err(LearningError::Backend("learner offline".to_string()))
            }
            fn top_pattern(
                &self,
                _: PatternKind,
                _: &str,
            ) -> std::result::Result<Option<LearnedPattern>, LearningError> {
                Ok(None)
            }
            fn patterns(&self) -> std::result::Result<Vec<LearnedPattern>, LearningError> {
                Ok(Vec::new())
            }
        }

        let db = Database::in_memory().unwrap();
        let recorder = FeedbackRecorder::new(Arc::new(NoLearning), 1);
        let id = db.enqueue_review(&escalation(&documentary("1", "u1"))).unwrap();

        let outcome = db
            .resolve_review(id, Decision::Approved, "", None, &recorder)
            .unwrap();
        assert!(outcome.learned.is_none());
        assert!(!db.get_review(id).unwrap().unwrap().is_open());

        // A retry cannot add a second record
        let err = db
            .resolve_review(id, Decision::Approved, "", None, &recorder)
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidState(_)));
        assert_eq!(db.count_pending_feedback().unwrap(), 1);
    }

    #[test]
    fn test_resolve_missing_review() {
        let db = Database::in_memory().unwrap();
        let recorder = FeedbackRecorder::new(Arc::new(db.clone()), 100);
        let err = db
            .resolve_review(9, Decision::Approved, "", None, &recorder)
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    // ==================== Engine Integration Tests ====================

    #[tokio::test]
    async fn test_engine_escalations_land_in_database() {
        let db = Arc::new(Database::in_memory().unwrap());
        let engine = DecisionEngine::new(RuleConfiguration::default(), db.clone())
            .unwrap()
            .with_pattern_store(db.clone());

        let request = ModerationRequest::new("9", "Unknown Indie")
            .with_year(2011)
            .with_rating(6.0)
            .with_popularity(50.0)
            .with_genres(["Drama"]);
        let decision = engine.decide(&request).await.unwrap();
        assert_eq!(decision.decision, Decision::NeedsReview);
        assert_eq!(db.count_open_reviews().unwrap(), 1);

        // Staff keep approving dramas; the engine learns to do the same
        let recorder = engine.feedback_recorder().unwrap();
        let review = db.list_open_reviews(1).unwrap().remove(0);
        db.resolve_review(review.id, Decision::Approved, "fine", None, &recorder)
            .unwrap();
        for i in 0..4 {
            recorder
                .record(NewFeedback::new(
                    ModerationRequest::new(i.to_string(), "Other").with_genres(["Drame"]),
                    Decision::NeedsReview,
                    Decision::Approved,
                    "",
                ))
                .unwrap();
        }
        recorder.learn_now().unwrap();

        let decision = engine.decide(&request).await.unwrap();
        assert_eq!(decision.decision, Decision::Approved);
        assert_eq!(decision.path, DecisionPath::Learned);
        assert_eq!(db.count_open_reviews().unwrap(), 0);
    }

    // ==================== Persistence Tests ====================

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("reelgate.db");

        {
            let db = Database::with_path(&path).unwrap();
            db.record_feedback(NewFeedback::new(
                documentary("1", "u1"),
                Decision::NeedsReview,
                Decision::Rejected,
                "",
            ))
            .unwrap();
            db.batch_learn().unwrap();
        }

        let db = Database::with_path(&path).unwrap();
        let top = db
            .find_top_pattern(PatternKind::Genre, "Documentary")
            .unwrap()
            .unwrap();
        assert_eq!(top.decision, Decision::Rejected);
        assert_eq!(db.requester_stats("u1").unwrap().unwrap().total_requests, 1);
    }
}
