//! In-process pattern store.
//!
//! Uses a simple Mutex-protected state. Suitable for tests and for
//! deployments that do not need patterns to survive a restart.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::info;

use super::{
    FeedbackRecord, LearnReport, LearnedPattern, LearningError, NewFeedback, PatternKind,
    PatternStore,
};

#[derive(Debug, Default)]
struct State {
    feedback: Vec<FeedbackRecord>,
    /// Insertion order doubles as the tie-break order.
    patterns: Vec<LearnedPattern>,
    next_id: i64,
}

/// Pattern store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryPatternStore {
    state: Mutex<State>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, LearningError> {
        self.state
            .lock()
            .map_err(|_| LearningError::Backend("pattern store lock poisoned".to_string()))
    }

    /// Returns a copy of every stored feedback record.
    pub fn feedback(&self) -> Result<Vec<FeedbackRecord>, LearningError> {
        Ok(self.lock()?.feedback.clone())
    }
}

impl PatternStore for MemoryPatternStore {
    fn record_feedback(&self, feedback: NewFeedback) -> Result<i64, LearningError> {
        feedback.validate()?;
        let mut state = self.lock()?;
        state.next_id += 1;
        let id = state.next_id;
        state.feedback.push(FeedbackRecord {
            id,
            feedback,
            learning_applied: false,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    fn pending_feedback_count(&self) -> Result<u64, LearningError> {
        let state = self.lock()?;
        Ok(state.feedback.iter().filter(|r| !r.learning_applied).count() as u64)
    }

    fn batch_learn(&self) -> Result<LearnReport, LearningError> {
        let mut guard = self.lock()?;
        let state = &mut *guard;
        let mut report = LearnReport::default();

        for record in state.feedback.iter_mut().filter(|r| !r.learning_applied) {
            let decision = record.feedback.human_decision;
            for genre in record.feedback.learnable_genres() {
                let existing = state.patterns.iter_mut().find(|p| {
                    p.kind == PatternKind::Genre && p.value == genre && p.decision == decision
                });
                match existing {
                    Some(pattern) => pattern.occurrences += 1,
                    None => state.patterns.push(LearnedPattern {
                        kind: PatternKind::Genre,
                        value: genre,
                        decision,
                        occurrences: 1,
                    }),
                }
                report.patterns_updated += 1;
            }
            record.learning_applied = true;
            report.feedback_processed += 1;
        }

        if report.feedback_processed > 0 {
            info!(
                feedback = report.feedback_processed,
                patterns = report.patterns_updated,
                "Learned patterns from feedback"
            );
        }
        Ok(report)
    }

    fn top_pattern(
        &self,
        kind: PatternKind,
        value: &str,
    ) -> Result<Option<LearnedPattern>, LearningError> {
        let state = self.lock()?;
        let mut best: Option<&LearnedPattern> = None;
        for pattern in state
            .patterns
            .iter()
            .filter(|p| p.kind == kind && p.value == value)
        {
            if best.map_or(true, |b| pattern.occurrences > b.occurrences) {
                best = Some(pattern);
            }
        }
        Ok(best.cloned())
    }

    fn patterns(&self) -> Result<Vec<LearnedPattern>, LearningError> {
        let mut patterns = self.lock()?.patterns.clone();
        patterns.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Decision;
    use crate::request::ModerationRequest;

    fn feedback(genres: &[&str], human: Decision) -> NewFeedback {
        let snapshot = ModerationRequest::new("r", "t").with_genres(genres.iter().copied());
        NewFeedback::new(snapshot, Decision::NeedsReview, human, "staff call")
    }

    #[test]
    fn record_does_not_learn() {
        let store = MemoryPatternStore::new();
        store
            .record_feedback(feedback(&["Drama"], Decision::Approved))
            .unwrap();
        assert_eq!(store.pending_feedback_count().unwrap(), 1);
        assert!(store.patterns().unwrap().is_empty());
    }

    #[test]
    fn record_rejects_non_terminal_verdict() {
        let store = MemoryPatternStore::new();
        let err = store
            .record_feedback(feedback(&["Drama"], Decision::NeedsReview))
            .unwrap_err();
        assert!(matches!(err, LearningError::InvalidFeedback(_)));
        assert_eq!(store.pending_feedback_count().unwrap(), 0);
    }

    #[test]
    fn batch_learn_upserts_per_genre_and_decision() {
        let store = MemoryPatternStore::new();
        store
            .record_feedback(feedback(&["Drama", "Crime"], Decision::Approved))
            .unwrap();
        store
            .record_feedback(feedback(&["Drame"], Decision::Approved))
            .unwrap();
        store
            .record_feedback(feedback(&["Drama"], Decision::Rejected))
            .unwrap();

        let report = store.batch_learn().unwrap();
        assert_eq!(report.feedback_processed, 3);
        assert_eq!(report.patterns_updated, 4);
        assert_eq!(store.pending_feedback_count().unwrap(), 0);

        let top = store
            .top_pattern(PatternKind::Genre, "Drama")
            .unwrap()
            .unwrap();
        assert_eq!(top.decision, Decision::Approved);
        assert_eq!(top.occurrences, 2);
        assert_eq!(store.patterns().unwrap().len(), 3);
        assert!(store.feedback().unwrap().iter().all(|r| r.learning_applied));
    }

    #[test]
    fn batch_learn_is_idempotent() {
        let store = MemoryPatternStore::new();
        for _ in 0..3 {
            store
                .record_feedback(feedback(&["Horror"], Decision::Rejected))
                .unwrap();
        }
        store.batch_learn().unwrap();
        let before = store.patterns().unwrap();

        let report = store.batch_learn().unwrap();
        assert_eq!(report, LearnReport::default());
        assert_eq!(store.patterns().unwrap(), before);
    }

    #[test]
    fn top_pattern_prefers_first_on_tie() {
        let store = MemoryPatternStore::new();
        store
            .record_feedback(feedback(&["Western"], Decision::Rejected))
            .unwrap();
        store
            .record_feedback(feedback(&["Western"], Decision::Approved))
            .unwrap();
        store.batch_learn().unwrap();

        let top = store
            .top_pattern(PatternKind::Genre, "Western")
            .unwrap()
            .unwrap();
        assert_eq!(top.decision, Decision::Rejected);
    }

    #[test]
    fn suggest_returns_none_without_patterns() {
        let store = MemoryPatternStore::new();
        let request = ModerationRequest::new("1", "x").with_genres(["Drama"]);
        assert!(store.suggest(&request).unwrap().is_none());
    }

    #[test]
    fn suggest_uses_majority_by_volume() {
        let store = MemoryPatternStore::new();
        for _ in 0..80 {
            store
                .record_feedback(feedback(&["Documentary"], Decision::Approved))
                .unwrap();
        }
        for _ in 0..20 {
            store
                .record_feedback(feedback(&["Documentary"], Decision::Rejected))
                .unwrap();
        }
        store.batch_learn().unwrap();

        let request = ModerationRequest::new("new", "Planet").with_genres(["Documentaire"]);
        let suggestion = store.suggest(&request).unwrap().unwrap();
        assert_eq!(suggestion.decision, Decision::Approved);
        assert_eq!(suggestion.pattern.occurrences, 80);
        assert_eq!(suggestion.confidence, 0.85);
    }

    #[test]
    fn suggest_picks_genre_with_most_occurrences() {
        let store = MemoryPatternStore::new();
        for _ in 0..2 {
            store
                .record_feedback(feedback(&["Comedy"], Decision::Approved))
                .unwrap();
        }
        for _ in 0..5 {
            store
                .record_feedback(feedback(&["Horror"], Decision::Rejected))
                .unwrap();
        }
        store.batch_learn().unwrap();

        let request = ModerationRequest::new("1", "Scary Movie").with_genres(["Comedy", "Horror"]);
        let suggestion = store.suggest(&request).unwrap().unwrap();
        assert_eq!(suggestion.decision, Decision::Rejected);
        assert_eq!(suggestion.pattern.value, "Horror");
    }
}
