//! Feedback recording with caller-side batch scheduling.

use std::sync::Arc;

use tracing::{debug, info};

use super::{LearnReport, LearningError, NewFeedback, PatternStore};

/// Result of recording one staff verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub feedback_id: i64,
    /// Present if this write crossed the batch threshold.
    pub learned: Option<LearnReport>,
}

/// Records staff verdicts and schedules batch-learn passes.
///
/// The store only appends; this recorder decides when a learn pass runs.
#[derive(Clone)]
pub struct FeedbackRecorder {
    store: Arc<dyn PatternStore>,
    batch_threshold: u64,
}

impl FeedbackRecorder {
    pub fn new(store: Arc<dyn PatternStore>, batch_threshold: u64) -> Self {
        Self {
            store,
            batch_threshold: batch_threshold.max(1),
        }
    }

    /// Stores a staff verdict, then learns if enough feedback is pending.
    pub fn record(&self, feedback: NewFeedback) -> Result<RecordOutcome, LearningError> {
        let request_id = feedback.request_id.clone();
        let human = feedback.human_decision;
        let feedback_id = self.store.record_feedback(feedback)?;
        info!(feedback_id, %request_id, decision = %human, "Recorded staff decision");

        self.schedule(feedback_id)
    }

    /// Runs a learn pass if the pending count has reached the threshold.
    ///
    /// For feedback the store already holds, e.g. written in the same
    /// transaction that closed a review.
    pub fn schedule(&self, feedback_id: i64) -> Result<RecordOutcome, LearningError> {
        let pending = self.store.pending_feedback_count()?;
        if pending < self.batch_threshold {
            debug!(pending, threshold = self.batch_threshold, "Batch threshold not reached");
            return Ok(RecordOutcome {
                feedback_id,
                learned: None,
            });
        }

        info!(pending, "Learning threshold reached, training patterns");
        let report = self.store.batch_learn()?;
        Ok(RecordOutcome {
            feedback_id,
            learned: Some(report),
        })
    }

    /// Runs a batch-learn pass regardless of the threshold.
    pub fn learn_now(&self) -> Result<LearnReport, LearningError> {
        self.store.batch_learn()
    }

    pub fn batch_threshold(&self) -> u64 {
        self.batch_threshold
    }
}
