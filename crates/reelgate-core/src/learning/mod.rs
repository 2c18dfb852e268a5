//! Learning from staff corrections.
//!
//! Staff verdicts on escalated requests are stored as feedback. A batch pass
//! folds un-applied feedback into per-genre [`LearnedPattern`] counters, and
//! [`PatternStore::suggest`] turns those counters into a decision for new
//! requests. Learning is frequency-based: the pattern seen most often wins.

mod memory;
mod recorder;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decision::Decision;
use crate::genres;
use crate::request::ModerationRequest;

pub use memory::MemoryPatternStore;
pub use recorder::{FeedbackRecorder, RecordOutcome};

/// Upper bound on the confidence of a learned suggestion.
pub const MAX_PATTERN_CONFIDENCE: f32 = 0.85;

// Percent points, so thresholds like 0.75 compare exactly.
const BASE_PATTERN_CONFIDENCE: u32 = 60;
const CONFIDENCE_PER_OCCURRENCE: u32 = 5;
const MAX_PATTERN_PERCENT: u32 = 85;

/// Confidence derived from how often a pattern recurred.
///
/// Non-decreasing in `occurrences`, bounded by [`MAX_PATTERN_CONFIDENCE`].
pub fn pattern_confidence(occurrences: u32) -> f32 {
    let percent = occurrences
        .saturating_mul(CONFIDENCE_PER_OCCURRENCE)
        .saturating_add(BASE_PATTERN_CONFIDENCE)
        .min(MAX_PATTERN_PERCENT);
    percent as f32 / 100.0
}

/// Errors from the learning loop.
#[derive(Debug, Error)]
pub enum LearningError {
    /// The pattern store could not be read or written.
    #[error("pattern store unavailable: {0}")]
    Backend(String),

    /// The feedback cannot be recorded as given.
    #[error("invalid feedback: {0}")]
    InvalidFeedback(String),
}

/// Request attribute a pattern is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Genre,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Genre => "genre",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "genre" => Some(PatternKind::Genre),
            _ => None,
        }
    }
}

/// Aggregate of staff verdicts for one attribute value and decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub kind: PatternKind,
    /// Attribute value, e.g. a canonical genre.
    pub value: String,
    /// Staff verdict this pattern counts.
    pub decision: Decision,
    /// Number of feedback records that contributed (>= 1).
    pub occurrences: u32,
}

impl LearnedPattern {
    pub fn confidence(&self) -> f32 {
        pattern_confidence(self.occurrences)
    }
}

/// Decision suggested by learned patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub decision: Decision,
    pub confidence: f32,
    pub reason: String,
    /// The pattern the suggestion came from.
    pub pattern: LearnedPattern,
}

impl From<LearnedPattern> for Suggestion {
    fn from(pattern: LearnedPattern) -> Self {
        Self {
            decision: pattern.decision,
            confidence: pattern.confidence(),
            reason: format!(
                "Learned from {} similar past decisions ({}: {})",
                pattern.occurrences,
                pattern.kind.as_str(),
                pattern.value
            ),
            pattern,
        }
    }
}

/// A staff verdict on an escalated request, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub request_id: String,
    /// What the engine decided.
    pub ai_decision: Decision,
    pub ai_confidence: Option<f32>,
    pub ai_reason: Option<String>,
    /// What staff decided. Must be `Approved` or `Rejected`.
    pub human_decision: Decision,
    pub human_reason: String,
    pub staff_username: Option<String>,
    /// The request as it was when decided.
    pub snapshot: ModerationRequest,
}

impl NewFeedback {
    /// Creates feedback with the required fields.
    pub fn new(
        snapshot: ModerationRequest,
        ai_decision: Decision,
        human_decision: Decision,
        human_reason: impl Into<String>,
    ) -> Self {
        Self {
            request_id: snapshot.request_id.clone(),
            ai_decision,
            ai_confidence: None,
            ai_reason: None,
            human_decision,
            human_reason: human_reason.into(),
            staff_username: None,
            snapshot,
        }
    }

    pub fn with_ai_details(mut self, confidence: f32, reason: impl Into<String>) -> Self {
        self.ai_confidence = Some(confidence);
        self.ai_reason = Some(reason.into());
        self
    }

    pub fn with_staff(mut self, username: impl Into<String>) -> Self {
        self.staff_username = Some(username.into());
        self
    }

    /// Checks that the staff verdict is a final decision.
    pub fn validate(&self) -> Result<(), LearningError> {
        if !self.human_decision.is_terminal() {
            return Err(LearningError::InvalidFeedback(format!(
                "human decision must be APPROVED or REJECTED, got {}",
                self.human_decision
            )));
        }
        Ok(())
    }

    /// Canonical genres this feedback teaches about, without duplicates.
    pub fn learnable_genres(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for genre in genres::normalize(&self.snapshot.genres) {
            if !seen.contains(&genre) {
                seen.push(genre);
            }
        }
        seen
    }
}

/// A stored feedback record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: i64,
    pub feedback: NewFeedback,
    /// Set once a batch pass has absorbed this record.
    pub learning_applied: bool,
    pub created_at: DateTime<Utc>,
}

/// Summary of a batch-learn pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnReport {
    /// Feedback records absorbed.
    pub feedback_processed: usize,
    /// Pattern upserts performed.
    pub patterns_updated: usize,
}

/// Storage for feedback and learned patterns.
///
/// Implementations serialize writes so concurrent upserts of the same
/// pattern never lose an increment.
pub trait PatternStore: Send + Sync {
    /// Appends a feedback record and returns its id. Never learns.
    fn record_feedback(&self, feedback: NewFeedback) -> Result<i64, LearningError>;

    /// Number of records not yet absorbed by a batch pass.
    fn pending_feedback_count(&self) -> Result<u64, LearningError>;

    /// Absorbs every un-applied record into patterns and marks it applied.
    ///
    /// Running it again without new feedback changes nothing.
    fn batch_learn(&self) -> Result<LearnReport, LearningError>;

    /// Highest-occurrence pattern for a value, across all decisions.
    fn top_pattern(
        &self,
        kind: PatternKind,
        value: &str,
    ) -> Result<Option<LearnedPattern>, LearningError>;

    /// All patterns, most frequent first.
    fn patterns(&self) -> Result<Vec<LearnedPattern>, LearningError>;

    /// Suggests a decision from learned genre patterns.
    ///
    /// Each genre contributes its most frequent pattern; the contribution
    /// with the most occurrences overall wins (earliest genre on ties).
    fn suggest(&self, request: &ModerationRequest) -> Result<Option<Suggestion>, LearningError> {
        let mut best: Option<LearnedPattern> = None;
        for genre in genres::normalize(&request.genres) {
            if let Some(pattern) = self.top_pattern(PatternKind::Genre, &genre)? {
                let better = best
                    .as_ref()
                    .map_or(true, |b| pattern.occurrences > b.occurrences);
                if better {
                    best = Some(pattern);
                }
            }
        }
        Ok(best.map(Suggestion::from))
    }
}
