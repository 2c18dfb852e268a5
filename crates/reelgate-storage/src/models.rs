//! Data models for storage.
//!
//! Feedback records and learned patterns use the core types directly
//! ([`reelgate_core::learning::FeedbackRecord`],
//! [`reelgate_core::learning::LearnedPattern`]); only the storage-owned
//! tables get their own models.

use chrono::{DateTime, Utc};
use reelgate_core::{DecisionPath, ModerationRequest};
use serde::{Deserialize, Serialize};

/// Lifecycle of a queued review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Waiting for staff.
    Open,
    /// Staff gave a verdict.
    Resolved,
}

impl ReviewStatus {
    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Open => "open",
            ReviewStatus::Resolved => "resolved",
        }
    }

    /// Parse from database string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(ReviewStatus::Open),
            "resolved" => Some(ReviewStatus::Resolved),
            _ => None,
        }
    }
}

/// An escalated request in the review queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReview {
    /// Unique identifier.
    pub id: i64,
    pub request_id: String,
    pub title: String,
    /// Why the engine escalated.
    pub reason: String,
    /// Engine confidence at escalation time.
    pub confidence: f32,
    /// Stage that escalated.
    pub path: DecisionPath,
    /// The request as decided.
    pub snapshot: ModerationRequest,
    pub status: ReviewStatus,
    /// Feedback written when the review was resolved.
    pub feedback_id: Option<i64>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PendingReview {
    pub fn is_open(&self) -> bool {
        self.status == ReviewStatus::Open
    }
}

/// Per-requester totals of staff verdicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterStats {
    pub requester_id: String,
    pub display_name: String,
    /// Feedback records naming this requester.
    pub total_requests: i64,
    pub approved_count: i64,
    pub rejected_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl RequesterStats {
    /// Share of resolved requests that staff approved.
    pub fn approval_rate(&self) -> Option<f64> {
        if self.total_requests == 0 {
            None
        } else {
            Some(self.approved_count as f64 / self.total_requests as f64)
        }
    }
}
