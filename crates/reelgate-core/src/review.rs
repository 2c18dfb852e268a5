//! Hand-off of escalated requests to staff review.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decision::{Decision, DecisionPath, FinalDecision};
use crate::request::ModerationRequest;

/// Errors from a review queue.
#[derive(Debug, Error)]
pub enum ReviewQueueError {
    /// The queue backend rejected or lost the item.
    #[error("review queue unavailable: {0}")]
    Unavailable(String),
}

/// An escalated request waiting for staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub request_id: String,
    /// Always [`Decision::NeedsReview`].
    pub decision: Decision,
    pub reason: String,
    pub confidence: f32,
    pub path: DecisionPath,
    /// The request as decided, kept so the staff verdict can be learned from.
    pub snapshot: ModerationRequest,
}

impl ReviewItem {
    /// Builds a review item from an escalated decision.
    pub fn new(request: &ModerationRequest, decision: &FinalDecision) -> Self {
        Self {
            request_id: request.request_id.clone(),
            decision: Decision::NeedsReview,
            reason: decision.reason.clone(),
            confidence: decision.confidence,
            path: decision.path.clone(),
            snapshot: request.clone(),
        }
    }
}

/// Consumer of escalated decisions.
pub trait ReviewQueue: Send + Sync {
    /// Queues an item for staff review.
    fn submit(&self, item: ReviewItem) -> Result<(), ReviewQueueError>;
}

/// Review queue kept in memory.
#[derive(Debug, Default)]
pub struct MemoryReviewQueue {
    items: Mutex<Vec<ReviewItem>>,
}

impl MemoryReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<ReviewItem>>, ReviewQueueError> {
        self.items
            .lock()
            .map_err(|_| ReviewQueueError::Unavailable("queue lock poisoned".to_string()))
    }

    /// Returns a copy of every queued item.
    pub fn items(&self) -> Result<Vec<ReviewItem>, ReviewQueueError> {
        Ok(self.lock()?.clone())
    }
}

impl ReviewQueue for MemoryReviewQueue {
    fn submit(&self, item: ReviewItem) -> Result<(), ReviewQueueError> {
        self.lock()?.push(item);
        Ok(())
    }
}
