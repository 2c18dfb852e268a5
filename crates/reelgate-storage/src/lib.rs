//! Reelgate Storage - SQLite persistence layer.
//!
//! This crate stores everything the decision engine learns from or hands
//! off:
//!
//! - Staff feedback on escalated requests, with the request snapshot
//! - Learned genre patterns (one counter per genre and verdict)
//! - The pending-review queue
//! - Per-requester verdict statistics
//!
//! [`Database`] implements the core's `PatternStore` and `ReviewQueue`
//! contracts, so it can be handed straight to the engine.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use reelgate_core::learning::{FeedbackRecorder, NewFeedback};
//! use reelgate_core::{Decision, ModerationRequest};
//! use reelgate_storage::Database;
//!
//! let db = Database::in_memory().unwrap();
//! let recorder = FeedbackRecorder::new(Arc::new(db.clone()), 100);
//!
//! let snapshot = ModerationRequest::new("42", "Planet Earth").with_genres(["Documentary"]);
//! recorder
//!     .record(NewFeedback::new(snapshot, Decision::NeedsReview, Decision::Approved, "Great"))
//!     .unwrap();
//! ```

mod database;
pub mod error;
pub mod models;
mod pool;
pub mod repository;
mod schema;

pub use database::Database;
pub use error::{Result, StorageError};
pub use models::{PendingReview, RequesterStats, ReviewStatus};
pub use pool::ConnectionPool;
pub use repository::{FeedbackRepo, PatternsRepo, RequestersRepo, ReviewsRepo};
