//! Reelgate Core - moderation decisions for media acquisition requests.
//!
//! This crate turns a normalized request into an approve / reject / review
//! decision. Evaluation is layered:
//!
//! 1. Learned patterns from past staff corrections (optional short-circuit)
//! 2. Strict policy rules (pre-check, authoritative)
//! 3. Semantic classifier (external, behind [`classifier::SemanticClassifier`])
//! 4. Rule validation of the classifier verdict
//!
//! When no classifier is available, the base rule cascade decides instead.
//! Escalations are handed to a [`review::ReviewQueue`]; staff verdicts flow
//! back through [`learning::FeedbackRecorder`].

pub mod cascade;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod engine;
pub mod genres;
pub mod learning;
pub mod request;
pub mod review;
pub mod strict;
pub mod validator;

pub use config::{ConfigError, RuleConfiguration};
pub use decision::{
    ConfidenceAdjustment, Decision, DecisionPath, FinalDecision, RuleId, ValidationResult,
};
pub use engine::{DecisionEngine, EngineError};
pub use request::{MediaType, ModerationRequest, TrustLevel};
