//! Semantic classification of requests.
//!
//! The classifier is an external collaborator: given the enriched request
//! context it returns a preliminary decision with confidence, reasoning and
//! per-dimension risk scores. Any error means "unavailable"; the engine then
//! falls back to the base rule cascade.

mod chat;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::RuleConfiguration;
use crate::decision::Decision;
use crate::genres;
use crate::request::{MediaType, ModerationRequest, TrustLevel};

pub use chat::{ChatClassifier, ChatClassifierConfig};

/// Errors from a semantic classifier. Every variant is treated as
/// "classifier unavailable".
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// No credentials or endpoint configured.
    #[error("classifier not configured: {0}")]
    NotConfigured(String),

    /// Network or transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("classifier returned HTTP {0}")]
    Status(u16),

    /// No answer within the allotted time.
    #[error("classifier timed out after {0:?}")]
    Timeout(Duration),

    /// The answer could not be interpreted.
    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

/// Risk scores on a 0-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub quality: f32,
    pub storage: f32,
    pub appropriateness: f32,
    pub user_trust: f32,
}

impl Default for RiskFactors {
    fn default() -> Self {
        Self {
            quality: 5.0,
            storage: 5.0,
            appropriateness: 5.0,
            user_trust: 5.0,
        }
    }
}

/// Preliminary verdict from a semantic classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResult {
    pub decision: Decision,
    /// Confidence (0.0 to 1.0).
    pub confidence: f32,
    /// Short reason suitable for display.
    pub reason: String,
    /// Longer explanation of the classifier's reasoning.
    pub detailed_reasoning: String,
    pub risk_factors: RiskFactors,
    /// Overall value of the title (0-10).
    pub value_score: f32,
}

impl ClassifierResult {
    /// Creates a result with default risk factors and value score.
    pub fn new(decision: Decision, confidence: f32, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            decision,
            confidence: confidence.clamp(0.0, 1.0),
            detailed_reasoning: reason.clone(),
            reason,
            risk_factors: RiskFactors::default(),
            value_score: 5.0,
        }
    }
}

/// Everything the classifier is told about a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierContext {
    pub title: String,
    pub media_type: MediaType,
    pub year: Option<i32>,
    pub rating: Option<f32>,
    pub popularity: f32,
    /// Normalized genres.
    pub genres: Vec<String>,
    pub season_count: u32,
    pub episode_count: u32,
    pub requester: String,
    pub account_age_days: Option<u32>,
    pub trust_level: TrustLevel,
    /// Episode count exceeds the configured review threshold.
    pub long_series: bool,
}

impl ClassifierContext {
    /// Builds the enriched context for a request.
    pub fn from_request(request: &ModerationRequest, config: &RuleConfiguration) -> Self {
        Self {
            title: request.title.clone(),
            media_type: request.media_type,
            year: request.year,
            rating: request.known_rating(),
            popularity: request.popularity,
            genres: genres::normalize(&request.genres),
            season_count: request.season_count,
            episode_count: request.episode_count,
            requester: request.requester_display_name.clone(),
            account_age_days: request.account_age_days,
            trust_level: request.trust_level(),
            long_series: request.episode_count > config.needs_review.episode_count_above,
        }
    }
}

/// Contract for semantic classifiers.
///
/// Implementations must fail closed: an unusable answer is an error, never a
/// guessed decision.
#[async_trait]
pub trait SemanticClassifier: Send + Sync {
    /// Classifies the request described by `context`.
    async fn classify(&self, context: &ClassifierContext)
        -> Result<ClassifierResult, ClassifierError>;

    /// Returns the name of this classifier for logging.
    fn name(&self) -> &'static str;
}
