//! Decision orchestrator.
//!
//! Sequences the evaluation stages for one request:
//!
//! 1. Learned patterns (if enabled and a store is attached) short-circuit
//!    when their confidence is above `machine_learning.min_confidence`
//! 2. Strict pre-check; a match is final
//! 3. Semantic classifier, bounded by a timeout
//! 4. Rule validation of the classifier verdict
//!
//! If the classifier is missing or fails, the base rule cascade replaces
//! steps 3 and 4. Every `NEEDS_REVIEW` outcome is submitted to the review
//! queue before it is returned.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cascade::BaseRuleCascade;
use crate::classifier::{ClassifierContext, ClassifierError, SemanticClassifier};
use crate::config::{ConfigError, RuleConfiguration};
use crate::decision::{DecisionPath, FinalDecision, RuleId, ValidationResult};
use crate::learning::{FeedbackRecorder, PatternStore};
use crate::request::ModerationRequest;
use crate::review::{ReviewItem, ReviewQueue, ReviewQueueError};
use crate::strict::StrictRuleEvaluator;
use crate::validator::RuleValidator;

/// Default upper bound on a classifier call.
pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors surfaced by [`DecisionEngine::decide`].
///
/// Classifier and pattern-store failures are absorbed; only a failed review
/// hand-off is reported, because the escalation would otherwise be lost.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to queue request {request_id} for review: {source}")]
    ReviewQueue {
        request_id: String,
        #[source]
        source: ReviewQueueError,
    },
}

/// Decides moderation requests.
///
/// All collaborators are injected; the engine holds no global state and each
/// call to [`decide`](Self::decide) is independent.
pub struct DecisionEngine {
    config: Arc<RuleConfiguration>,
    cascade: BaseRuleCascade,
    classifier: Option<Arc<dyn SemanticClassifier>>,
    classifier_timeout: Duration,
    patterns: Option<Arc<dyn PatternStore>>,
    review_queue: Arc<dyn ReviewQueue>,
}

impl DecisionEngine {
    /// Creates an engine with no classifier and no pattern store.
    pub fn new(
        config: RuleConfiguration,
        review_queue: Arc<dyn ReviewQueue>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let cascade = BaseRuleCascade::new(config.clone())?;
        Ok(Self {
            config: Arc::new(config),
            cascade,
            classifier: None,
            classifier_timeout: DEFAULT_CLASSIFIER_TIMEOUT,
            patterns: None,
            review_queue,
        })
    }

    /// Attaches a semantic classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn SemanticClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Sets the classifier timeout.
    pub fn with_classifier_timeout(mut self, timeout: Duration) -> Self {
        self.classifier_timeout = timeout;
        self
    }

    /// Attaches a learned-pattern store.
    pub fn with_pattern_store(mut self, store: Arc<dyn PatternStore>) -> Self {
        self.patterns = Some(store);
        self
    }

    pub fn config(&self) -> &RuleConfiguration {
        &self.config
    }

    /// Returns a feedback recorder sharing this engine's pattern store.
    pub fn feedback_recorder(&self) -> Option<FeedbackRecorder> {
        self.patterns.as_ref().map(|store| {
            FeedbackRecorder::new(
                Arc::clone(store),
                self.config.machine_learning.batch_threshold,
            )
        })
    }

    /// Decides one request.
    pub async fn decide(&self, request: &ModerationRequest) -> Result<FinalDecision, EngineError> {
        let decision = self.evaluate(request).await;
        info!(
            request_id = %request.request_id,
            title = %request.title,
            decision = %decision.decision,
            confidence = decision.confidence,
            path = %decision.path,
            "Moderation decision"
        );

        if decision.needs_review() {
            self.review_queue
                .submit(ReviewItem::new(request, &decision))
                .map_err(|source| EngineError::ReviewQueue {
                    request_id: request.request_id.clone(),
                    source,
                })?;
        }

        Ok(decision)
    }

    async fn evaluate(&self, request: &ModerationRequest) -> FinalDecision {
        if let Some(learned) = self.learned(request) {
            return learned;
        }

        let strict = StrictRuleEvaluator::new(&self.config).precheck(request);
        if !strict.is_pending() {
            let path = DecisionPath::RuleStrict {
                rules: strict.rules_matched.clone(),
            };
            return finalize(strict, path);
        }

        let verdict = match self.classify(request).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(request_id = %request.request_id, error = %e, "Classifier unavailable, using rule cascade");
                let result = self.cascade.evaluate(request);
                let rule = result
                    .rules_matched
                    .first()
                    .copied()
                    .unwrap_or(RuleId::NoMatch);
                return finalize(result, DecisionPath::Fallback { rule });
            }
        };

        let validated = RuleValidator::new(&self.config).validate(&verdict, request);
        let path = if validated.rule_override {
            DecisionPath::AiOverride {
                rules: validated.rules_matched.clone(),
            }
        } else {
            DecisionPath::AiPrimary
        };
        finalize(validated, path)
    }

    fn learned(&self, request: &ModerationRequest) -> Option<FinalDecision> {
        let ml = &self.config.machine_learning;
        if !ml.enabled {
            return None;
        }
        let store = self.patterns.as_ref()?;

        let suggestion = match store.suggest(request) {
            Ok(Some(s)) => s,
            Ok(None) => return None,
            Err(e) => {
                warn!(request_id = %request.request_id, error = %e, "Pattern lookup failed, skipping");
                return None;
            }
        };

        if suggestion.confidence > ml.min_confidence {
            Some(FinalDecision {
                decision: suggestion.decision,
                confidence: suggestion.confidence,
                reason: suggestion.reason,
                path: DecisionPath::Learned,
            })
        } else {
            debug!(
                confidence = suggestion.confidence,
                "Learned suggestion below threshold"
            );
            None
        }
    }

    async fn classify(
        &self,
        request: &ModerationRequest,
    ) -> Result<crate::classifier::ClassifierResult, ClassifierError> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| ClassifierError::NotConfigured("no classifier attached".to_string()))?;

        let context = ClassifierContext::from_request(request, &self.config);
        debug!(classifier = classifier.name(), trust = ?context.trust_level, "Classifying");

        tokio::time::timeout(self.classifier_timeout, classifier.classify(&context))
            .await
            .map_err(|_| ClassifierError::Timeout(self.classifier_timeout))?
    }
}

fn finalize(result: ValidationResult, path: DecisionPath) -> FinalDecision {
    FinalDecision {
        decision: result.final_decision,
        confidence: result.final_confidence,
        reason: result.final_reason,
        path,
    }
}
