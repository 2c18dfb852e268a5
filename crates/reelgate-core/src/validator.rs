//! Rule validation of a classifier verdict (post-check).
//!
//! Runs only when the strict pre-check left the request pending. Rules act
//! on the classifier's verdict in two ways:
//!
//! - **Reinforcement**: a strict rule that agrees with the verdict raises
//!   confidence by a fixed delta (capped at 1.0). A strict rule that
//!   disagrees overrides the verdict.
//! - **Soft escalation**: long series and new-account + obscure requests
//!   lower confidence (never below [`CONFIDENCE_FLOOR`]) and escalate to
//!   review if it ends up below [`ESCALATION_THRESHOLD`].
//!
//! Escalation runs after reinforcement and sees the adjusted confidence.
//! Both soft rules are gated on the classifier's own verdict, so an earlier
//! escalation does not cancel a later penalty.

use tracing::debug;

use crate::classifier::ClassifierResult;
use crate::config::RuleConfiguration;
use crate::decision::{ConfidenceAdjustment, Decision, RuleId, ValidationResult};
use crate::genres;
use crate::request::ModerationRequest;

/// Confidence below which a degraded verdict is escalated to review.
pub const ESCALATION_THRESHOLD: f32 = 0.75;

/// Soft rules never push confidence below this value.
pub const CONFIDENCE_FLOOR: f32 = 0.5;

/// Long-series rule applies only below this classifier confidence.
const LONG_SERIES_GATE: f32 = 0.90;
const LONG_SERIES_PENALTY: f32 = 0.15;

/// New-user rule applies only below this classifier confidence.
const NEW_USER_GATE: f32 = 0.85;
const NEW_USER_PENALTY: f32 = 0.10;

/// Validates classifier verdicts against a rule configuration.
#[derive(Debug, Clone, Copy)]
pub struct RuleValidator<'a> {
    config: &'a RuleConfiguration,
}

/// Running state of one validation pass.
struct Pass {
    result: ValidationResult,
    override_reason: Option<String>,
}

impl Pass {
    fn new(verdict: &ClassifierResult) -> Self {
        Self {
            result: ValidationResult {
                final_decision: verdict.decision,
                final_confidence: verdict.confidence.clamp(0.0, 1.0),
                final_reason: verdict.reason.clone(),
                ..Default::default()
            },
            override_reason: None,
        }
    }

    /// Applies a strict rule whose condition held.
    fn strict(
        &mut self,
        verdict: &ClassifierResult,
        rule: RuleId,
        implied: Decision,
        override_confidence: f32,
        delta: f32,
        reason: String,
    ) {
        self.result.rules_matched.push(rule);
        if verdict.decision == implied {
            self.adjust(rule, delta, reason);
        } else {
            debug!(%rule, %implied, "Rule overrides classifier");
            self.result.final_decision = implied;
            self.result.final_confidence = override_confidence;
            self.result.rule_override = true;
            self.override_reason = Some(format!("Override: {reason}"));
        }
    }

    fn adjust(&mut self, rule: RuleId, delta: f32, reason: String) {
        let current = self.result.final_confidence;
        let next = if delta >= 0.0 {
            (current + delta).min(1.0)
        } else if current <= CONFIDENCE_FLOOR {
            current
        } else {
            (current + delta).max(CONFIDENCE_FLOOR)
        };
        debug!(%rule, delta, from = current, to = next, "Confidence adjusted");
        self.result.final_confidence = next;
        self.result.confidence_adjustments.push(ConfidenceAdjustment {
            rule,
            delta,
            reason,
        });
    }

    /// Applies a soft rule and escalates if confidence fell too far.
    fn soften(&mut self, rule: RuleId, penalty: f32, reason: String, escalation: &str) {
        self.adjust(rule, -penalty, reason);
        if self.result.final_confidence < ESCALATION_THRESHOLD {
            debug!(%rule, "Escalating to review");
            self.result.final_decision = Decision::NeedsReview;
            self.result.rule_override = true;
            self.override_reason = Some(escalation.to_string());
        }
    }

    fn finish(mut self) -> ValidationResult {
        if let Some(reason) = self.override_reason {
            self.result.final_reason = reason;
        }
        self.result
    }
}

impl<'a> RuleValidator<'a> {
    pub fn new(config: &'a RuleConfiguration) -> Self {
        Self { config }
    }

    /// Validates a classifier verdict for `request`.
    pub fn validate(
        &self,
        verdict: &ClassifierResult,
        request: &ModerationRequest,
    ) -> ValidationResult {
        let approve = &self.config.auto_approve;
        let reject = &self.config.auto_reject;
        let review = &self.config.needs_review;

        let rating = request.known_rating();
        let normalized = genres::normalize(&request.genres);
        let mut pass = Pass::new(verdict);

        if let Some(r) = rating.filter(|r| *r >= approve.rating_above) {
            pass.strict(
                verdict,
                RuleId::RatingAbove,
                Decision::Approved,
                0.95,
                0.10,
                format!("High rating ({r}/10) supports approval"),
            );
        }

        let approved = genres::matching(&normalized, &approve.genres);
        if !approved.is_empty() {
            pass.strict(
                verdict,
                RuleId::ApprovedGenre,
                Decision::Approved,
                0.90,
                0.05,
                format!("Preferred genre: {}", approved.join(", ")),
            );
        }

        if let Some(r) = rating.filter(|r| *r <= reject.rating_below) {
            pass.strict(
                verdict,
                RuleId::RatingBelow,
                Decision::Rejected,
                0.95,
                0.10,
                format!("Very low rating ({r}/10) supports rejection"),
            );
        }

        let banned = genres::matching(&normalized, &reject.genres);
        if !banned.is_empty() {
            pass.strict(
                verdict,
                RuleId::RejectedGenre,
                Decision::Rejected,
                0.95,
                0.10,
                format!("Banned genre: {}", banned.join(", ")),
            );
        }

        if request.episode_count > review.episode_count_above {
            pass.result.rules_matched.push(RuleId::EpisodeCount);
            if verdict.decision.is_terminal() && verdict.confidence < LONG_SERIES_GATE {
                pass.soften(
                    RuleId::EpisodeCount,
                    LONG_SERIES_PENALTY,
                    format!(
                        "Very long series ({} episodes) needs caution",
                        request.episode_count
                    ),
                    "Long series with low confidence, human review required",
                );
            }
        }

        let is_new_user = request
            .account_age_days
            .is_some_and(|days| days < review.new_user_days);
        if is_new_user && request.popularity < review.obscure_popularity_threshold {
            pass.result.rules_matched.push(RuleId::NewUserObscure);
            if verdict.decision.is_terminal() && verdict.confidence < NEW_USER_GATE {
                pass.soften(
                    RuleId::NewUserObscure,
                    NEW_USER_PENALTY,
                    "New user requesting obscure content".to_string(),
                    "New user with obscure content, human review required",
                );
            }
        }

        let result = pass.finish();
        debug!(
            rules = result.rules_matched.len(),
            adjustments = result.confidence_adjustments.len(),
            rule_override = result.rule_override,
            decision = %result.final_decision,
            confidence = result.final_confidence,
            "Validation complete"
        );
        result
    }
}
