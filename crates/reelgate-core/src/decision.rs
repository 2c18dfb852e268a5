//! Decision types shared by every evaluation stage.
//!
//! A stage produces a [`ValidationResult`]; the orchestrator turns the one
//! that wins into a [`FinalDecision`] tagged with the [`DecisionPath`] that
//! produced it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Moderation verdict for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    /// Request is accepted automatically.
    Approved,
    /// Request is declined automatically.
    Rejected,
    /// Request must be resolved by staff.
    NeedsReview,
    /// Internal marker: the pre-check did not resolve the request.
    #[default]
    Pending,
}

impl Decision {
    /// Convert to the canonical string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "APPROVED",
            Decision::Rejected => "REJECTED",
            Decision::NeedsReview => "NEEDS_REVIEW",
            Decision::Pending => "PENDING",
        }
    }

    /// Parse from the canonical string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "APPROVED" => Some(Decision::Approved),
            "REJECTED" => Some(Decision::Rejected),
            "NEEDS_REVIEW" => Some(Decision::NeedsReview),
            "PENDING" => Some(Decision::Pending),
            _ => None,
        }
    }

    /// Returns true for verdicts that can be applied without staff.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Decision::Approved | Decision::Rejected)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a configured rule, used for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    /// Current/next-year release without a rating.
    UpcomingRelease,
    /// `auto_approve.rating_above`.
    RatingAbove,
    /// `auto_approve.genres`.
    ApprovedGenre,
    /// `auto_approve.awards`.
    Award,
    /// `auto_reject.rating_below`.
    RatingBelow,
    /// `auto_reject.genres`.
    RejectedGenre,
    /// `auto_reject.keywords`.
    Keyword,
    /// `needs_review.episode_count_above`.
    EpisodeCount,
    /// `needs_review.season_count_above`.
    SeasonCount,
    /// `needs_review.new_user_days` with `obscure_popularity_threshold`.
    NewUserObscure,
    /// Nothing matched in the base cascade.
    NoMatch,
}

impl RuleId {
    /// Returns the dotted configuration key for this rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::UpcomingRelease => "needs_review.upcoming_release",
            RuleId::RatingAbove => "auto_approve.rating_above",
            RuleId::ApprovedGenre => "auto_approve.genres",
            RuleId::Award => "auto_approve.awards",
            RuleId::RatingBelow => "auto_reject.rating_below",
            RuleId::RejectedGenre => "auto_reject.genres",
            RuleId::Keyword => "auto_reject.keywords",
            RuleId::EpisodeCount => "needs_review.episode_count_above",
            RuleId::SeasonCount => "needs_review.season_count_above",
            RuleId::NewUserObscure => "needs_review.new_user_obscure",
            RuleId::NoMatch => "fallback",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A confidence change applied by a soft rule or a reinforcing strict rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceAdjustment {
    /// The rule that caused the change.
    pub rule: RuleId,
    /// Signed change applied to the confidence.
    pub delta: f32,
    /// Human-readable explanation.
    pub reason: String,
}

/// Outcome of a rule stage (pre-check, validation or cascade).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// The decision after rules were applied.
    pub final_decision: Decision,
    /// Confidence in the decision (0.0 to 1.0).
    pub final_confidence: f32,
    /// Reason shown to staff and requesters.
    pub final_reason: String,
    /// True when a rule decided instead of (or against) the classifier.
    pub rule_override: bool,
    /// Every rule whose condition held, in evaluation order.
    pub rules_matched: Vec<RuleId>,
    /// Confidence changes, in the order they were applied.
    pub confidence_adjustments: Vec<ConfidenceAdjustment>,
}

impl ValidationResult {
    /// Placeholder returned when the pre-check resolved nothing.
    pub fn pending() -> Self {
        Self::default()
    }

    /// Result of a strict rule that decides on its own.
    pub fn ruled(
        decision: Decision,
        confidence: f32,
        reason: impl Into<String>,
        rule: RuleId,
    ) -> Self {
        Self {
            final_decision: decision,
            final_confidence: confidence.clamp(0.0, 1.0),
            final_reason: reason.into(),
            rule_override: true,
            rules_matched: vec![rule],
            confidence_adjustments: Vec::new(),
        }
    }

    /// Returns true if the stage left the request unresolved.
    pub fn is_pending(&self) -> bool {
        self.final_decision == Decision::Pending
    }
}

/// How the final decision was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum DecisionPath {
    /// A learned pattern short-circuited the pipeline.
    Learned,
    /// A strict pre-check rule decided.
    RuleStrict {
        /// Rules that matched.
        rules: Vec<RuleId>,
    },
    /// The classifier verdict stood (possibly with confidence changes).
    AiPrimary,
    /// Rules changed the classifier verdict.
    AiOverride {
        /// Rules that matched.
        rules: Vec<RuleId>,
    },
    /// The classifier was unavailable; the base cascade decided.
    Fallback {
        /// The cascade branch that fired.
        rule: RuleId,
    },
}

impl DecisionPath {
    /// Returns the rules carried by this path.
    pub fn rules(&self) -> Vec<RuleId> {
        match self {
            DecisionPath::Learned | DecisionPath::AiPrimary => Vec::new(),
            DecisionPath::RuleStrict { rules } | DecisionPath::AiOverride { rules } => {
                rules.clone()
            }
            DecisionPath::Fallback { rule } => vec![*rule],
        }
    }
}

impl fmt::Display for DecisionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |rules: &[RuleId]| {
            rules
                .iter()
                .map(RuleId::as_str)
                .collect::<Vec<_>>()
                .join(",")
        };
        match self {
            DecisionPath::Learned => f.write_str("learned"),
            DecisionPath::RuleStrict { rules } => write!(f, "rule_strict:{}", join(rules)),
            DecisionPath::AiPrimary => f.write_str("ai_primary"),
            DecisionPath::AiOverride { rules } => write!(f, "ai_override:{}", join(rules)),
            DecisionPath::Fallback { rule } => write!(f, "fallback:{}", rule),
        }
    }
}

/// The engine's answer for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalDecision {
    /// The verdict. Never [`Decision::Pending`].
    pub decision: Decision,
    /// Confidence in the verdict (0.0 to 1.0).
    pub confidence: f32,
    /// Human-readable reason.
    pub reason: String,
    /// Which stage decided.
    pub path: DecisionPath,
}

impl FinalDecision {
    /// Returns true if staff must resolve this request.
    pub fn needs_review(&self) -> bool {
        self.decision == Decision::NeedsReview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_string_forms() {
        for decision in [
            Decision::Approved,
            Decision::Rejected,
            Decision::NeedsReview,
            Decision::Pending,
        ] {
            assert_eq!(Decision::parse(decision.as_str()), Some(decision));
        }
        assert_eq!(Decision::parse("approved"), None);
    }

    #[test]
    fn decision_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&Decision::NeedsReview).unwrap(),
            "\"NEEDS_REVIEW\""
        );
    }

    #[test]
    fn only_approved_and_rejected_are_terminal() {
        assert!(Decision::Approved.is_terminal());
        assert!(Decision::Rejected.is_terminal());
        assert!(!Decision::NeedsReview.is_terminal());
        assert!(!Decision::Pending.is_terminal());
    }

    #[test]
    fn pending_result_has_no_override() {
        let result = ValidationResult::pending();
        assert!(result.is_pending());
        assert!(!result.rule_override);
        assert!(result.rules_matched.is_empty());
    }

    #[test]
    fn ruled_result_clamps_confidence() {
        let result = ValidationResult::ruled(Decision::Approved, 1.4, "x", RuleId::RatingAbove);
        assert_eq!(result.final_confidence, 1.0);
        assert!(result.rule_override);
        assert_eq!(result.rules_matched, vec![RuleId::RatingAbove]);
    }

    #[test]
    fn path_display_matches_legacy_tags() {
        let path = DecisionPath::RuleStrict {
            rules: vec![RuleId::RatingAbove],
        };
        assert_eq!(path.to_string(), "rule_strict:auto_approve.rating_above");

        let path = DecisionPath::AiOverride {
            rules: vec![RuleId::EpisodeCount, RuleId::NewUserObscure],
        };
        assert_eq!(
            path.to_string(),
            "ai_override:needs_review.episode_count_above,needs_review.new_user_obscure"
        );
        assert_eq!(DecisionPath::AiPrimary.to_string(), "ai_primary");
        assert_eq!(DecisionPath::Learned.to_string(), "learned");
    }

    #[test]
    fn path_serialization_is_tagged() {
        let path = DecisionPath::Fallback {
            rule: RuleId::NoMatch,
        };
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"{"type":"fallback","rule":"no_match"}"#);
        let back: DecisionPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
