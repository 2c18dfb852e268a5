//! Strict rule pre-check.
//!
//! Runs before the semantic classifier. A match here is policy-authoritative
//! and ends evaluation; no match yields a pending result and the orchestrator
//! moves on to classification.
//!
//! ## Evaluation Order
//!
//! 1. Upcoming release without a rating -> review (0.80)
//! 2. Rating ceiling -> approve (0.95)
//! 3. Genre allow-list -> approve (0.90)
//! 4. Rating floor (known ratings only) -> reject (0.95)
//! 5. Genre deny-list -> reject (0.95)

use chrono::Datelike;
use tracing::debug;

use crate::config::RuleConfiguration;
use crate::decision::{Decision, RuleId, ValidationResult};
use crate::genres;
use crate::request::ModerationRequest;

/// Evaluates the strict rules of a configuration.
#[derive(Debug, Clone, Copy)]
pub struct StrictRuleEvaluator<'a> {
    config: &'a RuleConfiguration,
}

impl<'a> StrictRuleEvaluator<'a> {
    pub fn new(config: &'a RuleConfiguration) -> Self {
        Self { config }
    }

    /// Runs the pre-check against the current calendar year.
    pub fn precheck(&self, request: &ModerationRequest) -> ValidationResult {
        self.precheck_at(request, chrono::Local::now().year())
    }

    /// Runs the pre-check as if it were `current_year`.
    ///
    /// First match wins. Returns [`ValidationResult::pending`] if nothing
    /// matched.
    pub fn precheck_at(&self, request: &ModerationRequest, current_year: i32) -> ValidationResult {
        let rating = request.known_rating();

        // Missing year skips this check.
        if let Some(year) = request.year {
            if rating.is_none() && (year == current_year || year == current_year + 1) {
                debug!(title = %request.title, year, "Upcoming release without rating");
                return ValidationResult::ruled(
                    Decision::NeedsReview,
                    0.80,
                    format!("Upcoming release ({year}), no rating yet"),
                    RuleId::UpcomingRelease,
                );
            }
        }

        let approve = &self.config.auto_approve;
        let reject = &self.config.auto_reject;

        if let Some(r) = rating {
            if r >= approve.rating_above {
                return ValidationResult::ruled(
                    Decision::Approved,
                    0.95,
                    format!(
                        "High rating ({r}/10) meets threshold {}",
                        approve.rating_above
                    ),
                    RuleId::RatingAbove,
                );
            }
        }

        let normalized = genres::normalize(&request.genres);

        let approved = genres::matching(&normalized, &approve.genres);
        if !approved.is_empty() {
            return ValidationResult::ruled(
                Decision::Approved,
                0.90,
                format!("Approved genre: {}", approved.join(", ")),
                RuleId::ApprovedGenre,
            );
        }

        if let Some(r) = rating {
            if r <= reject.rating_below {
                return ValidationResult::ruled(
                    Decision::Rejected,
                    0.95,
                    format!(
                        "Low rating ({r}/10) at or below threshold {}",
                        reject.rating_below
                    ),
                    RuleId::RatingBelow,
                );
            }
        }

        let banned = genres::matching(&normalized, &reject.genres);
        if !banned.is_empty() {
            return ValidationResult::ruled(
                Decision::Rejected,
                0.95,
                format!("Banned genre: {}", banned.join(", ")),
                RuleId::RejectedGenre,
            );
        }

        ValidationResult::pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEAR: i32 = 2026;

    fn precheck(request: &ModerationRequest) -> ValidationResult {
        let config = RuleConfiguration::default();
        StrictRuleEvaluator::new(&config).precheck_at(request, YEAR)
    }

    #[test]
    fn upcoming_release_needs_review() {
        let request = ModerationRequest::new("1", "Sequel")
            .with_year(YEAR)
            .with_rating(0.0)
            .with_genres(["Documentary"]);
        let result = precheck(&request);
        assert_eq!(result.final_decision, Decision::NeedsReview);
        assert_eq!(result.final_confidence, 0.80);
        assert!(result.final_reason.contains("Upcoming release"));
        assert_eq!(result.rules_matched, vec![RuleId::UpcomingRelease]);
    }

    #[test]
    fn next_year_is_upcoming_too() {
        let request = ModerationRequest::new("1", "Sequel").with_year(YEAR + 1);
        assert_eq!(precheck(&request).final_decision, Decision::NeedsReview);
    }

    #[test]
    fn upcoming_preempts_deny_list() {
        let request = ModerationRequest::new("1", "Sequel")
            .with_year(YEAR)
            .with_genres(["Adult"]);
        assert_eq!(
            precheck(&request).rules_matched,
            vec![RuleId::UpcomingRelease]
        );
    }

    #[test]
    fn rated_current_year_is_not_upcoming() {
        let request = ModerationRequest::new("1", "Hit")
            .with_year(YEAR)
            .with_rating(8.1);
        let result = precheck(&request);
        assert_eq!(result.final_decision, Decision::Approved);
        assert_eq!(result.rules_matched, vec![RuleId::RatingAbove]);
    }

    #[test]
    fn older_unrated_title_falls_through() {
        let request = ModerationRequest::new("1", "Obscure").with_year(YEAR - 3);
        assert!(precheck(&request).is_pending());
    }

    #[test]
    fn rating_ceiling_approves() {
        let request = ModerationRequest::new("1", "Classic").with_rating(7.5);
        let result = precheck(&request);
        assert_eq!(result.final_decision, Decision::Approved);
        assert_eq!(result.final_confidence, 0.95);
        assert!(result.rule_override);
    }

    #[test]
    fn rating_ceiling_wins_over_deny_list() {
        let request = ModerationRequest::new("1", "Arthouse")
            .with_rating(8.0)
            .with_genres(["Erotic"]);
        assert_eq!(precheck(&request).final_decision, Decision::Approved);
    }

    #[test]
    fn localized_allow_genre_approves() {
        let request = ModerationRequest::new("1", "Planet")
            .with_rating(6.0)
            .with_genres(["Documentaire"]);
        let result = precheck(&request);
        assert_eq!(result.final_decision, Decision::Approved);
        assert_eq!(result.final_confidence, 0.90);
        assert_eq!(result.rules_matched, vec![RuleId::ApprovedGenre]);
    }

    #[test]
    fn rating_floor_rejects() {
        let request = ModerationRequest::new("1", "Dud").with_rating(4.0);
        let result = precheck(&request);
        assert_eq!(result.final_decision, Decision::Rejected);
        assert_eq!(result.final_confidence, 0.95);
        assert_eq!(result.rules_matched, vec![RuleId::RatingBelow]);
    }

    #[test]
    fn unknown_rating_never_rejects() {
        let request = ModerationRequest::new("1", "Unrated")
            .with_year(YEAR - 10)
            .with_rating(0.0)
            .with_genres(["Drama"]);
        assert!(precheck(&request).is_pending());

        let request = ModerationRequest::new("1", "No metadata");
        assert!(precheck(&request).is_pending());
    }

    #[test]
    fn deny_genre_rejects() {
        let request = ModerationRequest::new("1", "Late Night")
            .with_rating(2.0)
            .with_genres(["Adult"]);
        let result = precheck(&request);
        assert_eq!(result.final_decision, Decision::Rejected);
        assert_eq!(result.final_confidence, 0.95);

        let request = ModerationRequest::new("1", "Late Night")
            .with_rating(5.5)
            .with_genres(["Adulte"]);
        let result = precheck(&request);
        assert_eq!(result.final_decision, Decision::Rejected);
        assert_eq!(result.rules_matched, vec![RuleId::RejectedGenre]);
    }

    #[test]
    fn middling_request_is_pending() {
        let request = ModerationRequest::new("1", "Thriller")
            .with_year(2015)
            .with_rating(6.2)
            .with_genres(["Thriller"]);
        let result = precheck(&request);
        assert!(result.is_pending());
        assert!(!result.rule_override);
    }
}
