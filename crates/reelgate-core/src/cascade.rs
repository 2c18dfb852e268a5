//! Base rule cascade, used when no semantic classifier is available.
//!
//! A single pass, first match wins, no confidence arithmetic:
//!
//! 1. Auto-reject: rating floor, genre deny-list, title keywords
//! 2. Auto-approve: rating ceiling, awards, genre allow-list
//! 3. Needs review: episode count, season count, new user + obscure title
//! 4. Fallback: review at 0.50

use regex::{RegexSet, RegexSetBuilder};

use crate::config::{ConfigError, RuleConfiguration};
use crate::decision::{Decision, RuleId, ValidationResult};
use crate::genres;
use crate::request::ModerationRequest;

/// Case-insensitive substring matcher for title keywords.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    set: RegexSet,
}

impl KeywordMatcher {
    /// Compiles the keyword list. Keywords are matched literally.
    pub fn new<I, S>(keywords: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords: Vec<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        let set = RegexSetBuilder::new(keywords.iter().map(|k| regex::escape(k)))
            .case_insensitive(true)
            .build()?;
        Ok(Self { keywords, set })
    }

    /// Returns the keywords found in `text`, in configuration order.
    pub fn find(&self, text: &str) -> Vec<&str> {
        self.set
            .matches(text)
            .into_iter()
            .map(|i| self.keywords[i].as_str())
            .collect()
    }
}

/// Single-pass rule cascade.
#[derive(Debug, Clone)]
pub struct BaseRuleCascade {
    config: RuleConfiguration,
    keywords: KeywordMatcher,
}

impl BaseRuleCascade {
    pub fn new(config: RuleConfiguration) -> Result<Self, ConfigError> {
        let keywords = KeywordMatcher::new(&config.auto_reject.keywords)?;
        Ok(Self { config, keywords })
    }

    /// Decides a request. Always returns a non-pending result.
    pub fn evaluate(&self, request: &ModerationRequest) -> ValidationResult {
        self.auto_reject(request)
            .or_else(|| self.auto_approve(request))
            .or_else(|| self.needs_review(request))
            .unwrap_or_else(|| {
                ValidationResult::ruled(
                    Decision::NeedsReview,
                    0.50,
                    "No rule matched, requires human verification",
                    RuleId::NoMatch,
                )
            })
    }

    fn auto_reject(&self, request: &ModerationRequest) -> Option<ValidationResult> {
        let rules = &self.config.auto_reject;

        if let Some(r) = request.known_rating() {
            if r < rules.rating_below {
                return Some(ValidationResult::ruled(
                    Decision::Rejected,
                    0.92,
                    format!("Low rating ({r}/10) below threshold {}", rules.rating_below),
                    RuleId::RatingBelow,
                ));
            }
        }

        let normalized = genres::normalize(&request.genres);
        let banned = genres::matching(&normalized, &rules.genres);
        if !banned.is_empty() {
            return Some(ValidationResult::ruled(
                Decision::Rejected,
                0.99,
                format!("Banned genre: {}", banned.join(", ")),
                RuleId::RejectedGenre,
            ));
        }

        let found = self.keywords.find(&request.title);
        if !found.is_empty() {
            return Some(ValidationResult::ruled(
                Decision::Rejected,
                0.97,
                format!("Banned keyword detected: {}", found.join(", ")),
                RuleId::Keyword,
            ));
        }

        None
    }

    fn auto_approve(&self, request: &ModerationRequest) -> Option<ValidationResult> {
        let rules = &self.config.auto_approve;

        if let Some(r) = request.known_rating() {
            if r >= rules.rating_above {
                return Some(ValidationResult::ruled(
                    Decision::Approved,
                    0.95,
                    format!("High rating ({r}/10) exceeds threshold {}", rules.rating_above),
                    RuleId::RatingAbove,
                ));
            }
        }

        let awards: Vec<&str> = request
            .awards
            .iter()
            .filter(|a| rules.awards.contains(a.as_str()))
            .map(String::as_str)
            .collect();
        if !awards.is_empty() {
            return Some(ValidationResult::ruled(
                Decision::Approved,
                0.98,
                format!("Award-winning content: {}", awards.join(", ")),
                RuleId::Award,
            ));
        }

        let normalized = genres::normalize(&request.genres);
        let approved = genres::matching(&normalized, &rules.genres);
        if !approved.is_empty() {
            return Some(ValidationResult::ruled(
                Decision::Approved,
                0.90,
                format!("Approved genre: {}", approved.join(", ")),
                RuleId::ApprovedGenre,
            ));
        }

        None
    }

    fn needs_review(&self, request: &ModerationRequest) -> Option<ValidationResult> {
        let rules = &self.config.needs_review;

        if request.episode_count > rules.episode_count_above {
            return Some(ValidationResult::ruled(
                Decision::NeedsReview,
                0.85,
                format!(
                    "Long series ({} episodes) requires human review for storage",
                    request.episode_count
                ),
                RuleId::EpisodeCount,
            ));
        }

        if request.season_count > rules.season_count_above {
            return Some(ValidationResult::ruled(
                Decision::NeedsReview,
                0.85,
                format!(
                    "Long series ({} seasons) requires human review",
                    request.season_count
                ),
                RuleId::SeasonCount,
            ));
        }

        if let Some(days) = request.account_age_days {
            if days < rules.new_user_days && request.popularity < rules.obscure_popularity_threshold
            {
                return Some(ValidationResult::ruled(
                    Decision::NeedsReview,
                    0.70,
                    format!(
                        "New user ({days}d) requesting obscure content (popularity {})",
                        request.popularity
                    ),
                    RuleId::NewUserObscure,
                ));
            }
        }

        None
    }
}
