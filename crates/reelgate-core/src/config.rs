//! Rule configuration: thresholds and lists used by every rule stage.
//!
//! The configuration is loaded once and never mutated by the engine. All
//! fields have defaults, so a partial TOML document only overrides what it
//! names:
//!
//! ```toml
//! [auto_approve]
//! rating_above = 8.0
//! genres = ["Documentary"]
//!
//! [machine_learning]
//! enabled = false
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating rule configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed.
    #[error("invalid rule configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A threshold is outside its allowed range.
    #[error("invalid threshold {key}: {message}")]
    Threshold {
        /// Dotted key of the offending setting.
        key: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The keyword deny-list could not be compiled.
    #[error("invalid keyword pattern: {0}")]
    Keyword(#[from] regex::Error),
}

fn string_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Conditions that approve a request outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoApproveRules {
    /// Ratings at or above this value are approved.
    pub rating_above: f32,
    /// Canonical genres that are always welcome.
    pub genres: BTreeSet<String>,
    /// Award names that qualify a title (base cascade only).
    pub awards: BTreeSet<String>,
}

impl Default for AutoApproveRules {
    fn default() -> Self {
        Self {
            rating_above: 7.5,
            genres: string_set(&["Documentary", "Biography"]),
            awards: string_set(&["Oscar", "Emmy", "Golden Globe"]),
        }
    }
}

/// Conditions that reject a request outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoRejectRules {
    /// Known ratings at or below this value are rejected.
    pub rating_below: f32,
    /// Canonical genres that are never accepted.
    pub genres: BTreeSet<String>,
    /// Title fragments (case-insensitive) that mark a bad release.
    pub keywords: BTreeSet<String>,
}

impl Default for AutoRejectRules {
    fn default() -> Self {
        Self {
            rating_below: 4.0,
            genres: string_set(&["Adult", "Erotic"]),
            keywords: string_set(&["CAM", "LEAK", "SCREENER"]),
        }
    }
}

/// Soft conditions that push a request towards staff review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedsReviewRules {
    pub episode_count_above: u32,
    pub season_count_above: u32,
    /// Accounts younger than this many days count as new.
    pub new_user_days: u32,
    /// Popularity below this value counts as obscure.
    pub obscure_popularity_threshold: f32,
}

impl Default for NeedsReviewRules {
    fn default() -> Self {
        Self {
            episode_count_above: 100,
            season_count_above: 10,
            new_user_days: 30,
            obscure_popularity_threshold: 20.0,
        }
    }
}

/// Learned-pattern settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineLearningSettings {
    /// Whether learned patterns may short-circuit decisions.
    pub enabled: bool,
    /// Un-applied feedback count that triggers a batch-learn pass.
    pub batch_threshold: u64,
    /// A suggestion must be strictly above this confidence to be used.
    pub min_confidence: f32,
}

impl Default for MachineLearningSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            batch_threshold: 100,
            min_confidence: 0.75,
        }
    }
}

/// Complete rule configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfiguration {
    pub auto_approve: AutoApproveRules,
    pub auto_reject: AutoRejectRules,
    pub needs_review: NeedsReviewRules,
    pub machine_learning: MachineLearningSettings,
}

impl RuleConfiguration {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every threshold is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rating("auto_approve.rating_above", self.auto_approve.rating_above)?;
        check_rating("auto_reject.rating_below", self.auto_reject.rating_below)?;

        if self.auto_reject.rating_below >= self.auto_approve.rating_above {
            return Err(ConfigError::Threshold {
                key: "auto_reject.rating_below",
                message: format!(
                    "{} must be below auto_approve.rating_above ({})",
                    self.auto_reject.rating_below, self.auto_approve.rating_above
                ),
            });
        }

        let popularity = self.needs_review.obscure_popularity_threshold;
        if !popularity.is_finite() || popularity < 0.0 {
            return Err(ConfigError::Threshold {
                key: "needs_review.obscure_popularity_threshold",
                message: format!("{popularity} must be a non-negative number"),
            });
        }

        let min_confidence = self.machine_learning.min_confidence;
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(ConfigError::Threshold {
                key: "machine_learning.min_confidence",
                message: format!("{min_confidence} must be between 0 and 1"),
            });
        }

        if self.machine_learning.batch_threshold == 0 {
            return Err(ConfigError::Threshold {
                key: "machine_learning.batch_threshold",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

fn check_rating(key: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=10.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Threshold {
            key,
            message: format!("{value} is outside 0..=10"),
        })
    }
}
