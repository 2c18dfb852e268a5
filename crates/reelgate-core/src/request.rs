//! Normalized view of one media acquisition request.

use serde::{Deserialize, Serialize};

/// Kind of media being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Movie,
    Series,
    #[default]
    Unknown,
}

impl MediaType {
    /// Returns the lowercase name of this media type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
            MediaType::Unknown => "unknown",
        }
    }
}

/// A request as seen by the decision engine.
///
/// Missing upstream metadata is represented as `None` rather than a sentinel.
/// A rating of `0` from upstream means "not rated" and is treated like `None`
/// by every rule (see [`ModerationRequest::known_rating`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationRequest {
    /// Upstream request identifier.
    pub request_id: String,
    pub title: String,
    pub media_type: MediaType,
    /// Release year, if upstream reported a usable one.
    pub year: Option<i32>,
    /// Critical rating on a 0-10 scale.
    pub rating: Option<f32>,
    /// Popularity score (unbounded, >= 0).
    pub popularity: f32,
    /// Raw genre labels, possibly localized.
    pub genres: Vec<String>,
    /// Award names attached to the title.
    pub awards: Vec<String>,
    pub episode_count: u32,
    pub season_count: u32,
    pub requester_id: String,
    pub requester_display_name: String,
    /// Age of the requester's account in days, if known.
    pub account_age_days: Option<u32>,
}

impl ModerationRequest {
    /// Creates a request with only an id and title set.
    pub fn new(request_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_popularity(mut self, popularity: f32) -> Self {
        self.popularity = popularity.max(0.0);
        self
    }

    pub fn with_genres<I, S>(mut self, genres: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_awards<I, S>(mut self, awards: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.awards = awards.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_episodes(mut self, seasons: u32, episodes: u32) -> Self {
        self.season_count = seasons;
        self.episode_count = episodes;
        self
    }

    pub fn with_requester(
        mut self,
        requester_id: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        self.requester_id = requester_id.into();
        self.requester_display_name = display_name.into();
        self
    }

    pub fn with_account_age(mut self, days: u32) -> Self {
        self.account_age_days = Some(days);
        self
    }

    /// Returns the rating only if it is an actual rating.
    ///
    /// `None`, zero, negative and non-finite values all mean "unknown".
    pub fn known_rating(&self) -> Option<f32> {
        self.rating.filter(|r| r.is_finite() && *r > 0.0)
    }

    /// Returns the trust bucket for the requester's account age.
    pub fn trust_level(&self) -> TrustLevel {
        TrustLevel::from_account_age(self.account_age_days)
    }
}

/// Descriptive trust bucket derived from account age.
///
/// Fed to the semantic classifier only; no rule reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    /// Less than a week old.
    New,
    /// Less than a month old.
    Recent,
    /// Less than a year old.
    Established,
    /// A year or older.
    Trusted,
    /// Account age was not reported.
    Unknown,
}

impl TrustLevel {
    /// Buckets an account age in days.
    pub fn from_account_age(days: Option<u32>) -> Self {
        match days {
            None => TrustLevel::Unknown,
            Some(d) if d < 7 => TrustLevel::New,
            Some(d) if d < 30 => TrustLevel::Recent,
            Some(d) if d < 365 => TrustLevel::Established,
            Some(_) => TrustLevel::Trusted,
        }
    }

    /// Returns the wording used in classifier prompts.
    pub fn description(&self) -> &'static str {
        match self {
            TrustLevel::New => "NEW (less than 1 week)",
            TrustLevel::Recent => "RECENT (less than 1 month)",
            TrustLevel::Established => "ESTABLISHED (less than 1 year)",
            TrustLevel::Trusted => "TRUSTED (over 1 year)",
            TrustLevel::Unknown => "UNKNOWN (account age not reported)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rating_is_unknown() {
        let request = ModerationRequest::new("1", "Untitled").with_rating(0.0);
        assert_eq!(request.known_rating(), None);

        let request = ModerationRequest::new("1", "Untitled").with_rating(f32::NAN);
        assert_eq!(request.known_rating(), None);

        let request = ModerationRequest::new("1", "Rated").with_rating(6.4);
        assert_eq!(request.known_rating(), Some(6.4));
    }

    #[test]
    fn trust_level_buckets() {
        assert_eq!(TrustLevel::from_account_age(Some(0)), TrustLevel::New);
        assert_eq!(TrustLevel::from_account_age(Some(6)), TrustLevel::New);
        assert_eq!(TrustLevel::from_account_age(Some(7)), TrustLevel::Recent);
        assert_eq!(TrustLevel::from_account_age(Some(29)), TrustLevel::Recent);
        assert_eq!(TrustLevel::from_account_age(Some(30)), TrustLevel::Established);
        assert_eq!(TrustLevel::from_account_age(Some(364)), TrustLevel::Established);
        assert_eq!(TrustLevel::from_account_age(Some(365)), TrustLevel::Trusted);
        assert_eq!(TrustLevel::from_account_age(None), TrustLevel::Unknown);
    }

    #[test]
    fn deserializes_with_missing_fields() {
        let json = r#"{"request_id": "42", "title": "Nosferatu", "media_type": "movie"}"#;
        let request: ModerationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.request_id, "42");
        assert_eq!(request.media_type, MediaType::Movie);
        assert!(request.genres.is_empty());
        assert_eq!(request.rating, None);
        assert_eq!(request.account_age_days, None);
    }

    #[test]
    fn popularity_is_never_negative() {
        let request = ModerationRequest::new("1", "x").with_popularity(-3.0);
        assert_eq!(request.popularity, 0.0);
    }
}
