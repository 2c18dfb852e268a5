//! Chat-completion backed semantic classifier.
//!
//! Sends the enriched request context to an OpenAI-compatible
//! `/chat/completions` endpoint and parses a JSON verdict from the reply.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use super::{ClassifierContext, ClassifierError, ClassifierResult, RiskFactors, SemanticClassifier};
use crate::decision::Decision;

/// Maximum characters kept from the short reason.
const REASON_MAX_LEN: usize = 150;

/// Maximum characters kept from the detailed reasoning.
const DETAIL_MAX_LEN: usize = 300;

const SYSTEM_PROMPT: &str = "You are an expert media curator moderating requests for a personal media server.

Evaluate each request on:
- Content quality: rating, critical reception, genre appeal, lasting value
- Storage economics: series length versus quality, likelihood of being watched
- User trust: account age and the risk of inappropriate requests

Approve high-quality mainstream content readily. Be selective with obscure or niche content. \
Weigh storage cost for very long series. Trust established users more than new accounts. \
Reject clearly low-quality or inappropriate content.

Respond with JSON only:
{
  \"decision\": \"APPROVED|REJECTED|NEEDS_REVIEW\",
  \"confidence\": 0.0-1.0,
  \"reason\": \"brief explanation\",
  \"detailed_reasoning\": \"full analysis\",
  \"risk_factors\": {
    \"quality_risk\": 0-10,
    \"storage_risk\": 0-10,
    \"appropriateness_risk\": 0-10,
    \"user_trust_risk\": 0-10
  },
  \"value_score\": 0-10
}";

/// Configuration for [`ChatClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatClassifierConfig {
    /// Full URL of the chat-completions endpoint.
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Bearer token. The classifier reports `NotConfigured` without one.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for ChatClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 300,
            timeout_secs: 20,
            api_key: None,
        }
    }
}

impl ChatClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Semantic classifier backed by a chat-completion model.
pub struct ChatClassifier {
    client: reqwest::Client,
    config: ChatClassifierConfig,
}

impl ChatClassifier {
    /// Creates a classifier. Fails only if the HTTP client cannot be built.
    pub fn new(config: ChatClassifierConfig) -> Result<Self, ClassifierError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    /// Returns true if an API key is present.
    pub fn is_configured(&self) -> bool {
        self.config
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    pub fn config(&self) -> &ChatClassifierConfig {
        &self.config
    }
}

#[async_trait]
impl SemanticClassifier for ChatClassifier {
    async fn classify(
        &self,
        context: &ClassifierContext,
    ) -> Result<ClassifierResult, ClassifierError> {
        let api_key = match self.config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => return Err(ClassifierError::NotConfigured("API key missing".to_string())),
        };

        info!(title = %context.title, model = %self.config.model, "Consulting classifier");

        let body = json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(context) },
            ],
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ClassifierError::Malformed("no completion choices".to_string()))?;

        let result = parse_verdict(&content)?;
        debug!(
            decision = %result.decision,
            confidence = result.confidence,
            value_score = result.value_score,
            "Classifier verdict"
        );
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "chat"
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    decision: String,
    confidence: Option<f32>,
    reason: Option<String>,
    detailed_reasoning: Option<String>,
    risk_factors: Option<RawRiskFactors>,
    value_score: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawRiskFactors {
    quality_risk: Option<f32>,
    storage_risk: Option<f32>,
    appropriateness_risk: Option<f32>,
    user_trust_risk: Option<f32>,
}

impl From<RawRiskFactors> for RiskFactors {
    fn from(raw: RawRiskFactors) -> Self {
        let score = |v: Option<f32>| v.unwrap_or(5.0).clamp(0.0, 10.0);
        Self {
            quality: score(raw.quality_risk),
            storage: score(raw.storage_risk),
            appropriateness: score(raw.appropriateness_risk),
            user_trust: score(raw.user_trust_risk),
        }
    }
}

/// Builds the user prompt describing one request.
pub(crate) fn user_prompt(context: &ClassifierContext) -> String {
    let year = context
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let rating = context
        .rating
        .map(|r| format!("{r}/10"))
        .unwrap_or_else(|| "not rated".to_string());
    let length = if context.episode_count > 0 {
        let mut line = format!(
            "Series length: {} seasons, {} episodes",
            context.season_count, context.episode_count
        );
        if context.long_series {
            line.push_str(" (LONG SERIES, high storage)");
        }
        line
    } else {
        "Series length: n/a".to_string()
    };
    let account_age = context
        .account_age_days
        .map(|d| format!("{d} days"))
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "Evaluate this media request.

CONTENT PROFILE
Title: {title}
Type: {media_type}
Year: {year}
Rating: {rating}
Popularity: {popularity}
Genres: {genres}
{length}

USER CONTEXT
Username: {requester}
Account age: {account_age}
Trust level: {trust}

Provide your decision with confidence, a brief reason, detailed reasoning, \
a risk assessment across the four dimensions and an overall value score.",
        title = context.title,
        media_type = context.media_type.as_str().to_uppercase(),
        popularity = context.popularity,
        genres = context.genres.join(", "),
        requester = context.requester,
        trust = context.trust_level.description(),
    )
}

/// Removes a surrounding Markdown code fence, if any.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let body = match trimmed.find('\n') {
        Some(i) => &trimmed[i + 1..],
        None => return trimmed,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Parses the model's JSON answer into a [`ClassifierResult`].
pub(crate) fn parse_verdict(content: &str) -> Result<ClassifierResult, ClassifierError> {
    let raw: RawVerdict = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| ClassifierError::Malformed(e.to_string()))?;

    let decision = match Decision::parse(raw.decision.trim()) {
        Some(d) if d != Decision::Pending => d,
        _ => {
            return Err(ClassifierError::Malformed(format!(
                "unknown decision {:?}",
                raw.decision
            )))
        }
    };

    let confidence = raw.confidence.unwrap_or(0.5);
    if !confidence.is_finite() {
        return Err(ClassifierError::Malformed("confidence is not a number".into()));
    }

    let reason = truncate(
        raw.reason.as_deref().unwrap_or("Classifier analysis"),
        REASON_MAX_LEN,
    );
    let detailed_reasoning = truncate(
        raw.detailed_reasoning.as_deref().unwrap_or(&reason),
        DETAIL_MAX_LEN,
    );

    Ok(ClassifierResult {
        decision,
        confidence: confidence.clamp(0.0, 1.0),
        reason,
        detailed_reasoning,
        risk_factors: raw.risk_factors.unwrap_or_default().into(),
        value_score: raw.value_score.unwrap_or(5.0).clamp(0.0, 10.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfiguration;
    use crate::request::{MediaType, ModerationRequest};

    #[test]
    fn parses_plain_json() {
        let result = parse_verdict(
            r#"{"decision": "APPROVED", "confidence": 0.82, "reason": "Solid drama",
                "risk_factors": {"quality_risk": 2, "storage_risk": 1,
                "appropriateness_risk": 0, "user_trust_risk": 3}, "value_score": 7.5}"#,
        )
        .unwrap();
        assert_eq!(result.decision, Decision::Approved);
        assert_eq!(result.confidence, 0.82);
        assert_eq!(result.reason, "Solid drama");
        assert_eq!(result.detailed_reasoning, "Solid drama");
        assert_eq!(result.risk_factors.user_trust, 3.0);
        assert_eq!(result.value_score, 7.5);
    }

    #[test]
    fn parses_fenced_json() {
        let content = "```json\n{\"decision\": \"REJECTED\", \"confidence\": 0.9}\n```";
        let result = parse_verdict(content).unwrap();
        assert_eq!(result.decision, Decision::Rejected);
        assert_eq!(result.risk_factors, RiskFactors::default());
    }

    #[test]
    fn clamps_confidence_and_truncates_reason() {
        let long = "x".repeat(400);
        let content = format!(r#"{{"decision": "NEEDS_REVIEW", "confidence": 3.0, "reason": "{long}"}}"#);
        let result = parse_verdict(&content).unwrap();
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.reason.chars().count(), REASON_MAX_LEN);
        assert_eq!(result.detailed_reasoning.chars().count(), REASON_MAX_LEN);
    }

    #[test]
    fn unknown_decision_is_malformed() {
        let err = parse_verdict(r#"{"decision": "MAYBE", "confidence": 0.4}"#).unwrap_err();
        assert!(matches!(err, ClassifierError::Malformed(_)));

        let err = parse_verdict(r#"{"decision": "PENDING"}"#).unwrap_err();
        assert!(matches!(err, ClassifierError::Malformed(_)));
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = parse_verdict("I think you should approve it").unwrap_err();
        assert!(matches!(err, ClassifierError::Malformed(_)));
    }

    #[test]
    fn prompt_mentions_trust_and_length() {
        let config = RuleConfiguration::default();
        let request = ModerationRequest::new("1", "Saga")
            .with_media_type(MediaType::Series)
            .with_episodes(12, 150)
            .with_requester("u", "bob")
            .with_account_age(400);
        let context = ClassifierContext::from_request(&request, &config);
        let prompt = user_prompt(&context);
        assert!(prompt.contains("Type: SERIES"));
        assert!(prompt.contains("LONG SERIES"));
        assert!(prompt.contains("TRUSTED (over 1 year)"));
        assert!(prompt.contains("Rating: not rated"));
    }

    #[tokio::test]
    async fn missing_api_key_is_not_configured() {
        let classifier = ChatClassifier::new(ChatClassifierConfig::default()).unwrap();
        assert!(!classifier.is_configured());

        let config = RuleConfiguration::default();
        let context =
            ClassifierContext::from_request(&ModerationRequest::new("1", "x"), &config);
        let err = classifier.classify(&context).await.unwrap_err();
        assert!(matches!(err, ClassifierError::NotConfigured(_)));
    }
}
