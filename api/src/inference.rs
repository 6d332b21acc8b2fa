use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::InferenceConfig;
use crate::retry::{retry_async, RetryPolicy};

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference API key is not configured")]
    MissingApiKey,

    #[error("inference request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("inference API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

impl InferenceError {
    /// Network failures, timeouts, throttling and 5xx are worth another try;
    /// client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            InferenceError::MissingApiKey => false,
            InferenceError::Transport(err) => !err.is_decode() && !err.is_builder(),
            InferenceError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    #[serde(default)]
    pub score: f64,
}

/// Classification responses come back either grouped per input or flat.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClassificationResponse {
    Grouped(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

/// Highest scoring label, lower-cased. `None` when there are no labels.
pub fn pick_top_label(scores: &[LabelScore]) -> Option<String> {
    scores
        .iter()
        .filter(|s| !s.label.trim().is_empty())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|s| s.label.trim().to_lowercase())
}

#[derive(Clone)]
pub struct InferenceClient {
    http: Client,
    config: InferenceConfig,
    policy: RetryPolicy,
}

impl InferenceClient {
    pub fn new(config: InferenceConfig) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        let policy = RetryPolicy {
            max_attempts: config.max_attempts,
            ..RetryPolicy::default()
        };
        Ok(Self {
            http,
            config,
            policy,
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Ranked labels for `text` from `model`, retrying transient failures.
    pub async fn classify(&self, model: &str, text: &str) -> Result<Vec<LabelScore>, InferenceError> {
        retry_async(model, self.policy, InferenceError::is_transient, || {
            self.classify_once(model, text)
        })
        .await
    }

    async fn classify_once(&self, model: &str, text: &str) -> Result<Vec<LabelScore>, InferenceError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(InferenceError::MissingApiKey)?;

        let url = format!("{}/{}", self.config.base_url, model);
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&InferenceRequest { inputs: text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Status { status, body });
        }

        let parsed: ClassificationResponse = response.json().await?;
        Ok(match parsed {
            ClassificationResponse::Grouped(groups) => groups.into_iter().next().unwrap_or_default(),
            ClassificationResponse::Flat(scores) => scores,
        })
    }

    /// Emotion label for `text`: the emotion model first, the sentiment
    /// model when that fails or has nothing to say. `Ok(None)` means
    /// neither produced a label.
    pub async fn detect_mood(&self, text: &str) -> Result<Option<String>, InferenceError> {
        match self.classify(&self.config.emotion_model, text).await {
            Ok(scores) => {
                if let Some(label) = pick_top_label(&scores) {
                    return Ok(Some(label));
                }
                tracing::debug!("emotion model returned no label, trying sentiment");
            }
            Err(e) => {
                tracing::warn!("emotion inference failed, trying sentiment: {}", e);
            }
        }

        let scores = self.classify(&self.config.sentiment_model, text).await?;
        Ok(pick_top_label(&scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(label: &str, score: f64) -> LabelScore {
        LabelScore {
            label: label.to_string(),
            score,
        }
    }

    #[test]
    fn top_label_is_highest_score_lowercased() {
        let scores = [score("sadness", 0.1), score("JOY", 0.8), score("anger", 0.05)];
        assert_eq!(pick_top_label(&scores).as_deref(), Some("joy"));
    }

    #[test]
    fn top_label_of_nothing_is_none() {
        assert_eq!(pick_top_label(&[]), None);
        assert_eq!(pick_top_label(&[score("  ", 0.9)]), None);
    }

    #[test]
    fn both_response_shapes_parse() {
        let grouped: ClassificationResponse =
            serde_json::from_str(r#"[[{"label":"joy","score":0.9},{"label":"fear","score":0.1}]]"#)
                .unwrap();
        assert!(matches!(grouped, ClassificationResponse::Grouped(ref g) if g[0].len() == 2));

        let flat: ClassificationResponse =
            serde_json::from_str(r#"[{"label":"POSITIVE","score":0.99}]"#).unwrap();
        assert!(matches!(flat, ClassificationResponse::Flat(ref f) if f[0].label == "POSITIVE"));
    }

    #[test]
    fn only_server_side_statuses_are_transient() {
        let status = |code: u16| InferenceError::Status {
            status: StatusCode::from_u16(code).unwrap(),
            body: String::new(),
        };
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!status(422).is_transient());
        assert!(!InferenceError::MissingApiKey.is_transient());
    }
}
