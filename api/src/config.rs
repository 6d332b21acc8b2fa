use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/moodtunes";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co/models";
const DEFAULT_EMOTION_MODEL: &str = "j-hartmann/emotion-english-distilroberta-base";
const DEFAULT_SENTIMENT_MODEL: &str = "distilbert-base-uncased-finetuned-sst-2-english";

/// Process configuration, read once at startup and handed to the app state.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub inference: InferenceConfig,
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub emotion_model: String,
    pub sentiment_model: String,
    pub timeout: Duration,
    pub max_attempts: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INFERENCE_BASE_URL.to_string(),
            api_key: None,
            emotion_model: DEFAULT_EMOTION_MODEL.to_string(),
            sentiment_model: DEFAULT_SENTIMENT_MODEL.to_string(),
            timeout: Duration::from_millis(8000),
            max_attempts: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests don't have to touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .context("BIND_ADDR must be a socket address like 0.0.0.0:3001")?;

        let defaults = InferenceConfig::default();
        let timeout = match get("INFERENCE_TIMEOUT_MS") {
            Some(ms) => Duration::from_millis(
                ms.parse()
                    .context("INFERENCE_TIMEOUT_MS must be a number of milliseconds")?,
            ),
            None => defaults.timeout,
        };
        let max_attempts = match get("INFERENCE_MAX_ATTEMPTS") {
            Some(n) => n
                .parse::<u32>()
                .context("INFERENCE_MAX_ATTEMPTS must be a positive integer")?
                .max(1),
            None => defaults.max_attempts,
        };

        Ok(Self {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            bind_addr,
            jwt_secret,
            inference: InferenceConfig {
                base_url: get("INFERENCE_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.base_url),
                api_key: get("HUGGINGFACE_API_KEY"),
                emotion_model: get("EMOTION_MODEL").unwrap_or(defaults.emotion_model),
                sentiment_model: get("SENTIMENT_MODEL").unwrap_or(defaults.sentiment_model),
                timeout,
                max_attempts,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_secret_is_set() {
        let config = Config::from_lookup(lookup(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr.port(), 3001);
        assert_eq!(config.inference.max_attempts, 3);
        assert_eq!(config.inference.timeout, Duration::from_millis(8000));
        assert!(config.inference.api_key.is_none());
    }

    #[test]
    fn missing_secret_is_an_error() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("JWT_SECRET", "  ")])).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("INFERENCE_BASE_URL", "http://localhost:9000/models/"),
            ("INFERENCE_TIMEOUT_MS", "1500"),
            ("INFERENCE_MAX_ATTEMPTS", "0"),
            ("HUGGINGFACE_API_KEY", "hf_abc"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.inference.base_url, "http://localhost:9000/models");
        assert_eq!(config.inference.timeout, Duration::from_millis(1500));
        assert_eq!(config.inference.max_attempts, 1);
        assert_eq!(config.inference.api_key.as_deref(), Some("hf_abc"));
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("JWT_SECRET", "s3cret"),
            ("INFERENCE_TIMEOUT_MS", "soon"),
        ]));
        assert!(result.is_err());
    }
}
