use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::analysis::inference::DEFAULT_INFERENCE_API_URL;
use crate::news::client::{Category, DEFAULT_NEWS_API_URL};
use crate::topics::download;

/// Default hosted model for sentiment classification.
pub const DEFAULT_SENTIMENT_MODEL: &str = "distilbert-base-uncased-finetuned-sst-2-english";
/// Default hosted model for named-entity recognition.
pub const DEFAULT_NER_MODEL: &str = "dslim/bert-base-NER";

/// Central configuration loaded from environment variables.
///
/// API keys come from env vars (never hardcoded). The .env file is loaded
/// automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    pub news_api_key: String,
    pub news_api_url: String,
    /// Bearer token for the hosted inference API (digest only)
    pub inference_token: String,
    pub inference_api_url: String,
    /// Directory holding the embedding model (in an all-MiniLM-L6-v2 subdirectory)
    pub model_dir: PathBuf,
    /// Default country when the CLI flag is omitted
    pub country: String,
    /// Default category when the CLI flag is omitted
    pub category: Category,
    pub sentiment_model: String,
    pub ner_model: String,
    /// Pacing for inference requests; 0 disables
    pub inference_qps: f64,
    /// Upper bound on one fetch-and-cluster run
    pub pipeline_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Everything has a default except the API keys, which are checked by
    /// the `require_*` methods only for commands that need them.
    pub fn load() -> Result<Self> {
        let category = match env::var("NEWSPRISM_CATEGORY") {
            Ok(s) => Category::parse(&s)
                .ok_or_else(|| anyhow::anyhow!("NEWSPRISM_CATEGORY has unknown category {s:?}"))?,
            Err(_) => Category::Technology,
        };

        let inference_qps = parse_env("NEWSPRISM_INFERENCE_QPS", 5.0)?;
        let timeout_secs = parse_env("NEWSPRISM_TIMEOUT_SECS", 120u64)?;

        Ok(Self {
            news_api_key: env::var("NEWS_API_KEY").unwrap_or_default(),
            news_api_url: env::var("NEWS_API_URL")
                .unwrap_or_else(|_| DEFAULT_NEWS_API_URL.to_string()),
            inference_token: env::var("HF_API_TOKEN").unwrap_or_default(),
            inference_api_url: env::var("INFERENCE_API_URL")
                .unwrap_or_else(|_| DEFAULT_INFERENCE_API_URL.to_string()),
            model_dir: env::var("NEWSPRISM_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| download::default_model_dir()),
            country: env::var("NEWSPRISM_COUNTRY").unwrap_or_else(|_| "us".to_string()),
            category,
            sentiment_model: env::var("NEWSPRISM_SENTIMENT_MODEL")
                .unwrap_or_else(|_| DEFAULT_SENTIMENT_MODEL.to_string()),
            ner_model: env::var("NEWSPRISM_NER_MODEL")
                .unwrap_or_else(|_| DEFAULT_NER_MODEL.to_string()),
            inference_qps,
            pipeline_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Check that the NewsAPI key is configured.
    pub fn require_news(&self) -> Result<()> {
        if self.news_api_key.is_empty() {
            anyhow::bail!(
                "NEWS_API_KEY not set. Get a key at https://newsapi.org and add it to your .env file."
            );
        }
        Ok(())
    }

    /// Check that the inference API token is configured.
    pub fn require_inference(&self) -> Result<()> {
        if self.inference_token.is_empty() {
            anyhow::bail!(
                "HF_API_TOKEN not set. Summaries, sentiment and entities need the hosted inference API.\n\
                 Add it to your .env file, or use `newsprism cluster` for topic grouping only."
            );
        }
        Ok(())
    }

    /// Check that the embedding model files have been downloaded.
    pub fn require_embedder(&self) -> Result<()> {
        if !download::embedding_files_present(&self.model_dir) {
            anyhow::bail!(
                "Embedding model not found in {}\n\
                 Run `newsprism download-model` to download it.",
                download::embedding_model_dir(&self.model_dir).display()
            );
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{key} has invalid value {raw:?}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            news_api_key: String::new(),
            news_api_url: DEFAULT_NEWS_API_URL.to_string(),
            inference_token: String::new(),
            inference_api_url: DEFAULT_INFERENCE_API_URL.to_string(),
            model_dir: std::env::temp_dir().join("newsprism-config-test"),
            country: "us".to_string(),
            category: Category::Technology,
            sentiment_model: DEFAULT_SENTIMENT_MODEL.to_string(),
            ner_model: DEFAULT_NER_MODEL.to_string(),
            inference_qps: 5.0,
            pipeline_timeout: Duration::from_secs(120),
        }
    }

    #[test]
    fn test_require_news_without_key_fails() {
        assert!(config().require_news().is_err());
        let with_key = Config {
            news_api_key: "key".to_string(),
            ..config()
        };
        assert!(with_key.require_news().is_ok());
    }

    #[test]
    fn test_require_inference_without_token_fails() {
        let err = config().require_inference().unwrap_err();
        assert!(err.to_string().contains("HF_API_TOKEN"));
    }

    #[test]
    fn test_require_embedder_without_files_fails() {
        assert!(config().require_embedder().is_err());
    }

    #[test]
    fn test_parse_env_default_when_unset() {
        let v: f64 = parse_env("NEWSPRISM_TEST_UNSET_VARIABLE", 2.5).unwrap();
        assert!((v - 2.5).abs() < f64::EPSILON);
    }
}
