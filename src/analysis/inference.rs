// Hosted inference API client — summaries, sentiment and entities.
//
// Talks to a Hugging Face-style inference endpoint: POST
// {base}/models/{model} with {"inputs": ..., "parameters": ...} and a
// bearer token. One client implements all three analysis traits; each
// request waits on the shared rate limiter first.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rate_limiter::RateLimiter;
use super::traits::{
    Entity, EntityExtractor, EntityKind, Sentiment, SentimentClassifier, SentimentLabel,
    SummaryOptions, Summarizer, NO_CONTENT_SUMMARY,
};
use crate::output::truncate_chars;

/// Default hosted inference endpoint.
pub const DEFAULT_INFERENCE_API_URL: &str = "https://api-inference.huggingface.co";

/// Summarizer input is cut to this many characters.
const SUMMARY_INPUT_CHARS: usize = 1024;
/// Sentiment input is cut to this many characters.
const SENTIMENT_INPUT_CHARS: usize = 512;

/// Client for the hosted summarization / classification / NER models.
pub struct InferenceClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    sentiment_model: String,
    ner_model: String,
    rate_limiter: RateLimiter,
}

impl InferenceClient {
    pub fn new(
        base_url: &str,
        token: &str,
        sentiment_model: &str,
        ner_model: &str,
        requests_per_second: f64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("newsprism/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            sentiment_model: sentiment_model.to_string(),
            ner_model: ner_model.to_string(),
            rate_limiter: RateLimiter::new(requests_per_second),
        })
    }

    /// POST one inference request and deserialize the reply.
    async fn infer<P: Serialize + Sync, T: DeserializeOwned + Send>(
        &self,
        model: &str,
        inputs: &str,
        parameters: &P,
    ) -> Result<T> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/models/{}", self.base_url, model);
        let request = InferenceRequest {
            inputs,
            parameters,
            options: RequestOptions {
                wait_for_model: true,
            },
        };

        debug!(model = model, chars = inputs.len(), "Inference request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Inference request to {model} failed"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Inference API ({model}) returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse {model} response"))
    }
}

#[async_trait]
impl Summarizer for InferenceClient {
    async fn summarize(&self, text: &str, options: &SummaryOptions) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(NO_CONTENT_SUMMARY.to_string());
        }

        let (input, parameters) = summary_request(text, options);
        let outputs: Vec<SummaryOutput> = self
            .infer(options.model.model_id(), input, &parameters)
            .await?;

        outputs
            .into_iter()
            .next()
            .map(|o| o.summary_text.trim().to_string())
            .ok_or_else(|| anyhow::anyhow!("Summarizer returned no output"))
    }
}

#[async_trait]
impl SentimentClassifier for InferenceClient {
    async fn classify(&self, text: &str) -> Result<Sentiment> {
        let input = take_chars(text, SENTIMENT_INPUT_CHARS);
        let response: ClassificationResponse = self
            .infer(&self.sentiment_model, input, &EmptyParameters {})
            .await?;

        let sentiment = top_sentiment(response)
            .ok_or_else(|| anyhow::anyhow!("Sentiment classifier returned no labels"))?;

        debug!(
            label = %sentiment.label,
            score = sentiment.score,
            text_preview = %truncate_chars(text, 50),
            "Classified sentiment"
        );
        Ok(sentiment)
    }
}

#[async_trait]
impl EntityExtractor for InferenceClient {
    async fn extract(&self, text: &str) -> Result<Vec<Entity>> {
        let parameters = NerParameters {
            aggregation_strategy: "simple",
        };
        let raw: Vec<RawEntity> = self.infer(&self.ner_model, text, &parameters).await?;
        Ok(keep_entities(raw))
    }
}

/// Build the summarization input and parameters for `text`.
///
/// Input is cut to 1024 characters. For the English models the length
/// bounds shrink with short inputs: `max = min(max_length, 2 × words)`
/// and `min = min(min_length, words)`, so a two-line teaser is not padded
/// out to 130 tokens. The multilingual model keeps the bounds as given
/// and is told which language to write in.
pub fn summary_request<'a>(text: &'a str, options: &SummaryOptions) -> (&'a str, SummaryParameters) {
    let input = take_chars(text, SUMMARY_INPUT_CHARS);

    if options.model.is_multilingual() {
        let lang = options.language.code();
        return (
            input,
            SummaryParameters {
                max_length: options.max_length,
                min_length: options.min_length,
                do_sample: false,
                num_beams: Some(4),
                no_repeat_ngram_size: Some(3),
                src_lang: Some(lang),
                tgt_lang: Some(lang),
            },
        );
    }

    let words = input.split_whitespace().count();
    (
        input,
        SummaryParameters {
            max_length: options.max_length.min(words * 2),
            min_length: options.min_length.min(words),
            do_sample: false,
            num_beams: None,
            no_repeat_ngram_size: None,
            src_lang: None,
            tgt_lang: None,
        },
    )
}

/// Highest-scoring label from a classification response.
pub fn top_sentiment(response: ClassificationResponse) -> Option<Sentiment> {
    let labels = match response {
        ClassificationResponse::Nested(mut rows) => {
            if rows.is_empty() {
                return None;
            }
            rows.swap_remove(0)
        }
        ClassificationResponse::Flat(labels) => labels,
    };

    labels
        .into_iter()
        .fold(None::<LabelScore>, |best, l| match best {
            Some(b) if b.score >= l.score => Some(b),
            _ => Some(l),
        })
        .map(|l| Sentiment {
            label: SentimentLabel::from_service(&l.label),
            score: l.score,
        })
}

/// Keep people, organizations and places; drop other groups and blanks.
pub fn keep_entities(raw: Vec<RawEntity>) -> Vec<Entity> {
    raw.into_iter()
        .filter_map(|e| {
            let kind = EntityKind::from_service(&e.entity_group)?;
            let text = e.word.trim();
            if text.is_empty() {
                return None;
            }
            Some(Entity {
                text: text.to_string(),
                kind,
            })
        })
        .collect()
}

/// Longest prefix of `text` with at most `max_chars` characters.
fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

// --- Inference API request/response types ---

#[derive(Serialize)]
struct InferenceRequest<'a, P: Serialize> {
    inputs: &'a str,
    parameters: &'a P,
    options: RequestOptions,
}

#[derive(Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

#[derive(Serialize)]
struct EmptyParameters {}

#[derive(Serialize)]
struct NerParameters {
    aggregation_strategy: &'static str,
}

/// Generation parameters for a summarization call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryParameters {
    pub max_length: usize,
    pub min_length: usize,
    pub do_sample: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_beams: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_repeat_ngram_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src_lang: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tgt_lang: Option<&'static str>,
}

#[derive(Deserialize)]
struct SummaryOutput {
    summary_text: String,
}

/// Text-classification replies come either as a flat list of labels or
/// as one list per input.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ClassificationResponse {
    Nested(Vec<Vec<LabelScore>>),
    Flat(Vec<LabelScore>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// One aggregated entity span from the token-classification model.
/// Confidence scores in the reply are not used.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEntity {
    pub entity_group: String,
    pub word: String,
}
