// Analysis traits: summaries, sentiment and named entities per article.
//
// These are opaque calls to an external inference service. The digest
// pipeline only sees the traits, so the hosted API can be swapped for
// another provider (or a test fake) without touching the pipeline.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Returned for articles without any body text to summarize.
pub const NO_CONTENT_SUMMARY: &str = "No content available.";

/// Summarization models the service is expected to host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SummaryModel {
    #[default]
    #[value(name = "bart-large-cnn")]
    BartLargeCnn,
    #[value(name = "t5-small")]
    T5Small,
    #[value(name = "mbart-large-cc25")]
    MbartLargeCc25,
}

impl SummaryModel {
    /// Model id on the inference service.
    pub fn model_id(&self) -> &'static str {
        match self {
            SummaryModel::BartLargeCnn => "facebook/bart-large-cnn",
            SummaryModel::T5Small => "t5-small",
            SummaryModel::MbartLargeCc25 => "facebook/mbart-large-cc25",
        }
    }

    /// Only the multilingual model honours a summary language.
    pub fn is_multilingual(&self) -> bool {
        matches!(self, SummaryModel::MbartLargeCc25)
    }
}

/// Output languages for the multilingual summarizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SummaryLanguage {
    #[default]
    English,
    Arabic,
    French,
    German,
    Spanish,
}

impl SummaryLanguage {
    /// mBART language code.
    pub fn code(&self) -> &'static str {
        match self {
            SummaryLanguage::English => "en_XX",
            SummaryLanguage::Arabic => "ar_AR",
            SummaryLanguage::French => "fr_XX",
            SummaryLanguage::German => "de_DE",
            SummaryLanguage::Spanish => "es_XX",
        }
    }
}

/// Knobs for one summarization call.
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    pub model: SummaryModel,
    pub language: SummaryLanguage,
    /// Upper bound on summary length in tokens
    pub max_length: usize,
    /// Lower bound on summary length in tokens
    pub min_length: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            model: SummaryModel::default(),
            language: SummaryLanguage::default(),
            max_length: 130,
            min_length: 30,
        }
    }
}

/// Coarse sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    /// Map a service label ("POSITIVE", "negative", "LABEL_1", ...) to ours.
    pub fn from_service(label: &str) -> Self {
        match label.to_ascii_uppercase().as_str() {
            "POSITIVE" | "POS" | "LABEL_1" => SentimentLabel::Positive,
            "NEGATIVE" | "NEG" | "LABEL_0" => SentimentLabel::Negative,
            _ => SentimentLabel::Neutral,
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SentimentLabel::Positive => "POSITIVE",
            SentimentLabel::Negative => "NEGATIVE",
            SentimentLabel::Neutral => "NEUTRAL",
        })
    }
}

/// Sentiment of one text, with the classifier's confidence (0.0 to 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: SentimentLabel,
    pub score: f64,
}

/// Entity categories kept for display: people, organizations, places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "PERSON")]
    Person,
    #[serde(rename = "ORG")]
    Org,
    #[serde(rename = "GPE")]
    Place,
}

impl EntityKind {
    /// Map a service entity group to a kept kind; other groups are dropped.
    pub fn from_service(group: &str) -> Option<Self> {
        match group.to_ascii_uppercase().as_str() {
            "PER" | "PERSON" => Some(EntityKind::Person),
            "ORG" => Some(EntityKind::Org),
            "LOC" | "GPE" => Some(EntityKind::Place),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Person => "PERSON",
            EntityKind::Org => "ORG",
            EntityKind::Place => "GPE",
        })
    }
}

/// A named entity mention.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub kind: EntityKind,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `text`. Blank text yields `NO_CONTENT_SUMMARY`.
    async fn summarize(&self, text: &str, options: &SummaryOptions) -> Result<String>;
}

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Sentiment>;
}

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    /// People, organizations and places mentioned in `text`, in order.
    async fn extract(&self, text: &str) -> Result<Vec<Entity>>;
}
