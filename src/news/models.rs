// Article records as returned by the NewsAPI top-headlines endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Publisher of an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
}

/// A single headline. Read-only to the clustering core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub source: Source,
    pub author: Option<String>,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub content: Option<String>,
}

impl Article {
    /// The text that stands for this article when embedding: content if
    /// present, else the description, else the title.
    pub fn representative_text(&self) -> &str {
        non_blank(self.content.as_deref())
            .or_else(|| non_blank(self.description.as_deref()))
            .unwrap_or(&self.title)
    }

    /// Body text for summarization: content, else description. `None` when
    /// the feed carried neither.
    pub fn body(&self) -> Option<&str> {
        non_blank(self.content.as_deref()).or_else(|| non_blank(self.description.as_deref()))
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|t| !t.trim().is_empty())
}

/// Response envelope from `/v2/top-headlines`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlinesResponse {
    pub status: String,
    pub total_results: Option<u64>,
    #[serde(default)]
    pub articles: Vec<Article>,
    /// Present when status is "error"
    pub code: Option<String>,
    pub message: Option<String>,
}
