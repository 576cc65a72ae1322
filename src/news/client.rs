// NewsAPI client — top headlines by country and category.
//
// A thin reqwest wrapper in the same shape as the other HTTP clients in
// this crate: build once, one typed GET per endpoint, non-2xx responses
// and API-level errors surfaced with the body attached.

use std::fmt;

use anyhow::{Context, Result};
use clap::ValueEnum;
use tracing::{debug, info};

use super::models::{Article, HeadlinesResponse};

/// Default NewsAPI base URL.
pub const DEFAULT_NEWS_API_URL: &str = "https://newsapi.org/v2";

/// NewsAPI's maximum page size for top-headlines.
const PAGE_SIZE: &str = "100";

/// Top-headlines categories supported by NewsAPI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Category {
    Business,
    Entertainment,
    General,
    Health,
    Science,
    Sports,
    Technology,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Business => "business",
            Category::Entertainment => "entertainment",
            Category::General => "general",
            Category::Health => "health",
            Category::Science => "science",
            Category::Sports => "sports",
            Category::Technology => "technology",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(s, true).ok()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize and validate a two-letter ISO country code.
pub fn normalize_country(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_lowercase();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_lowercase()) {
        anyhow::bail!("Invalid country code {code:?}: expected two letters like \"us\" or \"gb\"");
    }
    Ok(code)
}

/// HTTP client for the NewsAPI headline endpoints.
pub struct NewsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NewsClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("newsprism/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Fetch the current top headlines for a country, optionally narrowed
    /// to one category. Articles come back in feed order.
    pub async fn top_headlines(
        &self,
        country: &str,
        category: Option<Category>,
    ) -> Result<Vec<Article>> {
        let country = normalize_country(country)?;
        let url = format!("{}/top-headlines", self.base_url);

        let mut params: Vec<(&str, &str)> = vec![
            ("country", country.as_str()),
            ("pageSize", PAGE_SIZE),
            ("apiKey", self.api_key.as_str()),
        ];
        if let Some(ref category) = category {
            params.push(("category", category.as_str()));
        }

        debug!(country = %country, category = ?category, "Fetching top headlines");

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .context("NewsAPI request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("NewsAPI returned {status}: {body}");
        }

        let body: HeadlinesResponse = response
            .json()
            .await
            .context("Failed to parse NewsAPI response")?;

        let articles = into_articles(body)?;
        info!(
            country = %country,
            count = articles.len(),
            "Fetched top headlines"
        );
        Ok(articles)
    }
}

/// Unwrap a headlines envelope, turning an API-level error into an Err.
pub fn into_articles(response: HeadlinesResponse) -> Result<Vec<Article>> {
    if response.status != "ok" {
        anyhow::bail!(
            "NewsAPI error ({}): {}",
            response.code.as_deref().unwrap_or("unknown"),
            response.message.as_deref().unwrap_or("no message")
        );
    }
    Ok(response.articles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_country_lowercases() {
        assert_eq!(normalize_country(" US ").unwrap(), "us");
    }

    #[test]
    fn test_normalize_country_rejects_bad_codes() {
        assert!(normalize_country("usa").is_err());
        assert!(normalize_country("u1").is_err());
        assert!(normalize_country("").is_err());
    }

    #[test]
    fn test_category_parse_is_case_insensitive() {
        assert_eq!(Category::parse("Technology"), Some(Category::Technology));
        assert_eq!(Category::parse("sports"), Some(Category::Sports));
        assert_eq!(Category::parse("weather"), None);
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let client = NewsClient::new("https://newsapi.org/v2/", "key").unwrap();
        assert_eq!(client.base_url, "https://newsapi.org/v2");
    }
}
