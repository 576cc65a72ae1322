// Digest pipeline: grouped articles -> summaries, sentiment, entities.
//
// Runs after the topic grouping. For each (cluster, article) pair, in
// cluster order:
// 1. Summarize the article body and classify its sentiment
// 2. Drop entries that miss the search term or the sentiment filter
// 3. Extract people / organizations / places from the kept entries
// 4. Tally entity mentions into a trending list
//
// Analysis calls for different articles run with bounded concurrency but
// results stay in input order. A failed call for one article is logged and
// leaves that article without a summary or sentiment; it does not abort
// the digest.

use std::collections::HashMap;

use clap::ValueEnum;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::analysis::traits::{
    Entity, EntityExtractor, Sentiment, SentimentClassifier, SentimentLabel, SummaryOptions,
    Summarizer, NO_CONTENT_SUMMARY,
};
use crate::news::models::Article;

/// How many entities make the trending list.
pub const TRENDING_LIMIT: usize = 10;

/// Which sentiments survive filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SentimentFilter {
    #[default]
    All,
    Positive,
    Negative,
}

impl SentimentFilter {
    pub fn accepts(&self, sentiment: Option<&Sentiment>) -> bool {
        match self {
            SentimentFilter::All => true,
            SentimentFilter::Positive => {
                sentiment.is_some_and(|s| s.label == SentimentLabel::Positive)
            }
            SentimentFilter::Negative => {
                sentiment.is_some_and(|s| s.label == SentimentLabel::Negative)
            }
        }
    }
}

/// The three analysis collaborators a digest needs.
#[derive(Clone, Copy)]
pub struct AnalysisServices<'a> {
    pub summarizer: &'a dyn Summarizer,
    pub sentiment: &'a dyn SentimentClassifier,
    pub entities: &'a dyn EntityExtractor,
}

#[derive(Debug, Clone)]
pub struct DigestOptions {
    pub summary: SummaryOptions,
    /// Case-insensitive substring required in the title or summary
    pub search: Option<String>,
    pub sentiment_filter: SentimentFilter,
    /// Call the sentiment classifier at all
    pub classify_sentiment: bool,
    /// Call the entity extractor at all
    pub extract_entities: bool,
    /// Articles analyzed at once
    pub concurrency: usize,
    /// Draw a progress bar on stderr
    pub progress: bool,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            summary: SummaryOptions::default(),
            search: None,
            sentiment_filter: SentimentFilter::All,
            classify_sentiment: true,
            extract_entities: true,
            concurrency: 4,
            progress: false,
        }
    }
}

/// One analyzed article.
#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub cluster: usize,
    pub article: Article,
    pub summary: String,
    pub sentiment: Option<Sentiment>,
    pub entities: Vec<Entity>,
}

impl DigestEntry {
    /// Whether the feed carried any body text for this article.
    pub fn has_body(&self) -> bool {
        self.article.body().is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Digest {
    /// Kept entries, in cluster order
    pub entries: Vec<DigestEntry>,
    /// Most-mentioned entity texts with their counts
    pub trending: Vec<(String, usize)>,
}

/// Analyze the grouped articles. `grouped` must already be sorted by
/// cluster id (as `TopicGrouping::grouped` is).
pub async fn run(
    grouped: &[(usize, Article)],
    services: AnalysisServices<'_>,
    options: &DigestOptions,
) -> Digest {
    let pb = progress_bar(grouped.len(), options.progress);
    let concurrency = options.concurrency.max(1);

    let analyzed: Vec<DigestEntry> = stream::iter(grouped)
        .map(|(cluster, article)| {
            let pb = &pb;
            async move {
                let entry = summarize_and_classify(*cluster, article, services, options).await;
                pb.inc(1);
                entry
            }
        })
        .buffered(concurrency)
        .collect()
        .await;
    pb.finish_and_clear();

    let search = options
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let kept: Vec<DigestEntry> = analyzed
        .into_iter()
        .filter(|e| matches_search(e, search.as_deref()))
        .filter(|e| options.sentiment_filter.accepts(e.sentiment.as_ref()))
        .collect();

    let entries: Vec<DigestEntry> = if options.extract_entities {
        stream::iter(kept)
            .map(|entry| add_entities(entry, services.entities))
            .buffered(concurrency)
            .collect()
            .await
    } else {
        kept
    };

    let trending = trending_entities(&entries, TRENDING_LIMIT);

    info!(
        analyzed = grouped.len(),
        kept = entries.len(),
        trending = trending.len(),
        "Digest complete"
    );

    Digest { entries, trending }
}

async fn summarize_and_classify(
    cluster: usize,
    article: &Article,
    services: AnalysisServices<'_>,
    options: &DigestOptions,
) -> DigestEntry {
    let body = article.body().unwrap_or("");

    let summary = if body.is_empty() {
        NO_CONTENT_SUMMARY.to_string()
    } else {
        match services.summarizer.summarize(body, &options.summary).await {
            Ok(s) => s,
            Err(e) => {
                warn!(url = %article.url, error = %e, "Summarization failed");
                String::new()
            }
        }
    };

    let sentiment = if body.is_empty() || !options.classify_sentiment {
        None
    } else {
        match services.sentiment.classify(body).await {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(url = %article.url, error = %e, "Sentiment classification failed");
                None
            }
        }
    };

    DigestEntry {
        cluster,
        article: article.clone(),
        summary,
        sentiment,
        entities: Vec::new(),
    }
}

async fn add_entities(mut entry: DigestEntry, extractor: &dyn EntityExtractor) -> DigestEntry {
    let Some(body) = entry.article.body() else {
        return entry;
    };
    match extractor.extract(body).await {
        Ok(entities) => entry.entities = entities,
        Err(e) => warn!(url = %entry.article.url, error = %e, "Entity extraction failed"),
    }
    entry
}

/// `needle` must already be lowercased. `None` matches everything.
fn matches_search(entry: &DigestEntry, needle: Option<&str>) -> bool {
    match needle {
        None => true,
        Some(n) => {
            entry.article.title.to_lowercase().contains(n)
                || entry.summary.to_lowercase().contains(n)
        }
    }
}

/// Count entity mentions across entries; highest counts first, ties in
/// first-seen order.
pub fn trending_entities(entries: &[DigestEntry], limit: usize) -> Vec<(String, usize)> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for entity in entries.iter().flat_map(|e| &e.entities) {
        let count = counts.entry(entity.text.clone()).or_insert(0);
        if *count == 0 {
            order.push(entity.text.clone());
        }
        *count += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|text| {
            let n = counts[&text];
            (text, n)
        })
        .collect();
    // Stable sort keeps first-seen order among equal counts
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(limit);
    ranked
}

fn progress_bar(len: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Analyzing [{bar:30.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::traits::EntityKind;

    fn entry_with(entities: &[&str]) -> DigestEntry {
        DigestEntry {
            cluster: 0,
            article: Article::default(),
            summary: String::new(),
            sentiment: None,
            entities: entities
                .iter()
                .map(|t| Entity {
                    text: t.to_string(),
                    kind: EntityKind::Org,
                })
                .collect(),
        }
    }

    #[test]
    fn test_trending_orders_by_count_then_first_seen() {
        let entries = vec![entry_with(&["B", "A"]), entry_with(&["A", "C", "B"])];
        let trending = trending_entities(&entries, 10);
        assert_eq!(
            trending,
            vec![("B".to_string(), 2), ("A".to_string(), 2), ("C".to_string(), 1)]
        );
    }

    #[test]
    fn test_trending_respects_limit() {
        let entries = vec![entry_with(&["A", "B", "C", "D"])];
        assert_eq!(trending_entities(&entries, 2).len(), 2);
    }

    #[test]
    fn test_sentiment_filter() {
        let pos = Sentiment {
            label: SentimentLabel::Positive,
            score: 0.9,
        };
        assert!(SentimentFilter::All.accepts(None));
        assert!(SentimentFilter::Positive.accepts(Some(&pos)));
        assert!(!SentimentFilter::Negative.accepts(Some(&pos)));
        assert!(!SentimentFilter::Positive.accepts(None));
    }

    #[test]
    fn test_matches_search_title_or_summary() {
        let mut e = entry_with(&[]);
        e.article.title = "Rust 2.0 Released".to_string();
        e.summary = "The compiler team shipped".to_string();
        assert!(matches_search(&e, Some("rust")));
        assert!(matches_search(&e, Some("compiler")));
        assert!(!matches_search(&e, Some("python")));
        assert!(matches_search(&e, None));
    }
}
