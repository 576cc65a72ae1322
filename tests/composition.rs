// Composition tests — verifying that the pipeline stages chain together.
//
// These tests exercise the data flow between modules:
//   Articles -> Embedder -> k-means + t-SNE -> TopicGrouping -> Digest
// with in-process fakes standing in for the ONNX model and the hosted
// inference API. No network calls or model files are needed.

use anyhow::Result;
use async_trait::async_trait;

use newsprism::analysis::traits::{
    Entity, EntityExtractor, EntityKind, Sentiment, SentimentClassifier, SentimentLabel,
    SummaryOptions, Summarizer, NO_CONTENT_SUMMARY,
};
use newsprism::news::models::{Article, Source};
use newsprism::pipeline::digest::{self, AnalysisServices, DigestOptions, SentimentFilter};
use newsprism::topics::error::TopicError;
use newsprism::topics::grouping::{group_articles_by_topic, TopicPipeline};
use newsprism::topics::traits::Embedder;

// ============================================================
// Fakes
// ============================================================

const TOPICS: [&str; 3] = ["rust", "election", "football"];

/// One axis per topic keyword, plus a small length-based axis so that
/// articles on the same topic are close but not identical.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, TopicError> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f64> = TOPICS
                    .iter()
                    .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
                    .collect();
                v.push((t.len() % 7) as f64 * 0.01);
                v
            })
            .collect())
    }
}

/// Same vector for every text, with components that have no exact binary
/// form.
struct ConstantEmbedder;

#[async_trait]
impl Embedder for ConstantEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, TopicError> {
        let v: Vec<f64> = (0..64).map(|i| (0.37 * i as f64).sin() / 13.0).collect();
        Ok(vec![v; texts.len()])
    }
}

/// Returns fewer vectors than texts.
struct ShortEmbedder;

#[async_trait]
impl Embedder for ShortEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, TopicError> {
        Ok(vec![vec![0.0; 4]; texts.len().saturating_sub(1)])
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f64>>, TopicError> {
        Err(TopicError::EmbeddingUnavailable("model missing".to_string()))
    }
}

/// Summary is the first sentence; "good" anywhere means positive; every
/// capitalized word is an organization.
struct FakeAnalyzer;

#[async_trait]
impl Summarizer for FakeAnalyzer {
    async fn summarize(&self, text: &str, _options: &SummaryOptions) -> Result<String> {
        if text.contains("BROKEN") {
            anyhow::bail!("service unavailable");
        }
        Ok(text.split('.').next().unwrap_or("").trim().to_string())
    }
}

#[async_trait]
impl SentimentClassifier for FakeAnalyzer {
    async fn classify(&self, text: &str) -> Result<Sentiment> {
        let label = if text.contains("good") {
            SentimentLabel::Positive
        } else {
            SentimentLabel::Negative
        };
        Ok(Sentiment { label, score: 0.9 })
    }
}

#[async_trait]
impl EntityExtractor for FakeAnalyzer {
    async fn extract(&self, text: &str) -> Result<Vec<Entity>> {
        Ok(text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
            .map(|w| Entity {
                text: w.to_string(),
                kind: EntityKind::Org,
            })
            .collect())
    }
}

fn article(title: &str, content: Option<&str>) -> Article {
    Article {
        source: Source {
            id: None,
            name: "Wire".to_string(),
        },
        title: title.to_string(),
        url: format!("https://example.com/{}", title.replace(' ', "-")),
        content: content.map(str::to_string),
        ..Article::default()
    }
}

fn five_articles() -> Vec<Article> {
    vec![
        article("Rust release", Some("Rust 2.0 is good news for Mozilla.")),
        article("Election night", Some("The election count drags on in Ohio.")),
        article("Rust tooling", Some("Cargo gets a good rust speedup.")),
        article("Election polls", Some("Polls tighten before the election.")),
        article("Rust in kernels", Some("Linux merges more rust drivers.")),
    ]
}

fn services(analyzer: &FakeAnalyzer) -> AnalysisServices<'_> {
    AnalysisServices {
        summarizer: analyzer,
        sentiment: analyzer,
        entities: analyzer,
    }
}

// ============================================================
// Chain: Articles -> Embedder -> TopicGrouping
// ============================================================

#[tokio::test]
async fn five_articles_two_clusters() {
    let articles = five_articles();
    let grouping = group_articles_by_topic(&KeywordEmbedder, &articles, 2)
        .await
        .unwrap();

    assert_eq!(grouping.clusters, 2);
    assert_eq!(grouping.table.len(), 5);
    assert_eq!(grouping.table.cluster_ids(), vec![0, 1]);
    assert_eq!(grouping.grouped.len(), 5);

    // Rows keep feed order; same-topic articles share a cluster
    let rows = &grouping.table.rows;
    assert_eq!(rows[0].title, "Rust release");
    assert_eq!(rows[0].cluster, rows[2].cluster);
    assert_eq!(rows[0].cluster, rows[4].cluster);
    assert_eq!(rows[1].cluster, rows[3].cluster);
    assert_ne!(rows[0].cluster, rows[1].cluster);
}

#[tokio::test]
async fn grouped_is_sorted_and_stable() {
    let articles = five_articles();
    let grouping = group_articles_by_topic(&KeywordEmbedder, &articles, 2)
        .await
        .unwrap();

    let ids: Vec<usize> = grouping.grouped.iter().map(|(c, _)| *c).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);

    // Within a cluster, feed order is kept
    let rust_titles: Vec<&str> = grouping
        .grouped
        .iter()
        .filter(|(_, a)| a.title.starts_with("Rust"))
        .map(|(_, a)| a.title.as_str())
        .collect();
    assert_eq!(rust_titles, vec!["Rust release", "Rust tooling", "Rust in kernels"]);

    // Each grouped entry carries its own map point
    assert_eq!(grouping.grouped_points.len(), grouping.grouped.len());
    for ((_, article), point) in grouping.grouped.iter().zip(&grouping.grouped_points) {
        let row = grouping
            .table
            .rows
            .iter()
            .find(|r| r.url == article.url)
            .unwrap();
        assert_eq!((row.x, row.y), *point);
    }
}

#[tokio::test]
async fn same_articles_same_grouping() {
    let articles = five_articles();
    let a = group_articles_by_topic(&KeywordEmbedder, &articles, 3)
        .await
        .unwrap();
    let b = group_articles_by_topic(&KeywordEmbedder, &articles, 3)
        .await
        .unwrap();
    assert_eq!(a.table, b.table);
}

#[tokio::test]
async fn more_clusters_than_articles_clamps() {
    let articles = five_articles()[..3].to_vec();
    let grouping = TopicPipeline::new(5)
        .run(&KeywordEmbedder, &articles)
        .await
        .unwrap();
    assert_eq!(grouping.clusters, 3);
    assert_eq!(grouping.table.cluster_ids(), vec![0, 1, 2]);
    assert_eq!(grouping.table.len(), 3);
}

#[tokio::test]
async fn identical_articles_fill_k_clusters() {
    let articles: Vec<Article> = (0..5)
        .map(|i| article(&format!("Wire copy {i}"), Some("The same syndicated story.")))
        .collect();
    let grouping = group_articles_by_topic(&ConstantEmbedder, &articles, 2)
        .await
        .unwrap();

    assert_eq!(grouping.clusters, 2);
    assert_eq!(grouping.table.cluster_ids(), vec![0, 1]);
    assert_eq!(grouping.grouped.len(), 5);
}

#[tokio::test]
async fn empty_batch_is_empty_grouping() {
    let grouping = group_articles_by_topic(&FailingEmbedder, &[], 5)
        .await
        .unwrap();
    assert!(grouping.table.is_empty());
    assert!(grouping.grouped.is_empty());
}

#[tokio::test]
async fn single_article_is_cluster_zero_at_origin() {
    let articles = vec![article("Rust release", Some("Rust ships."))];
    let grouping = group_articles_by_topic(&KeywordEmbedder, &articles, 5)
        .await
        .unwrap();
    let row = &grouping.table.rows[0];
    assert_eq!(row.cluster, 0);
    assert_eq!((row.x, row.y), (0.0, 0.0));
}

#[tokio::test]
async fn embedder_failure_fails_whole_batch() {
    let err = group_articles_by_topic(&FailingEmbedder, &five_articles(), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, TopicError::EmbeddingUnavailable(_)));
}

#[tokio::test]
async fn short_embedding_output_is_rejected() {
    let err = group_articles_by_topic(&ShortEmbedder, &five_articles(), 2)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TopicError::LengthMismatch {
            expected: 5,
            got: 4,
            ..
        }
    ));
}

#[tokio::test]
async fn blank_article_is_rejected() {
    let mut articles = five_articles();
    articles.push(article("   ", None));
    let err = group_articles_by_topic(&KeywordEmbedder, &articles, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, TopicError::EmptyText { index: 5 }));
}

// ============================================================
// Chain: TopicGrouping -> Digest
// ============================================================

#[tokio::test]
async fn digest_keeps_cluster_order_and_counts_entities() {
    let articles = five_articles();
    let grouping = group_articles_by_topic(&KeywordEmbedder, &articles, 2)
        .await
        .unwrap();

    let analyzer = FakeAnalyzer;
    let result =
        digest::run(&grouping.grouped, services(&analyzer), &DigestOptions::default()).await;

    assert_eq!(result.entries.len(), 5);
    let clusters: Vec<usize> = result.entries.iter().map(|e| e.cluster).collect();
    let expected: Vec<usize> = grouping.grouped.iter().map(|(c, _)| *c).collect();
    assert_eq!(clusters, expected);

    let release = result
        .entries
        .iter()
        .find(|e| e.article.title == "Rust release")
        .unwrap();
    assert_eq!(release.summary, "Rust 2");
    assert_eq!(
        release.sentiment.as_ref().map(|s| s.label),
        Some(SentimentLabel::Positive)
    );
    assert!(release.entities.iter().any(|e| e.text == "Mozilla"));

    assert!(result.trending.len() <= digest::TRENDING_LIMIT);
    assert!(result.trending.windows(2).all(|w| w[0].1 >= w[1].1));
}

#[tokio::test]
async fn digest_search_matches_title_or_summary() {
    let grouped = vec![
        (0, article("Rust release", Some("Cargo is fast."))),
        (0, article("Other news", Some("Rust is mentioned here."))),
        (1, article("Election night", Some("Votes counted."))),
    ];
    let analyzer = FakeAnalyzer;
    let options = DigestOptions {
        search: Some("RUST".to_string()),
        ..DigestOptions::default()
    };
    let result = digest::run(&grouped, services(&analyzer), &options).await;

    let titles: Vec<&str> = result
        .entries
        .iter()
        .map(|e| e.article.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Rust release", "Other news"]);
}

#[tokio::test]
async fn digest_sentiment_filter() {
    let grouped = vec![
        (0, article("Up", Some("A good day."))),
        (0, article("Down", Some("A bad day."))),
        (1, article("Empty", None)),
    ];
    let analyzer = FakeAnalyzer;

    let positive = DigestOptions {
        sentiment_filter: SentimentFilter::Positive,
        ..DigestOptions::default()
    };
    let result = digest::run(&grouped, services(&analyzer), &positive).await;
    let titles: Vec<&str> = result.entries.iter().map(|e| e.article.title.as_str()).collect();
    assert_eq!(titles, vec!["Up"]);

    let negative = DigestOptions {
        sentiment_filter: SentimentFilter::Negative,
        ..DigestOptions::default()
    };
    let result = digest::run(&grouped, services(&analyzer), &negative).await;
    let titles: Vec<&str> = result.entries.iter().map(|e| e.article.title.as_str()).collect();
    assert_eq!(titles, vec!["Down"]);
}

#[tokio::test]
async fn digest_article_without_body_gets_placeholder() {
    let grouped = vec![(0, article("Headline only", None))];
    let analyzer = FakeAnalyzer;
    let result = digest::run(&grouped, services(&analyzer), &DigestOptions::default()).await;

    let entry = &result.entries[0];
    assert!(!entry.has_body());
    assert_eq!(entry.summary, NO_CONTENT_SUMMARY);
    assert!(entry.sentiment.is_none());
    assert!(entry.entities.is_empty());
    assert!(result.trending.is_empty());
}

#[tokio::test]
async fn digest_survives_failed_summary() {
    let grouped = vec![
        (0, article("Broken", Some("BROKEN feed text."))),
        (0, article("Fine", Some("Works fine."))),
    ];
    let analyzer = FakeAnalyzer;
    let result = digest::run(&grouped, services(&analyzer), &DigestOptions::default()).await;

    assert_eq!(result.entries.len(), 2);
    assert!(result.entries[0].summary.is_empty());
    assert_eq!(result.entries[1].summary, "Works fine");
}

#[tokio::test]
async fn digest_can_skip_sentiment_and_entities() {
    let grouped = vec![(0, article("Acme wins", Some("Acme had a good quarter.")))];
    let analyzer = FakeAnalyzer;
    let options = DigestOptions {
        classify_sentiment: false,
        extract_entities: false,
        ..DigestOptions::default()
    };
    let result = digest::run(&grouped, services(&analyzer), &options).await;

    let entry = &result.entries[0];
    assert!(entry.sentiment.is_none());
    assert!(entry.entities.is_empty());
    assert!(result.trending.is_empty());
}

#[tokio::test]
async fn digest_trending_counts_repeats_across_articles() {
    let grouped = vec![
        (0, article("a", Some("Acme and Globex merge."))),
        (0, article("b", Some("Acme shares rise."))),
        (1, article("c", Some("Regulators eye Acme."))),
    ];
    let analyzer = FakeAnalyzer;
    let result = digest::run(&grouped, services(&analyzer), &DigestOptions::default()).await;
    assert_eq!(result.trending[0], ("Acme".to_string(), 3));
}
