// Topic grouping: embed, cluster, project, then join back to the articles.
//
// The embedder runs once per batch; the clusterer and the projector each
// read its output independently. Results are joined to the article
// metadata by index into a ClusterTable (for the topic map) and a list of
// (cluster id, article) pairs sorted by cluster (for grouped display).
// All-or-nothing: any stage failing fails the batch.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::TopicError;
use super::kmeans::KMeans;
use super::traits::{ensure_non_blank, Embedder};
use super::tsne::Tsne;
use crate::news::models::Article;

/// One article's row on the topic map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRow {
    pub title: String,
    pub url: String,
    pub cluster: usize,
    pub x: f64,
    pub y: f64,
}

/// Article metadata joined with cluster ids and 2-D coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterTable {
    pub rows: Vec<ClusterRow>,
}

impl ClusterTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct cluster ids present in the table, ascending.
    pub fn cluster_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.rows.iter().map(|r| r.cluster).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Output of the topic pipeline for one batch.
#[derive(Debug, Clone, Default)]
pub struct TopicGrouping {
    pub table: ClusterTable,
    /// (cluster id, article) pairs, stably sorted by cluster id
    pub grouped: Vec<(usize, Article)>,
    /// Map coordinates for each entry of `grouped`, in the same order
    pub grouped_points: Vec<(f64, f64)>,
    /// Cluster count actually used (the request clamped to the batch size)
    pub clusters: usize,
}

/// Embedding → k-means → t-SNE over one batch of articles.
#[derive(Debug, Clone, Default)]
pub struct TopicPipeline {
    pub kmeans: KMeans,
    pub tsne: Tsne,
}

impl TopicPipeline {
    pub fn new(clusters: usize) -> Self {
        Self {
            kmeans: KMeans::new(clusters),
            tsne: Tsne::default(),
        }
    }

    pub async fn run(
        &self,
        embedder: &dyn Embedder,
        articles: &[Article],
    ) -> Result<TopicGrouping, TopicError> {
        let texts: Vec<String> = articles
            .iter()
            .map(|a| a.representative_text().to_string())
            .collect();
        ensure_non_blank(&texts)?;

        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed(&texts).await?
        };
        if vectors.len() != articles.len() {
            return Err(TopicError::LengthMismatch {
                what: "embeddings",
                expected: articles.len(),
                got: vectors.len(),
            });
        }

        let fit = self.kmeans.fit(&vectors)?;
        let points = self.tsne.project(&vectors)?;

        info!(
            articles = articles.len(),
            clusters = fit.k,
            inertia = fit.inertia,
            "Grouped articles by topic"
        );

        let mut grouping = assemble(articles, &fit.assignment, &points)?;
        grouping.clusters = fit.k;
        Ok(grouping)
    }
}

/// Cluster `articles` into `clusters` topics with the default seeds.
pub async fn group_articles_by_topic(
    embedder: &dyn Embedder,
    articles: &[Article],
    clusters: usize,
) -> Result<TopicGrouping, TopicError> {
    TopicPipeline::new(clusters).run(embedder, articles).await
}

/// Join articles, cluster ids and map points by index.
pub fn assemble(
    articles: &[Article],
    assignment: &[usize],
    points: &[(f64, f64)],
) -> Result<TopicGrouping, TopicError> {
    let n = articles.len();
    if assignment.len() != n {
        return Err(TopicError::LengthMismatch {
            what: "cluster assignment",
            expected: n,
            got: assignment.len(),
        });
    }
    if points.len() != n {
        return Err(TopicError::LengthMismatch {
            what: "projected points",
            expected: n,
            got: points.len(),
        });
    }

    let rows = articles
        .iter()
        .zip(assignment)
        .zip(points)
        .map(|((article, &cluster), &(x, y))| ClusterRow {
            title: article.title.clone(),
            url: article.url.clone(),
            cluster,
            x,
            y,
        })
        .collect();

    // sort_by_key is stable: articles keep feed order within a cluster
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&i| assignment[i]);

    let grouped = order
        .iter()
        .map(|&i| (assignment[i], articles[i].clone()))
        .collect();
    let grouped_points = order.iter().map(|&i| points[i]).collect();

    let clusters = assignment.iter().max().map_or(0, |&m| m + 1);

    Ok(TopicGrouping {
        table: ClusterTable { rows },
        grouped,
        grouped_points,
        clusters,
    })
}
