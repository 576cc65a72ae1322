// Embedder trait: the seam between the clustering core and the model.
//
// The default implementation runs all-MiniLM-L6-v2 locally via ONNX. Tests
// plug in deterministic fakes so the clusterer and projector can be
// exercised without model files.

use async_trait::async_trait;

use super::error::TopicError;

/// Maps texts to fixed-length dense vectors.
///
/// Implementations must be deterministic, return exactly one vector per
/// input text in the same order, and give every vector the same dimension.
/// Blank texts are a caller error (`TopicError::EmptyText`).
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, TopicError>;
}

/// Reject blank inputs before they reach a model.
pub fn ensure_non_blank(texts: &[String]) -> Result<(), TopicError> {
    match texts.iter().position(|t| t.trim().is_empty()) {
        Some(index) => Err(TopicError::EmptyText { index }),
        None => Ok(()),
    }
}
