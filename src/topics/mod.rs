// Topic clustering core — embeddings, k-means, t-SNE, and the join back
// to article metadata.

pub mod download;
pub mod embeddings;
pub mod error;
pub mod grouping;
pub mod kmeans;
pub mod traits;
pub mod tsne;
