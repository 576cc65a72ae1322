// Error taxonomy for the topic clustering core.
//
// Everything above the core (CLI, news fetching, analysis) speaks
// anyhow::Result. The core keeps a typed error so callers and tests can
// tell a missing model apart from a bad cluster count.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopicError {
    /// The embedding backend could not be loaded or failed during inference.
    /// Fatal to the whole batch; the caller may retry the pipeline.
    #[error("embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("invalid cluster count {requested} for {samples} samples")]
    InvalidClusterCount { requested: usize, samples: usize },

    #[error("need at least {needed} samples, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    /// Input text at `index` was empty or whitespace. Callers substitute the
    /// article title before embedding.
    #[error("text at index {index} is empty")]
    EmptyText { index: usize },

    #[error("vector {index} has dimension {got}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        got: usize,
    },

    #[error("{what} has {got} entries, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

/// Check that every vector has the same dimension as the first one.
/// Returns that dimension (0 for an empty batch).
pub fn check_dimensions(vectors: &[Vec<f64>]) -> Result<usize, TopicError> {
    let Some(first) = vectors.first() else {
        return Ok(0);
    };
    let expected = first.len();
    for (index, v) in vectors.iter().enumerate() {
        if v.len() != expected {
            return Err(TopicError::DimensionMismatch {
                index,
                expected,
                got: v.len(),
            });
        }
    }
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_dimensions_empty() {
        assert_eq!(check_dimensions(&[]).unwrap(), 0);
    }

    #[test]
    fn test_check_dimensions_consistent() {
        let v = vec![vec![1.0, 2.0], vec![3.0, 4.0]];
        assert_eq!(check_dimensions(&v).unwrap(), 2);
    }

    #[test]
    fn test_check_dimensions_reports_offender() {
        let v = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0]];
        match check_dimensions(&v) {
            Err(TopicError::DimensionMismatch {
                index,
                expected,
                got,
            }) => {
                assert_eq!(index, 2);
                assert_eq!(expected, 2);
                assert_eq!(got, 1);
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }
}
