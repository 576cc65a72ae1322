// Article analysis — summaries, sentiment and named entities.
//
// Trait-based so the hosted inference API can be swapped for another
// provider without touching the digest pipeline.

pub mod inference;
pub mod rate_limiter;
pub mod traits;
