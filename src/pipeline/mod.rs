// Pipelines that run on top of the topic grouping.

pub mod digest;
