// News source: NewsAPI top-headlines client and article records.

pub mod client;
pub mod models;
