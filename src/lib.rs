// newsprism: live news headlines grouped into topic clusters
//
// This is the library root. The topic clustering core lives in `topics`;
// the other modules fetch articles, analyze them through an external
// inference service, and print the results.

pub mod analysis;
pub mod config;
pub mod news;
pub mod output;
pub mod pipeline;
pub mod status;
pub mod topics;
