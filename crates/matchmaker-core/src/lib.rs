//! Matchmaker core library: repository recommendations from watch history.
//!
//! The indexer turns the watch, repository, language and test record files
//! into an [`IndexSet`], cached on disk as a fingerprinted snapshot. The query
//! engine scores candidate repositories per user from lineage, authorship,
//! naming, language and co-occurrence signals. The cluster module groups
//! repositories by their language profile with k-means.

pub mod cluster;
pub mod config;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod query;
pub mod store;

pub use config::{EngineConfig, IndexConfig, ScoringWeights};
pub use errors::{MatchError, MatchResult};
pub use indexer::pipeline::{IndexBuilder, IndexSet};
pub use query::engine::{format_results, write_results, Engine};
pub use query::neighbors::{IndexNeighbors, NeighborSource, NoNeighbors};
pub use store::database::{MatrixKind, MatrixStore};
