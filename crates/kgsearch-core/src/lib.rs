//! Core search pipeline: Recall -> Expand -> Rerank, composed by
//! [`searcher::Searcher`] and instrumented throughout by [`tracker::Tracker`].
//!
//! The crate depends only on the store/LLM trait contracts in [`stores`] and
//! [`llm`]; concrete adapters live outside this crate.

pub mod bm25;
pub mod error;
pub mod expand;
pub mod llm;
pub mod query_preparer;
pub mod recall;
pub mod rerank_pagerank;
pub mod rerank_rrf;
pub mod retry;
pub mod searcher;
pub mod stores;
pub mod telemetry;
pub mod tokenizer;
pub mod tracker;
pub mod vector_ops;

#[cfg(test)]
mod test_support;

pub use error::{SearchError, SearchResult};
pub use searcher::Searcher;
pub use tracker::Tracker;
