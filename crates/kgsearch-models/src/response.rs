//! The shape returned by `Searcher::search` (§4.8, §6.1).

use serde::{Deserialize, Serialize};

use crate::clue::Clue;
use crate::config::RerankStrategy;
use crate::persistent::Event;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecallStats {
    pub entities_found: usize,
    pub entities_passed: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandStats {
    pub hops_executed: u32,
    pub entities_discovered: usize,
    pub converged: bool,
    pub duration_ms: u64,
}

impl Default for ExpandStats {
    fn default() -> Self {
        Self {
            hops_executed: 0,
            entities_discovered: 0,
            converged: true,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankStats {
    pub strategy: RerankStrategy,
    pub events_ranked: usize,
    pub duration_ms: u64,
}

impl Default for RerankStats {
    fn default() -> Self {
        Self {
            strategy: RerankStrategy::Rrf,
            events_ranked: 0,
            duration_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchStats {
    pub recall: RecallStats,
    pub expand: ExpandStats,
    pub rerank: RerankStats,
    /// Human-readable notes for every degraded (non-fatal) path taken
    /// while answering this query (§7, "User-visible behavior").
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInfo {
    pub original: String,
    pub current: String,
    pub rewritten: bool,
    pub embedding_generated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub events: Vec<Event>,
    pub clues: Vec<Clue>,
    pub stats: SearchStats,
    pub query_info: QueryInfo,
}
