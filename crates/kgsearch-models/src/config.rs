//! Runtime configuration for one `search` call: static algorithm parameters
//! plus the mutable context the pipeline fills in as it runs (§3.3, §6.1).

use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    Event,
    Section,
}

impl Default for ReturnType {
    fn default() -> Self {
        ReturnType::Event
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankStrategy {
    Rrf,
    Pagerank,
}

impl Default for RerankStrategy {
    fn default() -> Self {
        RerankStrategy::Rrf
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
    pub enabled: bool,
    pub max_entities: usize,
    pub entity_similarity_threshold: f32,
    pub event_similarity_threshold: f32,
    pub vector_top_k: usize,
    pub vector_candidates: usize,
    pub use_fast_mode: bool,
    pub final_entity_weight_threshold: Option<f32>,
    pub top_n: Option<usize>,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entities: 25,
            entity_similarity_threshold: 0.4,
            event_similarity_threshold: 0.3,
            vector_top_k: 15,
            vector_candidates: 20,
            use_fast_mode: true,
            final_entity_weight_threshold: None,
            top_n: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandConfig {
    pub enabled: bool,
    pub max_hops: u32,
    pub entities_per_hop: usize,
    pub weight_change_threshold: f32,
    pub event_similarity_threshold: f32,
    pub min_events_per_hop: usize,
    pub max_events_per_hop: usize,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_hops: 3,
            entities_per_hop: 10,
            weight_change_threshold: 0.1,
            event_similarity_threshold: 0.3,
            min_events_per_hop: 5,
            max_events_per_hop: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub strategy: RerankStrategy,
    pub score_threshold: f32,
    pub max_results: usize,
    pub pagerank_section_top_k: usize,
    pub pagerank_damping: f64,
    pub rrf_k: u32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            strategy: RerankStrategy::default(),
            score_threshold: 0.5,
            max_results: 10,
            pagerank_section_top_k: 15,
            pagerank_damping: 0.85,
            rrf_k: 60,
        }
    }
}

/// The full input to one `search` call, plus the runtime fields the
/// pipeline populates as it executes (query rewrite, cached embedding,
/// extracted attributes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    pub original_query: String,
    /// Starts equal to `original_query`; Query Preparer may overwrite it
    /// with a rewritten form (§4.3).
    pub query: String,
    pub source_config_ids: Vec<String>,
    pub article_id: Option<String>,
    pub background: Option<String>,
    #[serde(default = "default_true")]
    pub enable_query_rewrite: bool,
    #[serde(default)]
    pub return_type: ReturnType,
    #[serde(default)]
    pub recall: RecallConfig,
    #[serde(default)]
    pub expand: ExpandConfig,
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Cached query embedding, set once by Query Preparer (§4.3 step 2).
    #[serde(skip)]
    pub query_embedding: Option<Vec<f32>>,
    /// Attributes extracted by the LLM in non-fast mode (§4.3 step 3).
    #[serde(skip)]
    pub extracted_attributes: Vec<ExtractedAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedAttribute {
    pub name: String,
    pub entity_type: String,
    pub weight: f32,
}

impl SearchConfig {
    pub fn new(query: impl Into<String>, source_config_ids: Vec<String>) -> Self {
        let query = query.into();
        Self {
            original_query: query.clone(),
            query,
            source_config_ids,
            article_id: None,
            background: None,
            enable_query_rewrite: false,
            return_type: ReturnType::default(),
            recall: RecallConfig::default(),
            expand: ExpandConfig::default(),
            rerank: RerankConfig::default(),
            query_embedding: None,
            extracted_attributes: Vec::new(),
        }
    }

    pub fn query_was_rewritten(&self) -> bool {
        self.query != self.original_query
    }
}
