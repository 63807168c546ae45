//! The provenance graph: endpoint nodes and the clues (edges) that connect
//! them. See spec §3.3 and §4.1.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One of the four node kinds that can anchor a clue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointType {
    Query,
    Entity,
    Event,
    Section,
}

/// The pipeline stage that emitted a clue. Stages are strictly ordered
/// prepare → recall → expand → rerank (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Prepare,
    Recall,
    Expand,
    Rerank,
}

/// Advisory tag for downstream visualization; does not affect pipeline
/// semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayLevel {
    Final,
    Intermediate,
    Debug,
}

/// A uniform node in the clue graph. Singleton per `(type, id)` within one
/// `search` call, enforced by [`Tracker`](kgsearch_core::tracker::Tracker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: EndpointType,
    /// For `query`: `"origin"` or `"rewrite"`. For `entity`: the entity
    /// type string. For `event`/`section`: domain category, or empty.
    pub category: String,
    pub content: String,
    pub description: Option<String>,
}

/// An edge in the provenance graph, emitted by exactly one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clue {
    pub id: Uuid,
    pub stage: Stage,
    pub from: EndpointNode,
    pub to: EndpointNode,
    /// Always normalized into `[0, 1]` before being assigned here (§3.4.6).
    pub confidence: f32,
    pub relation: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub display_level: DisplayLevel,
}
