//! Persistent entities owned by the relational store and the vector/text
//! index. The core never writes these back; §3.5 treats them as read-only.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A structured event extracted from an ingested article.
///
/// Belongs to exactly one [`InformationSource`](crate::config::SearchConfig::source_config_ids)
/// and exactly one article.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub source_config_id: String,
    pub article_id: Uuid,
    pub title: String,
    pub summary: Option<String>,
    pub content: String,
    pub rank: i32,
    /// Ordered section ids this event draws its content from.
    pub references: Vec<Uuid>,
    pub start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub extra_data: Value,
}

/// A named, typed entity extracted during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub source_config_id: String,
    pub entity_type_id: Uuid,
    /// Denormalized type string, kept alongside `entity_type_id` so callers
    /// that only have the string (e.g. from a vector index payload) can
    /// still build an `Entity` without a second lookup.
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    pub normalized_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub extra_data: Value,
}

/// Many-to-many link between an [`Entity`] and an [`Event`], carrying the
/// relevance weight assigned at extraction time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntityLink {
    pub event_id: Uuid,
    pub entity_id: Uuid,
    /// In `[0, 9.99]`, per §3.1.
    pub weight: f32,
}

/// Configuration row describing one entity type, scoped to a source or
/// `None` for the system default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityType {
    pub id: Uuid,
    pub source_config_id: Option<String>,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub name: String,
    pub weight: f32,
    /// In `[0, 1]`. Per-type thresholds only ever raise the effective
    /// threshold used in Recall step 1 (§4.4): `max(global, type)`.
    pub similarity_threshold: f32,
}

/// A heading-delimited slice of an article's body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleSection {
    pub id: Uuid,
    pub article_id: Uuid,
    pub rank: i32,
    pub heading: String,
    pub content: String,
}
