//! Store adapter contracts (§4.2, §6.2). These are the opaque boundary
//! between the core and whatever SQL/vector backend an embedder wires up;
//! the core only ever depends on these traits, never on a concrete client.

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

/// Transport-level result type for adapter calls. Implementations return
/// their own error type wrapped in `anyhow`; the pipeline decides
/// fatal-vs-degraded handling per §7, so the trait itself stays opaque.
pub type StoreResult<T> = anyhow::Result<T>;

#[derive(Debug, Clone)]
pub struct EntityVectorMatch {
    pub entity_id: Uuid,
    pub name: String,
    pub entity_type: String,
    pub entity_type_id: Uuid,
    /// Always in `[0, 1]`; callers clamp out-of-range oracle output (§9).
    pub similarity: f32,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EntityTypeInfo {
    pub id: Uuid,
    pub entity_type: String,
    pub similarity_threshold: f32,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct EntityEventLink {
    pub event_id: Uuid,
    pub entity_id: Uuid,
    pub link_weight: f32,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn search_entities_by_vector(
        &self,
        query_vec: &[f32],
        source_config_ids: &[String],
        k: usize,
        num_candidates: usize,
        entity_type: Option<&str>,
    ) -> StoreResult<Vec<EntityVectorMatch>>;

    async fn search_entities_by_name(
        &self,
        name: &str,
        source_config_ids: &[String],
        top_k: usize,
    ) -> StoreResult<Vec<EntityVectorMatch>>;

    async fn get_entity_types(&self, source_config_ids: &[String]) -> StoreResult<Vec<EntityTypeInfo>>;

    /// Joins through the entity↔event link table (§4.4 step 2, §4.5 step 1).
    async fn get_events_by_entity_ids(
        &self,
        entity_ids: &[Uuid],
        source_config_ids: &[String],
    ) -> StoreResult<Vec<EntityEventLink>>;

    /// The reverse join, keyed the other way (§4.7 step 1).
    async fn get_entities_by_event_ids(
        &self,
        event_ids: &[Uuid],
        source_config_ids: &[String],
    ) -> StoreResult<Vec<EntityEventLink>>;
}

#[derive(Debug, Clone)]
pub struct EventVectorMatch {
    pub event_id: Uuid,
    pub similarity: f32,
    pub article_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn search_events_by_vector(
        &self,
        query_vec: &[f32],
        source_config_ids: &[String],
        k: usize,
        use_content_vector: bool,
    ) -> StoreResult<Vec<EventVectorMatch>>;

    /// Returns the same cardinality as `event_ids` minus any missing ids
    /// (§4.2, "no error" on partial misses).
    async fn batch_get_events(&self, event_ids: &[Uuid]) -> StoreResult<Vec<kgsearch_models::Event>>;

    async fn batch_get_event_vectors(&self, event_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<f32>>>;

    async fn batch_get_event_tokens(&self, event_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<String>>>;
}

#[derive(Debug, Clone)]
pub struct SectionVectorMatch {
    pub section_id: Uuid,
    pub article_id: Uuid,
    pub similarity: f32,
    pub heading: String,
    pub content: String,
    pub rank: i32,
}

#[async_trait]
pub trait SectionStore: Send + Sync {
    async fn search_sections_by_vector(
        &self,
        query_vec: &[f32],
        source_config_ids: &[String],
        k: usize,
        article_id: Option<Uuid>,
    ) -> StoreResult<Vec<SectionVectorMatch>>;

    /// Via `Event.references`.
    async fn get_sections_by_event_ids(&self, event_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<Uuid>>>;
}
