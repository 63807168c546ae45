//! Deterministic in-memory fixtures used by every stage's unit tests.
//! Not compiled outside `#[cfg(test)]`: this is test tooling, not a
//! reference store adapter.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use kgsearch_models::Event as EventModel;

use crate::llm::{CompletionClient, EmbeddingClient, ExtractedAttributeCandidate, LlmResult};
use crate::stores::{
    EntityEventLink, EntityStore, EntityTypeInfo, EntityVectorMatch, EventStore, EventVectorMatch,
    SectionStore, SectionVectorMatch, StoreResult,
};

/// Every fixture vector is built so that its cosine similarity against the
/// conventional test query embedding `[1.0, 0.0]` equals exactly the
/// similarity the test asked for. This lets Recall's stubbed ANN search
/// and Expand/Rerank's self-computed cosine agree without double
/// bookkeeping.
pub fn pseudo_vector(similarity: f32) -> Vec<f32> {
    let s = similarity.clamp(-1.0, 1.0);
    vec![s, (1.0 - s * s).max(0.0).sqrt()]
}

pub const CANONICAL_QUERY_EMBEDDING: [f32; 2] = [1.0, 0.0];

#[derive(Clone)]
struct EntityRecord {
    name: String,
    entity_type: String,
    entity_type_id: Uuid,
    similarity: f32,
}

#[derive(Clone)]
struct EventRecord {
    article_id: Uuid,
    title: String,
    content: String,
    category: Option<String>,
    references: Vec<Uuid>,
    similarity: f32,
}

#[derive(Clone)]
struct SectionRecord {
    article_id: Uuid,
    heading: String,
    content: String,
    rank: i32,
    similarity: f32,
}

#[derive(Default)]
pub struct InMemoryWorld {
    entities: Mutex<HashMap<Uuid, EntityRecord>>,
    entity_types: Mutex<Vec<EntityTypeInfo>>,
    entity_event_links: Mutex<Vec<EntityEventLink>>,
    events: Mutex<HashMap<Uuid, EventRecord>>,
    sections: Mutex<HashMap<Uuid, SectionRecord>>,
    event_sections: Mutex<HashMap<Uuid, Vec<Uuid>>>,
}

impl InMemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_entity(&self, name: &str, entity_type: &str, similarity: f32) -> Uuid {
        let id = Uuid::new_v4();
        self.entities.lock().unwrap().insert(
            id,
            EntityRecord {
                name: name.to_string(),
                entity_type: entity_type.to_string(),
                entity_type_id: Uuid::new_v4(),
                similarity,
            },
        );
        id
    }

    pub fn add_entity_type(&self, entity_type: &str, threshold: f32, weight: f32) {
        self.entity_types.lock().unwrap().push(EntityTypeInfo {
            id: Uuid::new_v4(),
            entity_type: entity_type.to_string(),
            similarity_threshold: threshold,
            weight,
        });
    }

    pub fn add_event(&self, title: &str, content: &str, similarity: f32, references: Vec<Uuid>) -> Uuid {
        self.add_event_with_category(title, content, similarity, references, None)
    }

    pub fn add_event_with_category(
        &self,
        title: &str,
        content: &str,
        similarity: f32,
        references: Vec<Uuid>,
        category: Option<&str>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.events.lock().unwrap().insert(
            id,
            EventRecord {
                article_id: Uuid::new_v4(),
                title: title.to_string(),
                content: content.to_string(),
                category: category.map(|c| c.to_string()),
                references: references.clone(),
                similarity,
            },
        );
        self.event_sections.lock().unwrap().insert(id, references);
        id
    }

    pub fn add_section(&self, heading: &str, content: &str, similarity: f32) -> Uuid {
        let id = Uuid::new_v4();
        self.sections.lock().unwrap().insert(
            id,
            SectionRecord {
                article_id: Uuid::new_v4(),
                heading: heading.to_string(),
                content: content.to_string(),
                rank: 0,
                similarity,
            },
        );
        id
    }

    pub fn link_entity_event(&self, entity_id: Uuid, event_id: Uuid, link_weight: f32) {
        self.entity_event_links.lock().unwrap().push(EntityEventLink {
            event_id,
            entity_id,
            link_weight,
        });
    }
}

#[async_trait]
impl EntityStore for InMemoryWorld {
    async fn search_entities_by_vector(
        &self,
        _query_vec: &[f32],
        _source_config_ids: &[String],
        k: usize,
        _num_candidates: usize,
        entity_type: Option<&str>,
    ) -> StoreResult<Vec<EntityVectorMatch>> {
        let entities = self.entities.lock().unwrap();
        let mut matches: Vec<EntityVectorMatch> = entities
            .iter()
            .filter(|(_, rec)| entity_type.map(|t| t == rec.entity_type).unwrap_or(true))
            .map(|(id, rec)| EntityVectorMatch {
                entity_id: *id,
                name: rec.name.clone(),
                entity_type: rec.entity_type.clone(),
                entity_type_id: rec.entity_type_id,
                similarity: rec.similarity,
                description: None,
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        matches.truncate(k.max(1));
        Ok(matches)
    }

    async fn search_entities_by_name(
        &self,
        name: &str,
        _source_config_ids: &[String],
        top_k: usize,
    ) -> StoreResult<Vec<EntityVectorMatch>> {
        let entities = self.entities.lock().unwrap();
        let mut matches: Vec<EntityVectorMatch> = entities
            .iter()
            .filter(|(_, rec)| rec.name.to_lowercase().contains(&name.to_lowercase()))
            .map(|(id, rec)| EntityVectorMatch {
                entity_id: *id,
                name: rec.name.clone(),
                entity_type: rec.entity_type.clone(),
                entity_type_id: rec.entity_type_id,
                similarity: rec.similarity,
                description: None,
            })
            .collect();
        matches.truncate(top_k.max(1));
        Ok(matches)
    }

    async fn get_entity_types(&self, _source_config_ids: &[String]) -> StoreResult<Vec<EntityTypeInfo>> {
        Ok(self.entity_types.lock().unwrap().clone())
    }

    async fn get_events_by_entity_ids(
        &self,
        entity_ids: &[Uuid],
        _source_config_ids: &[String],
    ) -> StoreResult<Vec<EntityEventLink>> {
        let links = self.entity_event_links.lock().unwrap();
        Ok(links
            .iter()
            .filter(|l| entity_ids.contains(&l.entity_id))
            .copied()
            .collect())
    }

    async fn get_entities_by_event_ids(
        &self,
        event_ids: &[Uuid],
        _source_config_ids: &[String],
    ) -> StoreResult<Vec<EntityEventLink>> {
        let links = self.entity_event_links.lock().unwrap();
        Ok(links
            .iter()
            .filter(|l| event_ids.contains(&l.event_id))
            .copied()
            .collect())
    }
}

#[async_trait]
impl EventStore for InMemoryWorld {
    async fn search_events_by_vector(
        &self,
        _query_vec: &[f32],
        _source_config_ids: &[String],
        k: usize,
        _use_content_vector: bool,
    ) -> StoreResult<Vec<EventVectorMatch>> {
        let events = self.events.lock().unwrap();
        let mut matches: Vec<EventVectorMatch> = events
            .iter()
            .map(|(id, rec)| EventVectorMatch {
                event_id: *id,
                similarity: rec.similarity,
                article_id: rec.article_id,
                title: rec.title.clone(),
                content: rec.content.clone(),
                category: rec.category.clone(),
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        matches.truncate(k.max(1));
        Ok(matches)
    }

    async fn batch_get_events(&self, event_ids: &[Uuid]) -> StoreResult<Vec<EventModel>> {
        let events = self.events.lock().unwrap();
        Ok(event_ids
            .iter()
            .filter_map(|id| {
                events.get(id).map(|rec| EventModel {
                    id: *id,
                    source_config_id: "src1".to_string(),
                    article_id: rec.article_id,
                    title: rec.title.clone(),
                    summary: None,
                    content: rec.content.clone(),
                    rank: 0,
                    references: rec.references.clone(),
                    start_time: None,
                    end_time: None,
                    category: rec.category.clone(),
                    extra_data: serde_json::Value::Null,
                })
            })
            .collect())
    }

    async fn batch_get_event_vectors(&self, event_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<f32>>> {
        let events = self.events.lock().unwrap();
        Ok(event_ids
            .iter()
            .filter_map(|id| events.get(id).map(|rec| (*id, pseudo_vector(rec.similarity))))
            .collect())
    }

    async fn batch_get_event_tokens(&self, event_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<String>>> {
        let events = self.events.lock().unwrap();
        Ok(event_ids
            .iter()
            .filter_map(|id| {
                events.get(id).map(|rec| {
                    let tokens = rec
                        .content
                        .split_whitespace()
                        .map(|t| t.to_lowercase())
                        .collect();
                    (*id, tokens)
                })
            })
            .collect())
    }
}

#[async_trait]
impl SectionStore for InMemoryWorld {
    async fn search_sections_by_vector(
        &self,
        _query_vec: &[f32],
        _source_config_ids: &[String],
        k: usize,
        _article_id: Option<Uuid>,
    ) -> StoreResult<Vec<SectionVectorMatch>> {
        let sections = self.sections.lock().unwrap();
        let mut matches: Vec<SectionVectorMatch> = sections
            .iter()
            .map(|(id, rec)| SectionVectorMatch {
                section_id: *id,
                article_id: rec.article_id,
                similarity: rec.similarity,
                heading: rec.heading.clone(),
                content: rec.content.clone(),
                rank: rec.rank,
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        matches.truncate(k.max(1));
        Ok(matches)
    }

    async fn get_sections_by_event_ids(&self, event_ids: &[Uuid]) -> StoreResult<HashMap<Uuid, Vec<Uuid>>> {
        let map = self.event_sections.lock().unwrap();
        Ok(event_ids
            .iter()
            .filter_map(|id| map.get(id).map(|sections| (*id, sections.clone())))
            .collect())
    }
}

/// Embedding oracle that returns the same fixed vector for every input,
/// matching the canonical test query embedding convention above.
pub struct StaticEmbeddingClient {
    vector: Vec<f32>,
}

impl Default for StaticEmbeddingClient {
    fn default() -> Self {
        Self { vector: CANONICAL_QUERY_EMBEDDING.to_vec() }
    }
}

#[async_trait]
impl EmbeddingClient for StaticEmbeddingClient {
    async fn embed(&self, _text: &str) -> LlmResult<Vec<f32>> {
        Ok(self.vector.clone())
    }
}

pub struct FailingEmbeddingClient;

#[async_trait]
impl EmbeddingClient for FailingEmbeddingClient {
    async fn embed(&self, _text: &str) -> LlmResult<Vec<f32>> {
        Err(anyhow::anyhow!("embedding transport unavailable"))
    }
}

pub struct StaticCompletionClient {
    rewrite: Option<String>,
}

impl StaticCompletionClient {
    pub fn rewriting(text: &str) -> Self {
        Self { rewrite: Some(text.to_string()) }
    }
}

#[async_trait]
impl CompletionClient for StaticCompletionClient {
    async fn rewrite_query(&self, _query: &str, _background: Option<&str>) -> LlmResult<Option<String>> {
        Ok(self.rewrite.clone())
    }

    async fn extract_attributes(
        &self,
        _query: &str,
        _allowed_types: &[String],
    ) -> LlmResult<Vec<ExtractedAttributeCandidate>> {
        Ok(Vec::new())
    }
}

pub struct FailingCompletionClient;

#[async_trait]
impl CompletionClient for FailingCompletionClient {
    async fn rewrite_query(&self, _query: &str, _background: Option<&str>) -> LlmResult<Option<String>> {
        Err(anyhow::anyhow!("llm transport unavailable"))
    }

    async fn extract_attributes(
        &self,
        _query: &str,
        _allowed_types: &[String],
    ) -> LlmResult<Vec<ExtractedAttributeCandidate>> {
        Err(anyhow::anyhow!("llm transport unavailable"))
    }
}
