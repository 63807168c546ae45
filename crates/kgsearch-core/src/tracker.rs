//! Accumulates the clue trail for one `search` call (§4.1).
//!
//! A `Tracker` is created fresh per call and owned by the `Searcher` facade,
//! which threads a `&mut Tracker` through every stage (§3.5). It is never
//! shared across calls and needs no internal locking (§5).

use std::collections::HashMap;

use kgsearch_models::{Clue, DisplayLevel, EndpointNode, EndpointType, Stage};
use uuid::Uuid;

use crate::error::{SearchError, SearchResult};

#[derive(Debug, Default)]
pub struct Tracker {
    clues: Vec<Clue>,
    node_cache: HashMap<(EndpointType, String), EndpointNode>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent in `(node_type, id)`. A second call with the same key but
    /// different `content`/`category` is a programming error (§5).
    pub fn get_or_create_node(
        &mut self,
        node_type: EndpointType,
        id: impl Into<String>,
        category: impl Into<String>,
        content: impl Into<String>,
        description: Option<String>,
    ) -> SearchResult<EndpointNode> {
        let id = id.into();
        let category = category.into();
        let content = content.into();

        self.assert_consistent_node(node_type, &id, &category, &content)?;

        let key = (node_type, id.clone());
        if let Some(existing) = self.node_cache.get(&key) {
            return Ok(existing.clone());
        }

        let node = EndpointNode { id, node_type, category, content, description };
        self.node_cache.insert(key, node.clone());
        Ok(node)
    }

    /// Re-registers an existing `(type, id)` with new content, rejecting
    /// the write if it conflicts with what is already cached (§5).
    pub fn assert_consistent_node(
        &mut self,
        node_type: EndpointType,
        id: &str,
        category: &str,
        content: &str,
    ) -> SearchResult<()> {
        let key = (node_type, id.to_string());
        if let Some(existing) = self.node_cache.get(&key) {
            if existing.content != content || existing.category != category {
                return Err(SearchError::InvariantViolation(format!(
                    "node ({:?}, {}) re-registered with conflicting content",
                    node_type, id
                )));
            }
        }
        Ok(())
    }

    /// Builds (and caches) the query endpoint node. The id is deterministic
    /// per Invariant 2: `uuid5(DNS_NAMESPACE, current_query)`.
    pub fn build_query_node(&mut self, original: &str, current: &str) -> SearchResult<EndpointNode> {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_DNS, current.as_bytes()).to_string();
        let category = if original != current { "rewrite" } else { "origin" };
        self.get_or_create_node(EndpointType::Query, id, category, current.to_string(), None)
    }

    /// Appends a clue in insertion order; the clue id is random per
    /// invocation (Invariant 2).
    pub fn add_clue(
        &mut self,
        stage: Stage,
        from: EndpointNode,
        to: EndpointNode,
        confidence: f32,
        relation: impl Into<String>,
        metadata: serde_json::Value,
        display_level: DisplayLevel,
    ) -> Clue {
        let clue = Clue {
            id: Uuid::new_v4(),
            stage,
            from,
            to,
            confidence: confidence.clamp(0.0, 1.0),
            relation: relation.into(),
            metadata,
            display_level,
        };
        self.clues.push(clue.clone());
        clue
    }

    pub fn clues(&self) -> &[Clue] {
        &self.clues
    }

    pub fn into_clues(self) -> Vec<Clue> {
        self.clues
    }

    pub fn clue_count_for_stage(&self, stage: Stage) -> usize {
        self.clues.iter().filter(|c| c.stage == stage).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_node_is_idempotent() {
        let mut tracker = Tracker::new();
        let first = tracker
            .get_or_create_node(EndpointType::Entity, "ent_1", "topic", "ML", None)
            .unwrap();
        let second = tracker
            .get_or_create_node(EndpointType::Entity, "ent_1", "topic", "ML", None)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(tracker.node_cache.len(), 1);
    }

    #[test]
    fn query_node_id_is_deterministic_across_calls() {
        let mut a = Tracker::new();
        let mut b = Tracker::new();
        let node_a = a.build_query_node("x", "machine learning").unwrap();
        let node_b = b.build_query_node("x", "machine learning").unwrap();
        assert_eq!(node_a.id, node_b.id);
    }

    #[test]
    fn query_node_category_reflects_rewrite() {
        let mut tracker = Tracker::new();
        let rewritten = tracker.build_query_node("ml", "machine learning").unwrap();
        assert_eq!(rewritten.category, "rewrite");

        let mut tracker2 = Tracker::new();
        let origin = tracker2.build_query_node("same", "same").unwrap();
        assert_eq!(origin.category, "origin");
    }

    #[test]
    fn conflicting_node_content_is_rejected() {
        let mut tracker = Tracker::new();
        tracker
            .get_or_create_node(EndpointType::Event, "evt_1", "news", "original content", None)
            .unwrap();
        let result = tracker.assert_consistent_node(EndpointType::Event, "evt_1", "news", "different content");
        assert!(result.is_err());
    }

    #[test]
    fn get_or_create_node_rejects_conflicting_re_registration() {
        let mut tracker = Tracker::new();
        tracker
            .get_or_create_node(EndpointType::Entity, "ent_1", "topic", "ML", None)
            .unwrap();
        let result = tracker.get_or_create_node(EndpointType::Entity, "ent_1", "topic", "Machine Learning", None);
        assert!(matches!(result, Err(SearchError::InvariantViolation(_))));
        assert_eq!(tracker.node_cache.len(), 1);
    }

    #[test]
    fn clue_ids_are_random_but_node_ids_are_stable() {
        let mut tracker = Tracker::new();
        let from = tracker.build_query_node("q", "q").unwrap();
        let to = tracker
            .get_or_create_node(EndpointType::Entity, "ent", "topic", "t", None)
            .unwrap();
        let c1 = tracker.add_clue(
            Stage::Recall,
            from.clone(),
            to.clone(),
            0.9,
            "semantic similarity",
            serde_json::json!({}),
            DisplayLevel::Final,
        );
        let c2 = tracker.add_clue(
            Stage::Recall,
            from,
            to,
            0.9,
            "semantic similarity",
            serde_json::json!({}),
            DisplayLevel::Final,
        );
        assert_ne!(c1.id, c2.id);
        assert_eq!(tracker.clues().len(), 2);
    }
}
