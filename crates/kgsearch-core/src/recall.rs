//! Recall: the eight-step algorithm that turns a prepared query into a seed
//! set of weighted entities (§4.4).

use std::collections::{HashMap, HashSet};

use kgsearch_models::{DisplayLevel, EndpointType, SearchConfig, Stage, WeightedEntity};
use uuid::Uuid;

use crate::error::{SearchError, SearchResult};
use crate::retry::with_retry;
use crate::stores::{EntityStore, EventStore};
use crate::tracker::Tracker;
use crate::vector_ops::normalize_similarity;

pub struct RecallOutput {
    pub entities: Vec<WeightedEntity>,
}

struct ProbeAttribute {
    name: Option<String>,
    entity_type_filter: Option<String>,
}

pub struct Recall;

impl Recall {
    pub async fn run(
        config: &SearchConfig,
        tracker: &mut Tracker,
        entity_store: &dyn EntityStore,
        event_store: &dyn EventStore,
    ) -> SearchResult<RecallOutput> {
        if !config.recall.enabled {
            return Ok(RecallOutput { entities: Vec::new() });
        }

        let query_embedding = config
            .query_embedding
            .clone()
            .ok_or_else(|| SearchError::Configuration("query embedding missing before recall".to_string()))?;

        let probes = Self::build_probes(config);

        // Step 1 and step 3 both depend only on the cached query embedding,
        // so they (and the per-type threshold lookup) run concurrently
        // rather than as a sequential chain of awaits (§5).
        let type_thresholds_fut = with_retry(|| entity_store.get_entity_types(&config.source_config_ids));
        let event_matches_fut = with_retry(|| {
            event_store.search_events_by_vector(&query_embedding, &config.source_config_ids, config.recall.vector_top_k, true)
        });
        let probe_futs = probes.iter().map(|probe| {
            with_retry(|| {
                entity_store.search_entities_by_vector(
                    &query_embedding,
                    &config.source_config_ids,
                    config.recall.vector_top_k,
                    config.recall.vector_candidates,
                    probe.entity_type_filter.as_deref(),
                )
            })
        });

        let (type_thresholds_result, event_matches_result, probe_results) =
            tokio::join!(type_thresholds_fut, event_matches_fut, futures::future::join_all(probe_futs));

        // Per-type thresholds only ever raise the effective threshold (§3.1).
        let type_thresholds: HashMap<String, f32> = type_thresholds_result
            .map_err(|source| SearchError::StoreTransport { stage: "recall", source })?
            .into_iter()
            .map(|t| (t.entity_type, t.similarity_threshold))
            .collect();
        let event_matches = event_matches_result.map_err(|source| SearchError::StoreTransport { stage: "recall", source })?;

        // Step 1: query -> candidate entities via semantic search.
        let mut best_similarity: HashMap<Uuid, (String, String, f32, Option<String>)> = HashMap::new();
        for (probe, candidates) in probes.iter().zip(probe_results) {
            let candidates = candidates.map_err(|source| SearchError::StoreTransport { stage: "recall", source })?;

            for candidate in candidates {
                let type_threshold = type_thresholds.get(&candidate.entity_type).copied().unwrap_or(0.0);
                let effective_threshold = config.recall.entity_similarity_threshold.max(type_threshold);
                if candidate.similarity < effective_threshold {
                    continue;
                }

                let entry = best_similarity
                    .entry(candidate.entity_id)
                    .or_insert((candidate.name.clone(), candidate.entity_type.clone(), candidate.similarity, probe.name.clone()));
                if candidate.similarity > entry.2 {
                    *entry = (candidate.name, candidate.entity_type, candidate.similarity, probe.name.clone());
                }
            }
        }

        let mut k_q: Vec<(Uuid, String, String, f32)> = best_similarity
            .into_iter()
            .map(|(id, (name, entity_type, similarity, _matched_attribute))| (id, name, entity_type, similarity))
            .collect();
        k_q.sort_by(|a, b| {
            b.3.partial_cmp(&a.3).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0))
        });
        k_q.truncate(config.recall.max_entities);

        if k_q.is_empty() {
            return Ok(RecallOutput { entities: Vec::new() });
        }

        let query_node = tracker.build_query_node(&config.original_query, &config.query)?;
        let mut k1: HashMap<Uuid, f32> = HashMap::new();
        for (entity_id, name, entity_type, similarity) in &k_q {
            k1.insert(*entity_id, *similarity);
            let entity_node = tracker.get_or_create_node(
                EndpointType::Entity,
                entity_id.to_string(),
                entity_type.clone(),
                name.clone(),
                None,
            )?;
            tracker.add_clue(
                Stage::Recall,
                query_node.clone(),
                entity_node,
                normalize_similarity(*similarity),
                "semantic similarity",
                serde_json::json!({ "method": "vector_search" }),
                DisplayLevel::Final,
            );
        }
        let k_q_ids: Vec<Uuid> = k_q.iter().map(|(id, ..)| *id).collect();

        // Step 2: candidate entities -> events via SQL join.
        let links = with_retry(|| entity_store.get_events_by_entity_ids(&k_q_ids, &config.source_config_ids))
            .await
            .map_err(|source| SearchError::StoreTransport { stage: "recall", source })?;

        let mut event_entities: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        for link in &links {
            event_entities.entry(link.event_id).or_default().insert(link.entity_id);
        }
        let e_k: HashSet<Uuid> = event_entities.keys().copied().collect();

        // Step 3's results were already fetched concurrently with step 1, above.
        let mut e1: HashMap<Uuid, f32> = HashMap::new();
        for m in &event_matches {
            if m.similarity >= config.recall.event_similarity_threshold {
                e1.insert(m.event_id, m.similarity);
            }
        }
        let e_q: HashSet<Uuid> = e1.keys().copied().collect();

        // Step 4: event filtering by intersection.
        let e_related: HashSet<Uuid> = e_k.intersection(&e_q).copied().collect();
        let k_related: HashSet<Uuid> = e_related
            .iter()
            .flat_map(|e| event_entities.get(e).cloned().unwrap_or_default())
            .collect();

        if e_related.is_empty() || k_related.is_empty() {
            return Ok(RecallOutput { entities: Vec::new() });
        }

        // Step 5 & 6: event composite weight.
        let mut w_e2: HashMap<Uuid, f32> = HashMap::new();
        for event_id in &e_related {
            let entities_in_event = event_entities.get(event_id).cloned().unwrap_or_default();
            let w_event_key: f32 = entities_in_event
                .intersection(&k_related)
                .filter_map(|k| k1.get(k))
                .sum();
            let e1_score = e1.get(event_id).copied().unwrap_or(0.0);
            w_e2.insert(*event_id, w_event_key * e1_score);
        }

        // Step 7: back-project to entities.
        let mut w_key_event: HashMap<Uuid, f32> = HashMap::new();
        for k in &k_related {
            let total: f32 = e_related
                .iter()
                .filter(|e| event_entities.get(*e).map(|set| set.contains(k)).unwrap_or(false))
                .filter_map(|e| w_e2.get(e))
                .sum();
            w_key_event.insert(*k, total);
        }

        // Step 8: pruning.
        let pruned_ids = Self::prune(&w_key_event, config.recall.final_entity_weight_threshold, config.recall.top_n);

        let mut by_id: HashMap<Uuid, (String, String)> = HashMap::new();
        for (id, name, entity_type, _) in &k_q {
            by_id.insert(*id, (name.clone(), entity_type.clone()));
        }

        let mut entities = Vec::new();
        for id in pruned_ids {
            let weight = w_key_event.get(&id).copied().unwrap_or(0.0);
            if weight <= 0.0 {
                continue;
            }
            let (name, entity_type) = by_id.get(&id).cloned().unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));
            entities.push(WeightedEntity::new_from_recall(id, name, entity_type, weight));
        }

        Ok(RecallOutput { entities })
    }

    fn build_probes(config: &SearchConfig) -> Vec<ProbeAttribute> {
        if config.recall.use_fast_mode || config.extracted_attributes.is_empty() {
            return vec![ProbeAttribute { name: None, entity_type_filter: None }];
        }

        config
            .extracted_attributes
            .iter()
            .map(|a| ProbeAttribute {
                name: Some(a.name.clone()),
                entity_type_filter: Some(a.entity_type.clone()),
            })
            .collect()
    }

    fn prune(
        weights: &HashMap<Uuid, f32>,
        threshold: Option<f32>,
        top_n: Option<usize>,
    ) -> Vec<Uuid> {
        let mut by_threshold: Option<Vec<Uuid>> = threshold.map(|t| {
            weights.iter().filter(|(_, &w)| w >= t).map(|(id, _)| *id).collect()
        });

        let mut by_top_n: Option<Vec<Uuid>> = top_n.map(|n| {
            let mut sorted: Vec<(Uuid, f32)> = weights.iter().map(|(id, w)| (*id, *w)).collect();
            sorted.sort_by(|a, b| {
                b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0))
            });
            sorted.into_iter().take(n).map(|(id, _)| id).collect()
        });

        match (by_threshold.take(), by_top_n.take()) {
            (Some(a), Some(b)) => {
                if a.len() <= b.len() {
                    a
                } else {
                    b
                }
            }
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) => weights.keys().copied().collect(),
        }
    }
}
