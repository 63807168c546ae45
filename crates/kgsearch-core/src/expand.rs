//! Expand: the multi-hop loop that enlarges `recall_entities` into
//! `final_entities` by traversing the entity-event graph, anchored on the
//! original query to resist drift (§4.5).

use std::collections::{HashMap, HashSet};

use kgsearch_models::{DisplayLevel, EndpointType, SearchConfig, Stage, WeightedEntity};
use tracing::warn;
use uuid::Uuid;

use crate::error::SearchResult;
use crate::retry::with_retry;
use crate::stores::{EntityStore, EventStore};
use crate::tracker::Tracker;
use crate::vector_ops::{cosine_similarity, normalize_similarity};

pub struct ExpandOutput {
    pub entities: Vec<WeightedEntity>,
    pub hops_executed: u32,
    pub converged: bool,
}

pub struct Expand;

impl Expand {
    pub async fn run(
        config: &SearchConfig,
        tracker: &mut Tracker,
        recall_entities: Vec<WeightedEntity>,
        warnings: &mut Vec<String>,
        entity_store: &dyn EntityStore,
        event_store: &dyn EventStore,
    ) -> SearchResult<ExpandOutput> {
        if recall_entities.is_empty() {
            return Ok(ExpandOutput { entities: Vec::new(), hops_executed: 0, converged: true });
        }

        if !config.expand.enabled {
            return Ok(ExpandOutput { entities: recall_entities, hops_executed: 0, converged: true });
        }

        let query_embedding = config.query_embedding.clone().unwrap_or_default();
        let max_total = config.recall.max_entities * 2;

        let mut by_id: HashMap<Uuid, WeightedEntity> =
            recall_entities.into_iter().map(|e| (e.entity_id, e)).collect();
        let mut total_weight: f32 = by_id.values().map(|e| e.weight).sum();
        let mut hops_executed = 0u32;
        let mut converged = true;

        for hop in 2..=config.expand.max_hops {
            let current_ids: Vec<Uuid> = by_id.keys().copied().collect();

            let links = match with_retry(|| entity_store.get_events_by_entity_ids(&current_ids, &config.source_config_ids))
                .await
            {
                Ok(links) => links,
                Err(err) => {
                    warn!("expand hop {hop} store failure, stopping at previous hop: {err}");
                    warnings.push(format!("expand degraded at hop {hop}: store transport failure"));
                    converged = false;
                    break;
                }
            };

            let mut event_entities: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
            for link in &links {
                event_entities.entry(link.event_id).or_default().insert(link.entity_id);
            }
            let mut event_ids: Vec<Uuid> = event_entities.keys().copied().collect();
            event_ids.sort();
            // The full reachable pool, before the max_events_per_hop cap:
            // if it's already smaller than min_events_per_hop there are no
            // higher-weight events left anywhere to backfill with, so this
            // hop can't reach the configured floor and expansion stops.
            if event_ids.len() < config.expand.min_events_per_hop {
                converged = true;
                break;
            }
            event_ids.truncate(config.expand.max_events_per_hop);

            let vectors = match with_retry(|| event_store.batch_get_event_vectors(&event_ids)).await {
                Ok(v) => v,
                Err(err) => {
                    warn!("expand hop {hop} vector fetch failure, stopping at previous hop: {err}");
                    warnings.push(format!("expand degraded at hop {hop}: store transport failure"));
                    converged = false;
                    break;
                }
            };

            let mut sim: HashMap<Uuid, f32> = HashMap::new();
            for (event_id, vec) in &vectors {
                let s = normalize_similarity(cosine_similarity(&query_embedding, vec));
                if s >= config.expand.event_similarity_threshold {
                    sim.insert(*event_id, s);
                }
            }

            if sim.is_empty() {
                converged = true;
                break;
            }

            let mut w_jump: HashMap<Uuid, f32> = HashMap::new();
            for (event_id, similarity) in &sim {
                let entities_in_event = event_entities.get(event_id).cloned().unwrap_or_default();
                let key_weight: f32 = entities_in_event
                    .iter()
                    .filter_map(|k| by_id.get(k).map(|e| e.weight))
                    .sum();
                w_jump.insert(*event_id, key_weight * similarity);
            }

            let current_before_hop: HashSet<Uuid> = current_ids.iter().copied().collect();
            let mut w_new: HashMap<Uuid, f32> = HashMap::new();
            // For each newly reachable entity, remember the event and an
            // already-known entity it was bridged through, for clue display.
            let mut bridge: HashMap<Uuid, (Uuid, Uuid, f32)> = HashMap::new();
            for (event_id, entities_in_event) in &event_entities {
                let Some(jump) = w_jump.get(event_id) else { continue };
                let parent_candidate = entities_in_event
                    .iter()
                    .find(|id| current_before_hop.contains(*id))
                    .copied();
                for entity_id in entities_in_event {
                    *w_new.entry(*entity_id).or_insert(0.0) += jump;
                    if current_before_hop.contains(entity_id) {
                        continue;
                    }
                    if let Some(parent) = parent_candidate {
                        let entry = bridge.entry(*entity_id).or_insert((parent, *event_id, *jump));
                        if *jump > entry.2 {
                            *entry = (parent, *event_id, *jump);
                        }
                    }
                }
            }

            let mut newcomers: Vec<(Uuid, f32)> = w_new
                .iter()
                .filter(|(id, _)| !by_id.contains_key(id))
                .map(|(id, w)| (*id, *w))
                .collect();
            newcomers.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            newcomers.truncate(config.expand.entities_per_hop);

            if newcomers.is_empty() && !event_ids.is_empty() {
                for (entity_id, delta) in &w_new {
                    if let Some(existing) = by_id.get_mut(entity_id) {
                        existing.weight += delta;
                        existing.steps.push(hop);
                    }
                }
                hops_executed = hop;
            } else {
                for (entity_id, delta) in &w_new {
                    if let Some(existing) = by_id.get_mut(entity_id) {
                        existing.weight += delta;
                        existing.steps.push(hop);
                    }
                }

                // The entity<->event link tables carry no name/type, only ids
                // (§4.2); entities discovered purely through expansion are
                // identified by id until a later stage resolves them.
                for (entity_id, weight) in &newcomers {
                    if by_id.len() >= max_total {
                        break;
                    }
                    by_id.insert(
                        *entity_id,
                        WeightedEntity {
                            entity_id: *entity_id,
                            name: entity_id.to_string(),
                            entity_type: "unknown".to_string(),
                            weight: *weight,
                            steps: vec![hop],
                        },
                    );
                }
                hops_executed = hop;
            }

            for (entity_id, _) in &newcomers {
                let Some((parent_id, event_id, jump)) = bridge.get(entity_id) else { continue };
                let Some(target) = by_id.get(entity_id) else { continue };
                let parent_meta = by_id.get(parent_id);
                let parent_node = tracker.get_or_create_node(
                    EndpointType::Entity,
                    parent_id.to_string(),
                    parent_meta.map(|e| e.entity_type.clone()).unwrap_or_default(),
                    parent_meta.map(|e| e.name.clone()).unwrap_or_else(|| parent_id.to_string()),
                    None,
                )?;
                let child_node = tracker.get_or_create_node(
                    EndpointType::Entity,
                    target.entity_id.to_string(),
                    target.entity_type.clone(),
                    target.name.clone(),
                    None,
                )?;
                tracker.add_clue(
                    Stage::Expand,
                    parent_node,
                    child_node,
                    normalize_similarity(*jump),
                    format!("hop-{hop} expansion"),
                    serde_json::json!({ "hop": hop, "bridging_event_id": event_id }),
                    DisplayLevel::Intermediate,
                );
            }

            let new_total: f32 = by_id.values().map(|e| e.weight).sum();
            let denom = total_weight.max(1.0);
            let change_ratio = (new_total - total_weight).abs() / denom;
            total_weight = new_total;

            if change_ratio < config.expand.weight_change_threshold {
                converged = true;
                break;
            }
            converged = false;
        }

        if hops_executed == 0 {
            converged = true;
        }

        Ok(ExpandOutput { entities: by_id.into_values().collect(), hops_executed, converged })
    }
}
