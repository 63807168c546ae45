//! Rerank, PageRank strategy: section-level candidates, scored by PageRank
//! over a co-reference graph, then aggregated back up to events (§4.7).

use std::collections::{HashMap, HashSet};

use kgsearch_models::{DisplayLevel, EndpointType, ReturnType, SearchConfig, Stage, WeightedEntity};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use uuid::Uuid;

use crate::error::{SearchError, SearchResult};
use crate::retry::with_retry;
use crate::stores::{EntityStore, SectionStore};
use crate::tracker::Tracker;
use crate::vector_ops::normalize_similarity;

const DAMPING: f64 = 0.85;
const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-6;

pub struct RerankedEvent {
    pub event_id: Uuid,
    pub score: f32,
}

pub struct RerankOutput {
    pub events: Vec<RerankedEvent>,
}

pub struct RerankPagerank;

impl RerankPagerank {
    pub async fn run(
        config: &SearchConfig,
        tracker: &mut Tracker,
        final_entities: &[WeightedEntity],
        event_references: &HashMap<Uuid, Vec<Uuid>>,
        entity_store: &dyn EntityStore,
        section_store: &dyn SectionStore,
    ) -> SearchResult<RerankOutput> {
        if final_entities.is_empty() {
            return Ok(RerankOutput { events: Vec::new() });
        }

        let entity_ids: Vec<Uuid> = final_entities.iter().map(|e| e.entity_id).collect();
        let weight_by_entity: HashMap<Uuid, (f32, f32)> = final_entities
            .iter()
            .map(|e| (e.entity_id, (e.weight, e.avg_step())))
            .collect();

        let links = with_retry(|| entity_store.get_events_by_entity_ids(&entity_ids, &config.source_config_ids))
            .await
            .map_err(|source| SearchError::StoreTransport { stage: "rerank_pagerank", source })?;

        let mut event_entities: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        for link in &links {
            event_entities.entry(link.event_id).or_default().insert(link.entity_id);
        }

        // §4.7 step 1: SECT_k, sections reachable from final_entities via events.
        // `count(k, s)` (spec §4.7 step 2) is the number of distinct events
        // that bridge entity `k` into section `s`, so the per-entity tally
        // has to be a multiset, not a set.
        let mut key_score: HashMap<Uuid, f32> = HashMap::new();
        let mut section_entities: HashMap<Uuid, HashMap<Uuid, u32>> = HashMap::new();
        for (event_id, entities_in_event) in &event_entities {
            let Some(sections) = event_references.get(event_id) else { continue };
            for section_id in sections {
                let contribution: f32 = entities_in_event
                    .iter()
                    .filter_map(|e| weight_by_entity.get(e).map(|(w, _)| *w))
                    .sum();
                *key_score.entry(*section_id).or_insert(0.0) += contribution;
                let counts = section_entities.entry(*section_id).or_default();
                for entity_id in entities_in_event {
                    *counts.entry(*entity_id).or_insert(0) += 1;
                }
            }
        }

        // §4.7 step 1: SECT_q, sections found by direct query similarity.
        let query_embedding = config.query_embedding.clone().unwrap_or_default();
        let query_sections = with_retry(|| {
            section_store.search_sections_by_vector(
                &query_embedding,
                &config.source_config_ids,
                config.rerank.pagerank_section_top_k,
                None,
            )
        })
        .await
        .unwrap_or_default();
        let mut query_score: HashMap<Uuid, f32> = HashMap::new();
        for m in &query_sections {
            query_score.insert(m.section_id, m.similarity);
        }

        let mut sect: HashSet<Uuid> = key_score.keys().copied().collect();
        sect.extend(query_score.keys().copied());
        if sect.is_empty() {
            return Ok(RerankOutput { events: Vec::new() });
        }

        // §4.7 step 2: initial weight w0(s) = 0.5*query_score(s) +
        // ln(1 + Σ_k weight(k) * ln(1 + count(k, s)) / max(1, avg_step(k))).
        let mut w0: HashMap<Uuid, f32> = HashMap::new();
        for section_id in &sect {
            let q = query_score.get(section_id).copied().unwrap_or(0.0);
            let entity_term: f32 = section_entities
                .get(section_id)
                .into_iter()
                .flatten()
                .filter_map(|(e, count)| weight_by_entity.get(e).map(|(w, avg_step)| (*w, *avg_step, *count)))
                .map(|(weight, avg_step, count)| weight * (1.0 + count as f32).ln() / avg_step.max(1.0))
                .sum();
            let weight = 0.5 * q + (1.0 + entity_term).ln();
            w0.insert(*section_id, weight.max(0.0));
        }

        if sect.len() < 2 {
            return Self::aggregate(config, tracker, &w0, &section_entities, &weight_by_entity, event_references, &sect);
        }

        // §4.7 step 3: graph construction. Edge weight = shared final_entities,
        // each weighted by its recall/expand weight.
        let section_ids: Vec<Uuid> = sect.iter().copied().collect();
        let mut graph: UnGraph<Uuid, f32> = UnGraph::new_undirected();
        let mut index_of: HashMap<Uuid, NodeIndex> = HashMap::new();
        for id in &section_ids {
            index_of.insert(*id, graph.add_node(*id));
        }
        for i in 0..section_ids.len() {
            for j in (i + 1)..section_ids.len() {
                let a = section_ids[i];
                let b = section_ids[j];
                let empty = HashMap::new();
                let ents_a = section_entities.get(&a).unwrap_or(&empty);
                let ents_b = section_entities.get(&b).unwrap_or(&empty);
                let shared: f32 = ents_a
                    .keys()
                    .filter(|e| ents_b.contains_key(*e))
                    .filter_map(|e| weight_by_entity.get(e).map(|(w, _)| *w))
                    .sum();
                if shared > 0.0 {
                    graph.add_edge(index_of[&a], index_of[&b], shared);
                }
            }
        }

        let pr = Self::power_iteration(&graph, &index_of, &w0, &section_ids);

        Self::aggregate(config, tracker, &pr, &section_entities, &weight_by_entity, event_references, &sect)
    }

    fn power_iteration(
        graph: &UnGraph<Uuid, f32>,
        index_of: &HashMap<Uuid, NodeIndex>,
        w0: &HashMap<Uuid, f32>,
        section_ids: &[Uuid],
    ) -> HashMap<Uuid, f32> {
        let n = section_ids.len();
        let total: f64 = w0.values().map(|w| *w as f64).sum();
        let personalization: Vec<f64> = section_ids
            .iter()
            .map(|id| {
                if total > 0.0 {
                    *w0.get(id).unwrap_or(&0.0) as f64 / total
                } else {
                    1.0 / n as f64
                }
            })
            .collect();

        let pos_of: HashMap<NodeIndex, usize> =
            section_ids.iter().enumerate().map(|(i, id)| (index_of[id], i)).collect();

        let mut scores = personalization.clone();
        for _ in 0..MAX_ITERATIONS {
            let mut next = vec![0.0f64; n];
            for (i, id) in section_ids.iter().enumerate() {
                let node = index_of[id];
                let neighbors: Vec<(NodeIndex, f32)> = graph
                    .edges(node)
                    .map(|edge| (edge.target(), *edge.weight()))
                    .collect();
                let out_strength: f64 = neighbors.iter().map(|(_, w)| *w as f64).sum();
                if out_strength > 0.0 {
                    for (target, weight) in &neighbors {
                        let j = pos_of[target];
                        next[j] += DAMPING * scores[i] * (*weight as f64) / out_strength;
                    }
                } else {
                    next[i] += DAMPING * scores[i];
                }
                next[i] += (1.0 - DAMPING) * personalization[i];
            }

            let delta: f64 = next.iter().zip(scores.iter()).map(|(a, b)| (a - b).abs()).sum();
            scores = next;
            if delta < TOLERANCE {
                break;
            }
        }

        section_ids.iter().copied().zip(scores.into_iter().map(|s| s as f32)).collect()
    }

    fn aggregate(
        config: &SearchConfig,
        tracker: &mut Tracker,
        pr: &HashMap<Uuid, f32>,
        section_entities: &HashMap<Uuid, HashMap<Uuid, u32>>,
        weight_by_entity: &HashMap<Uuid, (f32, f32)>,
        event_references: &HashMap<Uuid, Vec<Uuid>>,
        sect: &HashSet<Uuid>,
    ) -> SearchResult<RerankOutput> {
        let mut event_scores: Vec<(Uuid, f32, Vec<Uuid>)> = Vec::new();
        for (event_id, references) in event_references {
            let contributing: Vec<Uuid> = references.iter().filter(|s| sect.contains(s)).copied().collect();
            if contributing.is_empty() {
                continue;
            }
            let score: f32 = contributing.iter().filter_map(|s| pr.get(s)).sum();
            event_scores.push((*event_id, score, contributing));
        }
        event_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        event_scores.truncate(config.rerank.max_results);

        let mut events = Vec::with_capacity(event_scores.len());
        for (event_id, score, contributing_sections) in &event_scores {
            let confidence = normalize_similarity(*score);
            let event_node = tracker.get_or_create_node(
                EndpointType::Event,
                event_id.to_string(),
                String::new(),
                event_id.to_string(),
                None,
            )?;

            let mut bridging: Vec<(Uuid, f32)> = contributing_sections
                .iter()
                .filter_map(|s| section_entities.get(s))
                .flat_map(|counts| counts.keys().copied())
                .collect::<HashSet<_>>()
                .into_iter()
                .filter_map(|e| weight_by_entity.get(&e).map(|(w, _)| (e, *w)))
                .collect();
            bridging.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            bridging.truncate(3);

            for (entity_id, _) in &bridging {
                let entity_node = tracker.get_or_create_node(
                    EndpointType::Entity,
                    entity_id.to_string(),
                    "unknown",
                    entity_id.to_string(),
                    None,
                )?;
                tracker.add_clue(
                    Stage::Rerank,
                    entity_node,
                    event_node.clone(),
                    confidence,
                    "pagerank",
                    serde_json::json!({
                        "pagerank_score": score,
                        "contributing_sections": contributing_sections,
                    }),
                    DisplayLevel::Final,
                );
            }

            if config.return_type == ReturnType::Section {
                for section_id in contributing_sections {
                    let section_node = tracker.get_or_create_node(
                        EndpointType::Section,
                        section_id.to_string(),
                        String::new(),
                        section_id.to_string(),
                        None,
                    )?;
                    tracker.add_clue(
                        Stage::Rerank,
                        event_node.clone(),
                        section_node,
                        confidence,
                        "pagerank",
                        serde_json::json!({ "pagerank_score": pr.get(section_id) }),
                        DisplayLevel::Final,
                    );
                }
            }

            events.push(RerankedEvent { event_id: *event_id, score: *score });
        }

        Ok(RerankOutput { events })
    }
}
