//! Rerank, RRF strategy: entity-driven candidate events, fused from a dense
//! embedding ranking and a BM25 lexical ranking (§4.6).

use std::collections::{HashMap, HashSet};

use kgsearch_models::{DisplayLevel, EndpointType, SearchConfig, Stage, WeightedEntity};
use tracing::warn;
use uuid::Uuid;

use crate::bm25::Bm25Index;
use crate::error::{SearchError, SearchResult};
use crate::retry::with_retry;
use crate::stores::{EntityStore, EventStore};
use crate::tokenizer::Tokenizer;
use crate::tracker::Tracker;
use crate::vector_ops::{cosine_similarity, normalize_similarity};

pub struct RerankedEvent {
    pub event_id: Uuid,
    pub score: f32,
}

pub struct RerankOutput {
    pub events: Vec<RerankedEvent>,
}

pub struct RerankRrf;

impl RerankRrf {
    pub async fn run(
        config: &SearchConfig,
        tracker: &mut Tracker,
        final_entities: &[WeightedEntity],
        tokenizer: &dyn Tokenizer,
        warnings: &mut Vec<String>,
        entity_store: &dyn EntityStore,
        event_store: &dyn EventStore,
    ) -> SearchResult<RerankOutput> {
        if final_entities.is_empty() {
            return Ok(RerankOutput { events: Vec::new() });
        }

        let entity_ids: Vec<Uuid> = final_entities.iter().map(|e| e.entity_id).collect();
        let links = with_retry(|| entity_store.get_events_by_entity_ids(&entity_ids, &config.source_config_ids))
            .await
            .map_err(|source| SearchError::StoreTransport { stage: "rerank_rrf", source })?;

        let mut event_entities: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        for link in &links {
            event_entities.entry(link.event_id).or_default().insert(link.entity_id);
        }
        let candidate_ids: Vec<Uuid> = event_entities.keys().copied().collect();
        if candidate_ids.is_empty() {
            return Ok(RerankOutput { events: Vec::new() });
        }

        let query_embedding = config.query_embedding.clone().unwrap_or_default();

        let embed_ranks: HashMap<Uuid, (usize, f32)> =
            match with_retry(|| event_store.batch_get_event_vectors(&candidate_ids)).await {
                Ok(vectors) => {
                    let mut scored: Vec<(Uuid, f32)> = vectors
                        .iter()
                        .map(|(id, v)| (*id, normalize_similarity(cosine_similarity(&query_embedding, v))))
                        .filter(|(_, s)| *s >= config.rerank.score_threshold)
                        .collect();
                    scored.sort_by(|a, b| {
                        b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.0.cmp(&b.0))
                    });
                    scored
                        .into_iter()
                        .enumerate()
                        .map(|(i, (id, s))| (id, (i + 1, s)))
                        .collect()
                }
                Err(err) => {
                    warn!("rerank embedding fetch failed, degrading to bm25-only: {err}");
                    warnings.push("rerank embedding fetch failed; degraded to BM25-only".to_string());
                    HashMap::new()
                }
            };

        let bm25_ranks: HashMap<Uuid, (usize, f32)> =
            match with_retry(|| event_store.batch_get_event_tokens(&candidate_ids)).await {
                Ok(tokens) => {
                    let index = Bm25Index::build(&tokens);
                    let query_tokens = tokenizer.tokenize(&config.query);
                    index
                        .rank(&query_tokens)
                        .into_iter()
                        .enumerate()
                        .map(|(i, (id, score))| (id, (i + 1, score)))
                        .collect()
                }
                Err(err) => {
                    warn!("rerank bm25 token fetch failed, degrading to embedding-only: {err}");
                    warnings.push("rerank BM25 token fetch failed; degraded to embedding-only".to_string());
                    HashMap::new()
                }
            };

        let k = config.rerank.rrf_k as f32;
        let mut ranked: Vec<(Uuid, f32, Option<(usize, f32)>, Option<(usize, f32)>)> = Vec::new();

        if embed_ranks.is_empty() && bm25_ranks.is_empty() {
            warnings.push("rerank degraded to entity weight sum; both ranking signals unavailable".to_string());
            let weight_by_entity: HashMap<Uuid, f32> =
                final_entities.iter().map(|e| (e.entity_id, e.weight)).collect();
            let mut scored: Vec<(Uuid, f32)> = event_entities
                .iter()
                .map(|(event_id, entities)| {
                    let score: f32 = entities.iter().filter_map(|e| weight_by_entity.get(e)).sum();
                    (*event_id, score)
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
            scored.truncate(config.rerank.max_results);
            for (event_id, score) in scored {
                ranked.push((event_id, score, None, None));
            }
        } else {
            for event_id in &candidate_ids {
                let embed = embed_ranks.get(event_id).copied();
                let bm25 = bm25_ranks.get(event_id).copied();
                if embed.is_none() && bm25.is_none() {
                    continue;
                }
                let rrf = embed.map(|(r, _)| 1.0 / (k + r as f32)).unwrap_or(0.0)
                    + bm25.map(|(r, _)| 1.0 / (k + r as f32)).unwrap_or(0.0);
                ranked.push((*event_id, rrf, embed, bm25));
            }
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
            ranked.truncate(config.rerank.max_results);
        }

        let mut entities_by_weight = final_entities.to_vec();
        entities_by_weight.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));

        let mut events = Vec::with_capacity(ranked.len());
        for (event_id, score, embed, bm25) in &ranked {
            let confidence = normalize_similarity(*score);
            let bridging: Vec<&WeightedEntity> = entities_by_weight
                .iter()
                .filter(|e| event_entities.get(event_id).map(|set| set.contains(&e.entity_id)).unwrap_or(false))
                .take(3)
                .collect();

            let event_node = tracker.get_or_create_node(
                EndpointType::Event,
                event_id.to_string(),
                String::new(),
                event_id.to_string(),
                None,
            )?;
            for entity in bridging {
                let entity_node = tracker.get_or_create_node(
                    EndpointType::Entity,
                    entity.entity_id.to_string(),
                    entity.entity_type.clone(),
                    entity.name.clone(),
                    None,
                )?;
                tracker.add_clue(
                    Stage::Rerank,
                    entity_node,
                    event_node.clone(),
                    confidence,
                    "rrf fusion",
                    serde_json::json!({
                        "rank_embed": embed.map(|(r, _)| r),
                        "rank_bm25": bm25.map(|(r, _)| r),
                        "embed_score": embed.map(|(_, s)| s),
                        "bm25_score": bm25.map(|(_, s)| s),
                        "rrf_score": score,
                    }),
                    DisplayLevel::Final,
                );
            }

            events.push(RerankedEvent { event_id: *event_id, score: *score });
        }

        Ok(RerankOutput { events })
    }
}
