//! Searcher: the public facade composing Prepare -> Recall -> Expand ->
//! Rerank into the single `search` operation (§4.8).

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::time::Instant;

use kgsearch_models::{QueryInfo, RerankStrategy, SearchConfig, SearchResponse, SearchStats};
use uuid::Uuid;

use crate::error::{SearchError, SearchResult};
use crate::expand::Expand;
use crate::llm::{CompletionClient, EmbeddingClient};
use crate::query_preparer::QueryPreparer;
use crate::recall::Recall;
use crate::rerank_pagerank::RerankPagerank;
use crate::rerank_rrf::RerankRrf;
use crate::retry::with_retry;
use crate::stores::{EntityStore, EventStore, SectionStore};
use crate::tokenizer::Tokenizer;
use crate::tracker::Tracker;

pub struct Searcher;

/// Races `fut` against whatever is left of `deadline`. With no deadline, or
/// a deadline still in the future, `fut` just runs to completion; once the
/// deadline has passed, `stage` names the pipeline stage that was active.
async fn with_deadline<T>(
    deadline: Option<Instant>,
    stage: &'static str,
    fut: impl Future<Output = SearchResult<T>>,
) -> SearchResult<T> {
    let Some(deadline) = deadline else { return fut.await };
    let now = Instant::now();
    if now >= deadline {
        return Err(SearchError::Timeout { stage });
    }
    match tokio::time::timeout(deadline - now, fut).await {
        Ok(result) => result,
        Err(_) => Err(SearchError::Timeout { stage }),
    }
}

impl Searcher {
    #[allow(clippy::too_many_arguments)]
    pub async fn search(
        mut config: SearchConfig,
        deadline: Option<Instant>,
        entity_store: &dyn EntityStore,
        event_store: &dyn EventStore,
        section_store: &dyn SectionStore,
        completion: &dyn CompletionClient,
        embedder: &dyn EmbeddingClient,
        tokenizer: &dyn Tokenizer,
    ) -> SearchResult<SearchResponse> {
        if config.original_query.trim().is_empty() {
            return Err(SearchError::Configuration("query must not be empty".to_string()));
        }
        if config.source_config_ids.is_empty() {
            return Err(SearchError::Configuration("source_config_ids must contain at least one id".to_string()));
        }

        let mut tracker = Tracker::new();
        let mut stats = SearchStats::default();

        with_deadline(
            deadline,
            "prepare",
            QueryPreparer::run(&mut config, &mut tracker, &mut stats.warnings, completion, embedder, entity_store),
        )
        .await?;

        let recall_started = Instant::now();
        let recall_out =
            with_deadline(deadline, "recall", Recall::run(&config, &mut tracker, entity_store, event_store)).await?;
        stats.recall.entities_found = recall_out.entities.len();
        stats.recall.entities_passed = recall_out.entities.len();
        stats.recall.duration_ms = recall_started.elapsed().as_millis() as u64;

        let recall_count = recall_out.entities.len();
        let expand_started = Instant::now();
        let expand_out = with_deadline(
            deadline,
            "expand",
            Expand::run(&config, &mut tracker, recall_out.entities, &mut stats.warnings, entity_store, event_store),
        )
        .await?;
        stats.expand.hops_executed = expand_out.hops_executed;
        stats.expand.entities_discovered = expand_out.entities.len().saturating_sub(recall_count);
        stats.expand.converged = expand_out.converged;
        stats.expand.duration_ms = expand_started.elapsed().as_millis() as u64;

        let rerank_started = Instant::now();
        let ranked_ids: Vec<Uuid> = with_deadline(deadline, "rerank", async {
            match config.rerank.strategy {
                RerankStrategy::Rrf => {
                    let out = RerankRrf::run(
                        &config,
                        &mut tracker,
                        &expand_out.entities,
                        tokenizer,
                        &mut stats.warnings,
                        entity_store,
                        event_store,
                    )
                    .await?;
                    Ok(out.events.into_iter().map(|e| e.event_id).collect())
                }
                RerankStrategy::Pagerank => {
                    let entity_ids: Vec<Uuid> = expand_out.entities.iter().map(|e| e.entity_id).collect();
                    let links = with_retry(|| entity_store.get_events_by_entity_ids(&entity_ids, &config.source_config_ids))
                        .await
                        .map_err(|source| SearchError::StoreTransport { stage: "rerank_pagerank", source })?;
                    let event_ids: Vec<Uuid> =
                        links.iter().map(|l| l.event_id).collect::<HashSet<_>>().into_iter().collect();
                    let event_references =
                        with_retry(|| section_store.get_sections_by_event_ids(&event_ids)).await.unwrap_or_default();

                    let out = RerankPagerank::run(
                        &config,
                        &mut tracker,
                        &expand_out.entities,
                        &event_references,
                        entity_store,
                        section_store,
                    )
                    .await?;
                    Ok(out.events.into_iter().map(|e| e.event_id).collect())
                }
            }
        })
        .await?;
        stats.rerank.strategy = config.rerank.strategy;
        stats.rerank.events_ranked = ranked_ids.len();
        stats.rerank.duration_ms = rerank_started.elapsed().as_millis() as u64;

        let hydrated = with_retry(|| event_store.batch_get_events(&ranked_ids))
            .await
            .map_err(|source| SearchError::StoreTransport { stage: "searcher", source })?;
        let by_id: HashMap<Uuid, _> = hydrated.into_iter().map(|e| (e.id, e)).collect();
        let events = ranked_ids.into_iter().filter_map(|id| by_id.get(&id).cloned()).collect();

        let query_info = QueryInfo {
            original: config.original_query.clone(),
            current: config.query.clone(),
            rewritten: config.query_was_rewritten(),
            embedding_generated: config.query_embedding.is_some(),
        };

        Ok(SearchResponse { events, clues: tracker.into_clues(), stats, query_info })
    }
}
