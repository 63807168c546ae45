//! Optional query rewrite and attribute extraction (§4.3).

use kgsearch_models::{DisplayLevel, EndpointType, ExtractedAttribute, SearchConfig, Stage};
use tracing::warn;

use crate::error::{SearchError, SearchResult};
use crate::llm::{CompletionClient, EmbeddingClient};
use crate::retry::with_retry;
use crate::stores::EntityStore;
use crate::tracker::Tracker;

pub struct QueryPreparer;

impl QueryPreparer {
    pub async fn run(
        config: &mut SearchConfig,
        tracker: &mut Tracker,
        warnings: &mut Vec<String>,
        completion: &dyn CompletionClient,
        embedder: &dyn EmbeddingClient,
        entity_store: &dyn EntityStore,
    ) -> SearchResult<()> {
        let original_query = config.original_query.clone();

        if config.enable_query_rewrite {
            match completion.rewrite_query(&original_query, config.background.as_deref()).await {
                Ok(Some(rewritten)) if !rewritten.trim().is_empty() => {
                    config.query = rewritten;
                }
                Ok(_) => {
                    config.query = original_query.clone();
                }
                Err(err) => {
                    warn!("query rewrite failed, falling back to original query: {err}");
                    warnings.push("query rewrite failed; using original query".to_string());
                    config.query = original_query.clone();
                }
            }
        } else {
            config.query = original_query.clone();
        }

        if config.query_was_rewritten() {
            let from = tracker.build_query_node(&original_query, &original_query)?;
            let to = tracker.build_query_node(&original_query, &config.query)?;
            tracker.add_clue(
                Stage::Prepare,
                from,
                to,
                1.0,
                "query rewrite",
                serde_json::json!({}),
                DisplayLevel::Final,
            );
        }

        match embedder.embed(&config.query).await {
            Ok(vector) => {
                config.query_embedding = Some(vector);
            }
            Err(err) => {
                warn!("query embedding failed, downgrading to fast mode: {err}");
                warnings.push("query embedding failed; downgraded to fast mode".to_string());
                config.query_embedding = None;
                config.recall.use_fast_mode = true;
                return Ok(());
            }
        }

        if !config.recall.use_fast_mode {
            let allowed_types: Vec<String> = with_retry(|| entity_store.get_entity_types(&config.source_config_ids))
                .await
                .map(|types| types.into_iter().map(|t| t.entity_type).collect())
                .unwrap_or_default();

            match completion.extract_attributes(&config.query, &allowed_types).await {
                Ok(candidates) if !candidates.is_empty() => {
                    let query_node = tracker.build_query_node(&original_query, &config.query)?;
                    for candidate in candidates {
                        let weight = candidate.weight.unwrap_or(1.0);
                        let candidate_id =
                            format!("candidate:{}:{}", candidate.entity_type, candidate.name);
                        let candidate_node = tracker.get_or_create_node(
                            EndpointType::Entity,
                            candidate_id,
                            candidate.entity_type.clone(),
                            candidate.name.clone(),
                            None,
                        )?;
                        tracker.add_clue(
                            Stage::Prepare,
                            query_node.clone(),
                            candidate_node,
                            1.0,
                            "attribute extraction",
                            serde_json::json!({}),
                            DisplayLevel::Intermediate,
                        );
                        config.extracted_attributes.push(ExtractedAttribute {
                            name: candidate.name,
                            entity_type: candidate.entity_type,
                            weight,
                        });
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("attribute extraction failed, degrading to fast mode: {err}");
                    warnings.push("attribute extraction failed; degrading to fast mode".to_string());
                }
            }
        }

        Ok(())
    }
}
