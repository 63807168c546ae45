//! Data model for the knowledge-graph search core.
//!
//! Mirrors the split used across the wider platform: persistent records owned
//! by external stores, and per-call runtime records owned exclusively by a
//! single `search` invocation.

pub mod clue;
pub mod config;
pub mod persistent;
pub mod response;
pub mod runtime;

pub use clue::{Clue, DisplayLevel, EndpointNode, EndpointType, Stage};
pub use config::{ExpandConfig, ExtractedAttribute, RecallConfig, RerankConfig, RerankStrategy, ReturnType, SearchConfig};
pub use persistent::{ArticleSection, Entity, EntityLink, EntityType, Event};
pub use response::{ExpandStats, QueryInfo, RecallStats, RerankStats, SearchResponse, SearchStats};
pub use runtime::WeightedEntity;
