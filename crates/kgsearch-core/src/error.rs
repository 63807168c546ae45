use thiserror::Error;

/// Error taxonomy for the search pipeline (§7): five variants, deliberately
/// coarse so that each stage can decide degrade-vs-fatal with a single `match`.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("store transport error in {stage}: {source}")]
    StoreTransport {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("llm transport error: {0}")]
    LlmTransport(#[source] anyhow::Error),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("search timed out at stage {stage}")]
    Timeout { stage: &'static str },
}

pub type SearchResult<T> = Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_message_includes_detail() {
        let err = SearchError::Configuration("query must not be empty".to_string());
        assert!(err.to_string().contains("query must not be empty"));
    }

    #[test]
    fn timeout_error_carries_the_stage_reached() {
        let err = SearchError::Timeout { stage: "expand" };
        assert!(err.to_string().contains("expand"));
    }
}
