use std::time::Duration;

use crate::{providers::ProviderError, store::StoreError};

/// Failures of a query. Empty results are not errors.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Bad input, rejected before any external call.
    #[error("{0}")]
    Validation(String),

    #[error("embedding failed: {0}")]
    Embedding(#[source] ProviderError),

    #[error("candidate store failed: {0}")]
    Store(#[from] StoreError),

    #[error("answer generation failed: {0}")]
    Generation(#[source] ProviderError),

    #[error("query timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl QueryError {
    /// True when an external collaborator failed or did not answer in time.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, QueryError::Validation(_))
    }
}
