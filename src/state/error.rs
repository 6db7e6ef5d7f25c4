use thiserror::Error;

use crate::core::errors::{ApiError, ProviderError};
use crate::graph::GraphError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] ApiError),

    #[error("Failed to initialize knowledge store: {0}")]
    Store(#[source] ProviderError),

    #[error("Failed to build workflow graph: {0}")]
    Graph(#[source] GraphError),
}
