// Node trait and types
// Base abstraction for graph nodes

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::config::Settings;
use crate::core::errors::ProviderError;
use crate::llm::LlmProvider;
use crate::rag::Retriever;
use crate::tools::KnowledgeSource;

use super::state::WorkflowState;

/// External collaborators the nodes call.
#[derive(Clone)]
pub struct Providers {
    pub llm: Arc<dyn LlmProvider>,
    pub retriever: Arc<dyn Retriever>,
    pub knowledge: Arc<dyn KnowledgeSource>,
}

/// Context passed to nodes during execution
pub struct NodeContext<'a> {
    pub providers: &'a Providers,
    pub settings: &'a Settings,
}

impl<'a> NodeContext<'a> {
    pub fn new(providers: &'a Providers, settings: &'a Settings) -> Self {
        Self {
            providers,
            settings,
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.workflow.provider_timeout_secs)
    }

    /// Run a provider call under the configured timeout.
    pub async fn bounded<T, F>(&self, call: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        let limit = self.provider_timeout();
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(limit)),
        }
    }
}

/// What a node asks the runtime to do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutput {
    /// Follow the unconditional edge
    Next,
    /// Follow the edge labelled with this condition
    Branch(String),
    /// Stop; the state holds the result
    Final,
}

#[derive(Debug, Clone, Error)]
pub enum ClassificationError {
    #[error("{0}")]
    Provider(ProviderError),
    #[error("malformed routing output: {0}")]
    Malformed(String),
}

/// Failure of one workflow stage.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    #[error("route classification failed: {0}")]
    Classification(#[from] ClassificationError),
    #[error("vector store retrieval failed: {0}")]
    PrimaryProvider(ProviderError),
    #[error("generation failed: {0}")]
    Generation(ProviderError),
}

/// Graph execution error
///
/// Includes an optional `execution_trace` to record the sequence of node IDs
/// visited before the error occurred, and the stage failure when a node
/// raised one.
#[derive(Debug, Clone)]
pub struct GraphError {
    pub node_id: String,
    pub message: String,
    /// Ordered list of node IDs executed before this error, most-recent last.
    pub execution_trace: Vec<String>,
    pub stage: Option<StageError>,
}

impl GraphError {
    pub fn new(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            message: message.into(),
            execution_trace: Vec::new(),
            stage: None,
        }
    }

    pub fn stage(node_id: impl Into<String>, stage: StageError) -> Self {
        Self {
            node_id: node_id.into(),
            message: stage.to_string(),
            execution_trace: Vec::new(),
            stage: Some(stage),
        }
    }

    pub fn with_trace(mut self, trace: Vec<String>) -> Self {
        self.execution_trace = trace;
        self
    }

    pub fn is_classification_failure(&self) -> bool {
        matches!(self.stage, Some(StageError::Classification(_)))
    }
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.execution_trace.is_empty() {
            write!(f, "GraphError in {}: {}", self.node_id, self.message)
        } else {
            write!(
                f,
                "GraphError in {} (trace: {}): {}",
                self.node_id,
                self.execution_trace.join(" -> "),
                self.message
            )
        }
    }
}

impl std::error::Error for GraphError {}

/// Node trait - all graph nodes implement this
#[async_trait]
pub trait Node: Send + Sync {
    /// Unique identifier for this node
    fn id(&self) -> &'static str;

    /// Human-readable name for display
    fn name(&self) -> &'static str {
        self.id()
    }

    /// Execute the node logic
    async fn execute(
        &self,
        state: &mut WorkflowState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError>;
}
