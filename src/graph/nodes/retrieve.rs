// Retrieve Node
// Primary-store retrieval

use async_trait::async_trait;

use crate::core::errors::ProviderError;
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput, StageError};
use crate::graph::state::{RouteDecision, WorkflowState};
use crate::rag::Passage;

/// Top-k passages from the primary store, in provider order.
pub async fn retrieve_from_primary(
    question: &str,
    k: usize,
    ctx: &NodeContext<'_>,
) -> Result<Vec<Passage>, ProviderError> {
    ctx.bounded(ctx.providers.retriever.retrieve(question, k))
        .await
}

pub struct RetrieveNode;

impl RetrieveNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RetrieveNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for RetrieveNode {
    fn id(&self) -> &'static str {
        "retrieve"
    }

    fn name(&self) -> &'static str {
        "Vector Store Retrieval"
    }

    async fn execute(
        &self,
        state: &mut WorkflowState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.route = Some(RouteDecision::PrimaryStore);

        let documents = retrieve_from_primary(&state.question, state.top_k, ctx)
            .await
            .map_err(|e| GraphError::stage(self.id(), StageError::PrimaryProvider(e)))?;

        tracing::info!(
            "Retrieve: {} returned {} passages (k={})",
            ctx.providers.retriever.name(),
            documents.len(),
            state.top_k
        );
        state.documents = documents;
        Ok(NodeOutput::Next)
    }
}
