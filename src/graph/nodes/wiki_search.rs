// Wiki Search Node
// Secondary-source lookup with graceful degradation

use async_trait::async_trait;
use serde_json::Value;

use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput};
use crate::graph::state::{RouteDecision, WorkflowState};
use crate::rag::Passage;

/// Always a one-passage bundle; failures become a placeholder passage.
pub async fn retrieve_from_secondary(question: &str, ctx: &NodeContext<'_>) -> Vec<Passage> {
    let knowledge = &ctx.providers.knowledge;
    match ctx.bounded(knowledge.lookup(question)).await {
        Ok(summary) => {
            vec![Passage::new(summary).with_metadata("source", Value::from(knowledge.name()))]
        }
        Err(err) => {
            tracing::warn!("{} lookup failed, using placeholder: {}", knowledge.name(), err);
            vec![placeholder_passage(&err.to_string())]
        }
    }
}

pub fn placeholder_passage(detail: &str) -> Passage {
    Passage::new(format!(
        "Wikipedia search returned no results for this query. Error: {}",
        detail
    ))
    .with_metadata("placeholder", Value::Bool(true))
}

pub struct WikiSearchNode;

impl WikiSearchNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WikiSearchNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for WikiSearchNode {
    fn id(&self) -> &'static str {
        "wiki_search"
    }

    fn name(&self) -> &'static str {
        "Wikipedia Search"
    }

    async fn execute(
        &self,
        state: &mut WorkflowState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        state.route = Some(RouteDecision::SecondarySource);
        state.documents = retrieve_from_secondary(&state.question, ctx).await;

        tracing::info!(
            "WikiSearch: {} passage(s), placeholder={}",
            state.documents.len(),
            state
                .documents
                .iter()
                .any(|p| p.metadata.contains_key("placeholder"))
        );
        Ok(NodeOutput::Next)
    }
}
