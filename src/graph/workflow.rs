//! Adaptive RAG workflow orchestrator.
//!
//! Runs the route → (retrieve | wiki_search) → generate graph and folds every
//! stage failure into the returned [`ExecutionResult`]; `execute` never errors.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use super::builder::build_adaptive_rag_graph;
use super::node::{GraphError, NodeContext, Providers};
use super::runtime::GraphRuntime;
use super::state::{SourceOverride, WorkflowState, ERROR_ROUTE};
use crate::core::config::Settings;
use crate::rag::Passage;

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub question: String,
    /// Retrieval breadth; `workflow.top_k` when unset.
    pub top_k: Option<usize>,
    pub source: SourceOverride,
}

impl ExecutionRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
            source: SourceOverride::Auto,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_source(mut self, source: SourceOverride) -> Self {
        self.source = source;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub route: String,
    pub documents: Vec<Passage>,
    pub generation: String,
    /// Seconds.
    pub execution_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct AdaptiveRagWorkflow {
    graph: GraphRuntime,
    providers: Providers,
    settings: Arc<Settings>,
}

impl AdaptiveRagWorkflow {
    pub fn new(providers: Providers, settings: Arc<Settings>) -> Result<Self, GraphError> {
        let graph = build_adaptive_rag_graph(settings.workflow.max_steps)?;
        Ok(Self {
            graph,
            providers,
            settings,
        })
    }

    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();
        let top_k = request
            .top_k
            .unwrap_or(self.settings.workflow.top_k)
            .max(1);
        let mut state = WorkflowState::new(request.question, request.source, top_k);
        let ctx = NodeContext::new(&self.providers, &self.settings);

        let outcome = self.graph.run(&mut state, &ctx).await;

        let (route, generation, error) = match outcome {
            Ok(()) => {
                let route = state
                    .route
                    .map(|r| r.label())
                    .unwrap_or(ERROR_ROUTE);
                (route, state.generation.take().unwrap_or_default(), None)
            }
            Err(err) => {
                tracing::error!("Workflow failed: {}", err);
                let detail = match &err.stage {
                    Some(stage) => stage.to_string(),
                    None => err.message.clone(),
                };
                let route = if err.is_classification_failure() {
                    ERROR_ROUTE
                } else {
                    state.route.map(|r| r.label()).unwrap_or(ERROR_ROUTE)
                };
                (route, format!("Error executing query: {}", detail), Some(detail))
            }
        };

        let execution_time = started.elapsed().as_secs_f64();
        tracing::info!(
            "Workflow finished: route={}, documents={}, error={}, {:.3}s",
            route,
            state.documents.len(),
            error.is_some(),
            execution_time
        );

        ExecutionResult {
            route: route.to_string(),
            documents: state.documents,
            generation,
            execution_time,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MOCK_ANSWER;
    use crate::llm::MockLlmProvider;
    use crate::rag::MockRetriever;
    use crate::tools::MockKnowledgeSource;

    fn mock_workflow() -> AdaptiveRagWorkflow {
        let providers = Providers {
            llm: Arc::new(MockLlmProvider::new()),
            retriever: Arc::new(MockRetriever::new()),
            knowledge: Arc::new(MockKnowledgeSource),
        };
        AdaptiveRagWorkflow::new(providers, Arc::new(Settings::default())).unwrap()
    }

    #[tokio::test]
    async fn mock_mode_routes_topic_questions_to_vectorstore() {
        let result = mock_workflow()
            .execute(ExecutionRequest::new("What are the types of agent memory?"))
            .await;

        assert_eq!(result.route, "vectorstore");
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].content, "Example matched text...");
        assert_eq!(result.generation, MOCK_ANSWER);
        assert!(result.error.is_none());
        assert!(result.execution_time >= 0.0);
    }

    #[tokio::test]
    async fn mock_mode_routes_general_questions_to_wikipedia() {
        let result = mock_workflow()
            .execute(ExecutionRequest::new("What is the capital of France?"))
            .await;

        assert_eq!(result.route, "wikipedia");
        assert_eq!(result.documents.len(), 1);
        assert!(result.documents[0].content.starts_with("Page: "));
        assert!(result.error.is_none());
    }

    #[test]
    fn error_field_is_omitted_when_absent() {
        let result = ExecutionResult {
            route: "vectorstore".to_string(),
            documents: Vec::new(),
            generation: "ok".to_string(),
            execution_time: 0.5,
            error: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["execution_time"], 0.5);
    }
}
