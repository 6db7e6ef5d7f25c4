// Generate Node
// Synthesizes the final answer from the context bundle

use async_trait::async_trait;

use crate::core::errors::ProviderError;
use crate::graph::node::{GraphError, Node, NodeContext, NodeOutput, StageError};
use crate::graph::state::WorkflowState;
use crate::llm::{ChatMessage, ChatRequest};
use crate::rag::Passage;

const ANSWER_POLICY: &str = "You are a helpful AI assistant specialized in providing accurate, informative answers.

Use the following retrieved context to answer the user's question.
If the context doesn't contain relevant information, say so and provide general guidance.
Be concise but comprehensive. Use bullet points for clarity when appropriate.

Context:
";

/// Hard cap on passages handed to the model, whatever the configuration says.
pub const MAX_CONTEXT_DOCUMENTS: usize = 5;

/// `Document {i}:\n{content}` blocks for the first `max_documents` passages,
/// never more than [`MAX_CONTEXT_DOCUMENTS`].
pub fn build_context(documents: &[Passage], max_documents: usize) -> String {
    documents
        .iter()
        .take(max_documents.min(MAX_CONTEXT_DOCUMENTS))
        .enumerate()
        .map(|(i, doc)| format!("Document {}:\n{}", i + 1, doc.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn generation_request(question: &str, documents: &[Passage], ctx: &NodeContext<'_>) -> ChatRequest {
    let context = build_context(documents, ctx.settings.workflow.max_context_documents);
    ChatRequest::new(vec![
        ChatMessage::system(format!("{}{}", ANSWER_POLICY, context)),
        ChatMessage::user(question),
    ])
    .with_settings(&ctx.settings.llm)
}

/// Raw provider text; failures propagate.
pub async fn generate(
    question: &str,
    documents: &[Passage],
    ctx: &NodeContext<'_>,
) -> Result<String, ProviderError> {
    let request = generation_request(question, documents, ctx);
    ctx.bounded(ctx.providers.llm.chat(request)).await
}

pub struct GenerateNode;

impl GenerateNode {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GenerateNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for GenerateNode {
    fn id(&self) -> &'static str {
        "generate"
    }

    fn name(&self) -> &'static str {
        "Answer Generation"
    }

    async fn execute(
        &self,
        state: &mut WorkflowState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let answer = generate(&state.question, &state.documents, ctx)
            .await
            .map_err(|e| GraphError::stage(self.id(), StageError::Generation(e)))?;

        tracing::info!(
            "Generate: {} chars from {} passage(s)",
            answer.len(),
            state
                .documents
                .len()
                .min(ctx.settings.workflow.max_context_documents)
                .min(MAX_CONTEXT_DOCUMENTS)
        );
        state.generation = Some(answer);
        Ok(NodeOutput::Final)
    }
}
