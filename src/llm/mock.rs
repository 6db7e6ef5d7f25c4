//! Deterministic LLM used when no API key is configured.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ProviderError;

pub const MOCK_ANSWER: &str = "This is a deterministic mock answer from IMSKOS scaffold.";

fn knowledge_base_topics() -> Option<&'static Regex> {
    static TOPICS: OnceLock<Option<Regex>> = OnceLock::new();
    TOPICS
        .get_or_init(|| {
            Regex::new(
                r"(?i)\b(agents?|agentic|memory|planning|tool use|react|prompt(s|ing)?|chain[- ]of[- ]thought|few[- ]shot|zero[- ]shot|in[- ]context|adversarial|jailbreak(s|ing)?|prompt injection|attacks?|llms?|large language models?|machine learning|ml security|red[- ]teaming)\b",
            )
            .ok()
        })
        .as_ref()
}

#[derive(Debug, Clone, Default)]
pub struct MockLlmProvider;

impl MockLlmProvider {
    pub fn new() -> Self {
        Self
    }

    /// Keyword fallback for the routing decision.
    pub fn route_for(question: &str) -> &'static str {
        if knowledge_base_topics().is_some_and(|topics| topics.is_match(question)) {
            "vectorstore"
        } else {
            "wiki_search"
        }
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, ProviderError> {
        if request.structured.is_some() {
            let question = request.message("user").unwrap_or_default();
            return Ok(json!({ "datasource": Self::route_for(question) }).to_string());
        }
        Ok(MOCK_ANSWER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ChatMessage, StructuredOutput};

    #[test]
    fn routes_knowledge_base_topics_to_vectorstore() {
        assert_eq!(MockLlmProvider::route_for("What are the types of agent memory?"), "vectorstore");
        assert_eq!(MockLlmProvider::route_for("Explain chain of thought prompting"), "vectorstore");
        assert_eq!(MockLlmProvider::route_for("How do adversarial attacks on LLMs work?"), "vectorstore");
        assert_eq!(MockLlmProvider::route_for("Who is Elon Musk?"), "wiki_search");
        assert_eq!(MockLlmProvider::route_for("What is the capital of France?"), "wiki_search");
    }

    #[tokio::test]
    async fn structured_requests_get_route_json() {
        let request = ChatRequest::new(vec![
            ChatMessage::system("route"),
            ChatMessage::user("Tell me about Marie Curie"),
        ])
        .with_structured_output(StructuredOutput {
            name: "RouteQuery".to_string(),
            description: String::new(),
            schema: json!({}),
        });

        let raw = MockLlmProvider::new().chat(request).await.unwrap();
        assert_eq!(raw, r#"{"datasource":"wiki_search"}"#);
    }

    #[tokio::test]
    async fn plain_requests_get_canned_answer() {
        let request = ChatRequest::new(vec![ChatMessage::user("anything")]);
        let answer = MockLlmProvider::new().chat(request).await.unwrap();
        assert_eq!(answer, MOCK_ANSWER);
    }
}
