use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::config::LlmSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// JSON schema the model must answer with, sent as a forced function call.
#[derive(Debug, Clone)]
pub struct StructuredOutput {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub structured: Option<StructuredOutput>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
            structured: None,
        }
    }

    pub fn with_settings(mut self, settings: &LlmSettings) -> Self {
        self.temperature = Some(settings.temperature);
        self.max_tokens = settings.max_tokens.or(self.max_tokens);
        self
    }

    pub fn with_structured_output(mut self, structured: StructuredOutput) -> Self {
        self.structured = Some(structured);
        self
    }

    /// Content of the first message with the given role.
    pub fn message(&self, role: &str) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == role)
            .map(|m| m.content.as_str())
    }
}
