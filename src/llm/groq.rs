use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::LlmSettings;
use crate::core::errors::ProviderError;

/// Chat completions against Groq or any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct GroqProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl GroqProvider {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            client: Client::new(),
        }
    }

    pub fn from_settings(settings: &LlmSettings, api_key: String) -> Self {
        Self::new(settings.base_url.clone(), api_key, settings.model.clone())
    }

    fn build_body(&self, request: &ChatRequest) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
            if let Some(structured) = &request.structured {
                obj.insert(
                    "tools".to_string(),
                    json!([{
                        "type": "function",
                        "function": {
                            "name": structured.name,
                            "description": structured.description,
                            "parameters": structured.schema,
                        }
                    }]),
                );
                obj.insert(
                    "tool_choice".to_string(),
                    json!({ "type": "function", "function": { "name": structured.name } }),
                );
            }
        }

        body
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_body(&request);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::request(self.name(), e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.name().to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ProviderError::parse(self.name(), e))?;

        extract_completion(&payload, request.structured.is_some())
            .ok_or_else(|| ProviderError::parse(self.name(), "missing choices[0].message"))
    }
}

/// Pull the answer out of a chat completion payload.
///
/// Structured requests read the forced tool call's arguments; models that
/// ignore `tool_choice` and answer in plain content fall through to it.
fn extract_completion(payload: &Value, structured: bool) -> Option<String> {
    let message = payload.get("choices")?.get(0)?.get("message")?;

    if structured {
        let arguments = message
            .get("tool_calls")
            .and_then(|calls| calls.get(0))
            .and_then(|call| call.get("function"))
            .and_then(|function| function.get("arguments"));
        match arguments {
            Some(Value::String(raw)) => return Some(raw.clone()),
            Some(obj @ Value::Object(_)) => return Some(obj.to_string()),
            _ => {}
        }
    }

    message
        .get("content")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
