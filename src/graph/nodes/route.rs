// Route Node
// Entry point that classifies the question into a knowledge source

use std::sync::OnceLock;

use async_trait::async_trait;
use schemars::generate::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;

use crate::graph::node::{ClassificationError, GraphError, Node, NodeContext, NodeOutput, StageError};
use crate::graph::state::{RouteDecision, WorkflowState};
use crate::llm::{ChatMessage, ChatRequest, StructuredOutput};

const ROUTING_POLICY: &str = "You are an expert at routing user questions to the most relevant data source.

The vectorstore contains specialized documents about:
- AI Agents and their architectures
- Prompt Engineering techniques and best practices
- Adversarial attacks on Large Language Models
- Machine Learning security concepts

Route to 'vectorstore' for questions about these topics.
Route to 'wiki_search' for general knowledge, current events, people, places, or topics outside the vectorstore domain.

Be precise in your routing decisions.";

/// Route a user query to the most relevant datasource.
#[derive(JsonSchema)]
#[allow(dead_code)]
struct RouteQuery {
    /// Given a user question choose to route it to wikipedia or a vectorstore.
    datasource: DataSource,
}

#[derive(JsonSchema)]
#[serde(rename_all = "snake_case")]
#[allow(dead_code)]
enum DataSource {
    Vectorstore,
    WikiSearch,
}

fn route_query_schema() -> &'static Value {
    static SCHEMA: OnceLock<Value> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let schema = SchemaSettings::draft07()
            .with(|s| s.inline_subschemas = true)
            .into_generator()
            .into_root_schema_for::<RouteQuery>();
        let mut value = match serde_json::to_value(&schema) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!("Failed to serialize route schema: {}", e);
                Value::Null
            }
        };
        if let Some(obj) = value.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }
        value
    })
}

/// LLM-backed classifier with a two-value structured output.
#[derive(Debug, Clone, Default)]
pub struct RouteClassifier;

impl RouteClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn request(&self, question: &str, ctx: &NodeContext<'_>) -> ChatRequest {
        ChatRequest::new(vec![
            ChatMessage::system(ROUTING_POLICY),
            ChatMessage::user(question),
        ])
        .with_settings(&ctx.settings.llm)
        .with_structured_output(StructuredOutput {
            name: "RouteQuery".to_string(),
            description: "Route a user query to the most relevant datasource.".to_string(),
            schema: route_query_schema().clone(),
        })
    }

    pub async fn classify(
        &self,
        question: &str,
        ctx: &NodeContext<'_>,
    ) -> Result<RouteDecision, ClassificationError> {
        let request = self.request(question, ctx);
        let raw = ctx
            .bounded(ctx.providers.llm.chat(request))
            .await
            .map_err(ClassificationError::Provider)?;
        parse_route(&raw)
    }
}

/// Validate the classifier output.
///
/// Unknown `datasource` strings fall back to the primary store; anything
/// that is not a JSON object with a string `datasource` is malformed.
pub fn parse_route(raw: &str) -> Result<RouteDecision, ClassificationError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ClassificationError::Malformed(format!("{} in {:?}", e, preview(raw))))?;
    let datasource = value
        .get("datasource")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ClassificationError::Malformed(format!("no string datasource in {:?}", preview(raw)))
        })?;

    match datasource.trim().to_lowercase().as_str() {
        "vectorstore" => Ok(RouteDecision::PrimaryStore),
        "wiki_search" | "wikipedia" => Ok(RouteDecision::SecondarySource),
        other => {
            tracing::warn!(
                "Unknown datasource '{}' from classifier, defaulting to vectorstore",
                other
            );
            Ok(RouteDecision::PrimaryStore)
        }
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (e.g. `json`) on the opening line
    let rest = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

fn preview(raw: &str) -> String {
    raw.chars().take(120).collect()
}

pub struct RouteNode {
    classifier: RouteClassifier,
}

impl RouteNode {
    pub fn new() -> Self {
        Self {
            classifier: RouteClassifier::new(),
        }
    }
}

impl Default for RouteNode {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Node for RouteNode {
    fn id(&self) -> &'static str {
        "route"
    }

    fn name(&self) -> &'static str {
        "Route Classifier"
    }

    async fn execute(
        &self,
        state: &mut WorkflowState,
        ctx: &NodeContext<'_>,
    ) -> Result<NodeOutput, GraphError> {
        let decision = match state.source.forced_route() {
            Some(forced) => {
                tracing::info!(
                    "Route: source={} forced, routing to {}",
                    state.source.as_str(),
                    forced.branch()
                );
                forced
            }
            None => {
                let decision = self
                    .classifier
                    .classify(&state.question, ctx)
                    .await
                    .map_err(|e| GraphError::stage(self.id(), StageError::Classification(e)))?;
                tracing::info!("Route: classifier chose {}", decision.branch());
                decision
            }
        };

        state.route = Some(decision);
        Ok(NodeOutput::Branch(decision.branch().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_labels_and_alias() {
        assert_eq!(
            parse_route(r#"{"datasource": "vectorstore"}"#).unwrap(),
            RouteDecision::PrimaryStore
        );
        assert_eq!(
            parse_route(r#"{"datasource": "wiki_search"}"#).unwrap(),
            RouteDecision::SecondarySource
        );
        assert_eq!(
            parse_route(r#"{"datasource": "Wikipedia"}"#).unwrap(),
            RouteDecision::SecondarySource
        );
    }

    #[test]
    fn out_of_enum_values_default_to_primary() {
        assert_eq!(
            parse_route(r#"{"datasource": "web_search"}"#).unwrap(),
            RouteDecision::PrimaryStore
        );
        assert_eq!(
            parse_route(r#"{"datasource": ""}"#).unwrap(),
            RouteDecision::PrimaryStore
        );
    }

    #[test]
    fn code_fenced_json_is_accepted() {
        let raw = "```json\n{\"datasource\": \"wiki_search\"}\n```";
        assert_eq!(parse_route(raw).unwrap(), RouteDecision::SecondarySource);
        assert_eq!(
            parse_route("```\n{\"datasource\":\"vectorstore\"}```").unwrap(),
            RouteDecision::PrimaryStore
        );
    }

    #[test]
    fn malformed_outputs_are_errors() {
        for raw in [
            "vectorstore",
            "",
            r#"{"source": "vectorstore"}"#,
            r#"{"datasource": 1}"#,
            r#"["vectorstore"]"#,
        ] {
            assert!(
                matches!(parse_route(raw), Err(ClassificationError::Malformed(_))),
                "expected malformed for {:?}",
                raw
            );
        }
    }

    #[test]
    fn schema_restricts_datasource_to_two_values() {
        let schema = route_query_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"], serde_json::json!(["datasource"]));
        assert!(schema.get("$schema").is_none());

        let enum_values = schema["properties"]["datasource"]["enum"]
            .as_array()
            .expect("inlined enum");
        let labels: Vec<&str> = enum_values.iter().filter_map(|v| v.as_str()).collect();
        assert_eq!(labels, vec!["vectorstore", "wiki_search"]);
    }
}
