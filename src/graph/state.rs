// Graph State
// WorkflowState and routing types for the adaptive RAG graph

use serde::{Deserialize, Serialize};

use crate::rag::Passage;

/// Route label reported when classification fails.
pub const ERROR_ROUTE: &str = "error";

/// Which knowledge source answers a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteDecision {
    #[serde(rename = "vectorstore")]
    PrimaryStore,
    #[serde(rename = "wikipedia")]
    SecondarySource,
}

impl RouteDecision {
    /// Label reported in execution results.
    pub fn label(&self) -> &'static str {
        match self {
            RouteDecision::PrimaryStore => "vectorstore",
            RouteDecision::SecondarySource => "wikipedia",
        }
    }

    /// Edge condition leaving the `route` node.
    pub fn branch(&self) -> &'static str {
        match self {
            RouteDecision::PrimaryStore => "vectorstore",
            RouteDecision::SecondarySource => "wiki_search",
        }
    }
}

/// Caller-requested source; anything but `Auto` bypasses the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOverride {
    #[default]
    Auto,
    Primary,
    Secondary,
}

impl SourceOverride {
    /// Accepts the HTTP aliases (`vector`, `vectorstore`, `wikipedia`, `wiki`).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "auto" => Some(SourceOverride::Auto),
            "primary" | "vector" | "vectorstore" => Some(SourceOverride::Primary),
            "secondary" | "wikipedia" | "wiki" => Some(SourceOverride::Secondary),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceOverride::Auto => "auto",
            SourceOverride::Primary => "primary",
            SourceOverride::Secondary => "secondary",
        }
    }

    pub fn forced_route(&self) -> Option<RouteDecision> {
        match self {
            SourceOverride::Auto => None,
            SourceOverride::Primary => Some(RouteDecision::PrimaryStore),
            SourceOverride::Secondary => Some(RouteDecision::SecondarySource),
        }
    }
}

/// State threaded through the graph for one execution.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub question: String,
    pub source: SourceOverride,
    pub top_k: usize,
    /// Set once by the `route` node.
    pub route: Option<RouteDecision>,
    pub documents: Vec<Passage>,
    pub generation: Option<String>,
}

impl WorkflowState {
    pub fn new(question: impl Into<String>, source: SourceOverride, top_k: usize) -> Self {
        Self {
            question: question.into(),
            source,
            top_k,
            route: None,
            documents: Vec::new(),
            generation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_aliases_parse() {
        assert_eq!(SourceOverride::parse("auto"), Some(SourceOverride::Auto));
        assert_eq!(SourceOverride::parse("Vector"), Some(SourceOverride::Primary));
        assert_eq!(SourceOverride::parse("vectorstore"), Some(SourceOverride::Primary));
        assert_eq!(SourceOverride::parse("wiki"), Some(SourceOverride::Secondary));
        assert_eq!(SourceOverride::parse("wikipedia"), Some(SourceOverride::Secondary));
        assert_eq!(SourceOverride::parse("web"), None);
    }

    #[test]
    fn route_labels_and_branches() {
        assert_eq!(RouteDecision::PrimaryStore.label(), "vectorstore");
        assert_eq!(RouteDecision::SecondarySource.label(), "wikipedia");
        assert_eq!(RouteDecision::SecondarySource.branch(), "wiki_search");
        assert_eq!(
            serde_json::to_value(RouteDecision::SecondarySource).unwrap(),
            "wikipedia"
        );
    }
}
