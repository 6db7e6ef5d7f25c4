// Graph Builder
// Constructs the adaptive RAG graph using petgraph

use super::node::GraphError;
use super::nodes::{GenerateNode, RetrieveNode, RouteNode, WikiSearchNode};
use super::runtime::{GraphBuilder, GraphRuntime};

/// route -> (retrieve | wiki_search) -> generate
pub fn build_adaptive_rag_graph(max_steps: usize) -> Result<GraphRuntime, GraphError> {
    GraphBuilder::new()
        .entry("route")
        .max_steps(max_steps)
        // Entry point
        .node(Box::new(RouteNode::new()))
        // Retrieval paths
        .node(Box::new(RetrieveNode::new()))
        .node(Box::new(WikiSearchNode::new()))
        // Synthesis
        .node(Box::new(GenerateNode::new()))
        // Route edges keyed by the classifier decision
        .conditional_edge("route", "retrieve", "vectorstore")
        .conditional_edge("route", "wiki_search", "wiki_search")
        // Both retrieval paths lead to generation
        .edge("retrieve", "generate")
        .edge("wiki_search", "generate")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_is_acyclic_with_four_nodes() {
        let graph = build_adaptive_rag_graph(10).unwrap();
        assert!(!graph.has_cycle());

        assert_eq!(
            graph.node_ids(),
            vec!["generate", "retrieve", "route", "wiki_search"]
        );
        assert_eq!(graph.node("route").map(|n| n.name()), Some("Route Classifier"));
    }
}
