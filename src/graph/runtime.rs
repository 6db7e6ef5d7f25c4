// Graph Runtime - petgraph based
// Executes the adaptive RAG state graph from its entry node

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::node::{GraphError, Node, NodeContext, NodeOutput};
use super::state::WorkflowState;

const RUNTIME: &str = "runtime";
const DEFAULT_MAX_STEPS: usize = 10;

/// Edge label: unconditional, or taken when a node branches on the condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeCondition {
    Always,
    OnCondition(String),
}

impl EdgeCondition {
    pub fn on(condition: impl Into<String>) -> Self {
        Self::OnCondition(condition.into())
    }

    pub fn matches(&self, condition: Option<&str>) -> bool {
        match (self, condition) {
            (EdgeCondition::Always, None) => true,
            (EdgeCondition::OnCondition(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// Immutable graph of nodes; build it with [`GraphBuilder`].
pub struct GraphRuntime {
    graph: DiGraph<Box<dyn Node>, EdgeCondition>,
    index: HashMap<&'static str, NodeIndex>,
    entry: NodeIndex,
    max_steps: usize,
}

impl GraphRuntime {
    /// Node ids in sorted order.
    pub fn node_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = self.index.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn node(&self, id: &str) -> Option<&dyn Node> {
        self.index
            .get(id)
            .and_then(|idx| self.graph.node_weight(*idx))
            .map(|node| node.as_ref())
    }

    pub fn has_cycle(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Walk the graph until a node returns `Final`.
    ///
    /// Every error carries the ids of the nodes visited so far, most recent last.
    pub async fn run(
        &self,
        state: &mut WorkflowState,
        ctx: &NodeContext<'_>,
    ) -> Result<(), GraphError> {
        let mut current = self.entry;
        let mut trace: Vec<String> = Vec::new();

        for step in 0..self.max_steps {
            let node = self
                .graph
                .node_weight(current)
                .ok_or_else(|| GraphError::new(RUNTIME, "Node not found in graph"))?;
            trace.push(node.id().to_string());
            tracing::debug!("Executing node: {} (step {})", node.id(), step);

            let condition = match node.execute(state, ctx).await {
                Ok(NodeOutput::Final) => {
                    tracing::debug!("Graph execution complete at node: {}", node.id());
                    return Ok(());
                }
                Ok(NodeOutput::Next) => None,
                Ok(NodeOutput::Branch(condition)) => Some(condition),
                Err(err) => return Err(err.with_trace(trace)),
            };

            current = match self.next_node(current, condition.as_deref()) {
                Ok(next) => next,
                Err(err) => return Err(err.with_trace(trace)),
            };
        }

        Err(GraphError::new(
            RUNTIME,
            format!("Maximum steps ({}) exceeded", self.max_steps),
        )
        .with_trace(trace))
    }

    /// Outgoing edge matching `condition`. An unmatched branch falls back to
    /// the unconditional edge when the node has one.
    fn next_node(&self, from: NodeIndex, condition: Option<&str>) -> Result<NodeIndex, GraphError> {
        let edges: Vec<_> = self
            .graph
            .edges_directed(from, Direction::Outgoing)
            .collect();

        if let Some(edge) = edges.iter().find(|e| e.weight().matches(condition)) {
            return Ok(edge.target());
        }

        let node_id = self.node_id(from);
        if let Some(condition) = condition {
            if let Some(edge) = edges.iter().find(|e| *e.weight() == EdgeCondition::Always) {
                tracing::warn!(
                    "Condition '{}' not matched for node '{}', using default edge",
                    condition,
                    node_id
                );
                return Ok(edge.target());
            }
            return Err(GraphError::new(
                node_id,
                format!("No edge for condition '{}' from node: {}", condition, node_id),
            ));
        }

        Err(GraphError::new(
            node_id,
            format!("No outgoing edge from node: {}", node_id),
        ))
    }

    fn node_id(&self, idx: NodeIndex) -> &'static str {
        self.graph
            .node_weight(idx)
            .map(|node| node.id())
            .unwrap_or("unknown")
    }
}

/// Collects nodes and edges; `build` resolves edge endpoints and the entry.
pub struct GraphBuilder {
    graph: DiGraph<Box<dyn Node>, EdgeCondition>,
    index: HashMap<&'static str, NodeIndex>,
    edges: Vec<(String, String, EdgeCondition)>,
    entry: Option<String>,
    max_steps: usize,
    duplicate: Option<&'static str>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            edges: Vec::new(),
            entry: None,
            max_steps: DEFAULT_MAX_STEPS,
            duplicate: None,
        }
    }

    pub fn entry(mut self, node_id: impl Into<String>) -> Self {
        self.entry = Some(node_id.into());
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn node(mut self, node: Box<dyn Node>) -> Self {
        let id = node.id();
        if self.index.contains_key(id) {
            self.duplicate.get_or_insert(id);
            return self;
        }
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        self
    }

    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push((from.into(), to.into(), EdgeCondition::Always));
        self
    }

    pub fn conditional_edge(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        self.edges
            .push((from.into(), to.into(), EdgeCondition::on(condition)));
        self
    }

    pub fn build(mut self) -> Result<GraphRuntime, GraphError> {
        if let Some(id) = self.duplicate {
            return Err(GraphError::new(id, format!("Duplicate node id: {}", id)));
        }

        for (from, to, condition) in std::mem::take(&mut self.edges) {
            let from_idx = self.lookup(&from)?;
            let to_idx = self.lookup(&to)?;
            self.graph.add_edge(from_idx, to_idx, condition);
        }

        let entry_id = self
            .entry
            .take()
            .ok_or_else(|| GraphError::new(RUNTIME, "No entry node set"))?;
        let entry = self.lookup(&entry_id)?;

        Ok(GraphRuntime {
            graph: self.graph,
            index: self.index,
            entry,
            max_steps: self.max_steps,
        })
    }

    fn lookup(&self, id: &str) -> Result<NodeIndex, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::new(RUNTIME, format!("Node not found: {}", id)))
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::core::config::Settings;
    use crate::graph::node::Providers;
    use crate::graph::state::SourceOverride;
    use crate::llm::MockLlmProvider;
    use crate::rag::{MockRetriever, Passage};
    use crate::tools::MockKnowledgeSource;

    /// Records its id as a passage, then returns a fixed output.
    struct StepNode {
        id: &'static str,
        output: Option<NodeOutput>,
    }

    #[async_trait]
    impl Node for StepNode {
        fn id(&self) -> &'static str {
            self.id
        }

        async fn execute(
            &self,
            state: &mut WorkflowState,
            _ctx: &NodeContext<'_>,
        ) -> Result<NodeOutput, GraphError> {
            state.documents.push(Passage::new(self.id));
            self.output
                .clone()
                .ok_or_else(|| GraphError::new(self.id, "boom"))
        }
    }

    fn step(id: &'static str, output: NodeOutput) -> Box<dyn Node> {
        Box::new(StepNode {
            id,
            output: Some(output),
        })
    }

    fn failing(id: &'static str) -> Box<dyn Node> {
        Box::new(StepNode { id, output: None })
    }

    async fn run(graph: &GraphRuntime) -> (Result<(), GraphError>, Vec<String>) {
        let providers = Providers {
            llm: Arc::new(MockLlmProvider::new()),
            retriever: Arc::new(MockRetriever::new()),
            knowledge: Arc::new(MockKnowledgeSource),
        };
        let settings = Settings::default();
        let ctx = NodeContext::new(&providers, &settings);
        let mut state = WorkflowState::new("q", SourceOverride::Auto, 4);

        let result = graph.run(&mut state, &ctx).await;
        let visited = state.documents.into_iter().map(|p| p.content).collect();
        (result, visited)
    }

    #[test]
    fn edge_condition_matching() {
        assert!(EdgeCondition::Always.matches(None));
        assert!(!EdgeCondition::Always.matches(Some("vectorstore")));

        assert!(EdgeCondition::on("vectorstore").matches(Some("vectorstore")));
        assert!(!EdgeCondition::on("vectorstore").matches(Some("wiki_search")));
        assert!(!EdgeCondition::on("vectorstore").matches(None));
    }

    #[tokio::test]
    async fn branch_follows_matching_condition() {
        let graph = GraphBuilder::new()
            .entry("start")
            .node(step("start", NodeOutput::Branch("right".to_string())))
            .node(step("left", NodeOutput::Final))
            .node(step("right", NodeOutput::Next))
            .node(step("end", NodeOutput::Final))
            .conditional_edge("start", "left", "left")
            .conditional_edge("start", "right", "right")
            .edge("right", "end")
            .build()
            .unwrap();
        assert!(!graph.has_cycle());

        let (result, visited) = run(&graph).await;
        assert!(result.is_ok());
        assert_eq!(visited, vec!["start", "right", "end"]);
    }

    #[tokio::test]
    async fn unmatched_branch_without_default_edge_fails() {
        let graph = GraphBuilder::new()
            .entry("start")
            .node(step("start", NodeOutput::Branch("sideways".to_string())))
            .node(step("left", NodeOutput::Final))
            .conditional_edge("start", "left", "left")
            .build()
            .unwrap();

        let (result, _) = run(&graph).await;
        let err = result.unwrap_err();
        assert_eq!(err.node_id, "start");
        assert!(err.message.contains("sideways"));
        assert_eq!(err.execution_trace, vec!["start"]);
    }

    #[tokio::test]
    async fn node_errors_carry_execution_trace() {
        let graph = GraphBuilder::new()
            .entry("start")
            .node(step("start", NodeOutput::Next))
            .node(failing("broken"))
            .edge("start", "broken")
            .build()
            .unwrap();

        let (result, _) = run(&graph).await;
        let err = result.unwrap_err();
        assert_eq!(err.node_id, "broken");
        assert_eq!(err.execution_trace, vec!["start", "broken"]);
    }

    #[tokio::test]
    async fn step_limit_stops_cycles() {
        let graph = GraphBuilder::new()
            .entry("a")
            .max_steps(3)
            .node(step("a", NodeOutput::Next))
            .node(step("b", NodeOutput::Next))
            .edge("a", "b")
            .edge("b", "a")
            .build()
            .unwrap();
        assert!(graph.has_cycle());

        let (result, visited) = run(&graph).await;
        let err = result.unwrap_err();
        assert!(err.message.contains("Maximum steps (3)"));
        assert_eq!(err.execution_trace, vec!["a", "b", "a"]);
        assert_eq!(visited.len(), 3);
    }

    #[test]
    fn build_rejects_bad_wiring() {
        let missing_target = GraphBuilder::new()
            .entry("a")
            .node(step("a", NodeOutput::Final))
            .edge("a", "missing")
            .build();
        assert!(missing_target.is_err());

        let missing_entry = GraphBuilder::new()
            .node(step("a", NodeOutput::Final))
            .build();
        assert!(missing_entry.is_err());

        let duplicate = GraphBuilder::new()
            .entry("a")
            .node(step("a", NodeOutput::Final))
            .node(step("a", NodeOutput::Next))
            .build();
        assert_eq!(duplicate.err().map(|e| e.node_id), Some("a".to_string()));
    }
}
