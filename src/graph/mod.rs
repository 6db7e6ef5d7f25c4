// IMSKOS Graph Module
// StateGraph runtime and the adaptive RAG workflow built on it

pub mod builder;
pub mod node;
pub mod runtime;
pub mod state;
pub mod workflow;

pub mod nodes;

pub use builder::build_adaptive_rag_graph;
pub use node::{ClassificationError, GraphError, Node, NodeContext, NodeOutput, Providers, StageError};
pub use runtime::GraphRuntime;
pub use state::{RouteDecision, SourceOverride, WorkflowState, ERROR_ROUTE};
pub use workflow::{AdaptiveRagWorkflow, ExecutionRequest, ExecutionResult};
