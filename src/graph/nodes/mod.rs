// Graph Nodes Module
// Individual node implementations

pub mod generate;
pub mod retrieve;
pub mod route;
pub mod wiki_search;

pub use generate::GenerateNode;
pub use retrieve::RetrieveNode;
pub use route::{RouteClassifier, RouteNode};
pub use wiki_search::WikiSearchNode;
