//! Workflow execution engine.
//!
//! A workflow is a flat list of task [`Node`]s and directed [`Edge`]s.
//! [`WorkflowEngine`] builds the graph, picks the start nodes, and walks
//! the graph depth-first, copying upstream outputs into downstream inputs
//! before each node's task runs.

pub mod graph;
pub mod workflow;

pub use graph::{
    build_graph, find_start_nodes, pass_data_between_nodes, Edge, ExecutionResult, Graph, Node,
    NodeResult, Position, WorkflowEngine,
};
pub use workflow::Workflow;
