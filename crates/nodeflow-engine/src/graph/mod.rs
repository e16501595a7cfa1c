//! Graph execution: building, propagation, traversal and orchestration.
//!
//! The node list is the arena: the graph refers to nodes by index, the
//! traversal holds indices, and only the run that owns the list writes to
//! `inputs` and `outputs`.

pub mod builder;
pub mod edge;
pub mod executor;
pub mod node;
pub mod propagate;
mod traversal;

pub use builder::{build_graph, find_start_nodes, Graph};
pub use edge::Edge;
pub use executor::{ExecutionResult, NodeResult, WorkflowEngine};
pub use node::{Node, Position};
pub use propagate::{pass_data_between_nodes, propagate};
