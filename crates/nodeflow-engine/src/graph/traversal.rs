use std::time::Instant;

use tracing::{debug, error, info};

use nodeflow_core::config::RevisitPolicy;
use nodeflow_core::event::EventBus;
use nodeflow_core::traits::TaskExecutor;
use nodeflow_core::types::{NodeState, RunId, SkipReason, TaskContext, WorkflowEvent};

use super::builder::Graph;
use super::edge::Edge;
use super::executor::NodeResult;
use super::node::Node;
use super::propagate::update_node_inputs;

/// One pending visit on the work stack.
#[derive(Debug, Clone, Copy)]
struct Frame {
    node: usize,
    /// Length of the ancestor path leading to this visit.
    depth: usize,
}

/// Depth-first walk over one run's graph.
///
/// Uses an explicit stack. Children are pushed in reverse so they pop in
/// adjacency order, and a child's whole subtree is drained before its next
/// sibling is popped. A failed node pushes no children.
pub(crate) struct Traversal<'a> {
    pub graph: &'a Graph,
    pub edges: &'a [Edge],
    pub executor: &'a dyn TaskExecutor,
    pub event_bus: &'a EventBus,
    pub run_id: &'a RunId,
    pub revisit: RevisitPolicy,
}

impl Traversal<'_> {
    /// Visit every start node in order. Returns per-node results in
    /// execution order.
    pub async fn run(&self, nodes: &mut [Node], starts: &[usize]) -> Vec<NodeResult> {
        let mut results = Vec::new();
        let mut executed = vec![false; nodes.len()];
        let mut path: Vec<usize> = Vec::new();
        let mut stack: Vec<Frame> = starts
            .iter()
            .rev()
            .map(|&node| Frame { node, depth: 0 })
            .collect();

        while let Some(Frame { node, depth }) = stack.pop() {
            path.truncate(depth);

            if let Some(reason) = self.skip_reason(node, &executed, &path) {
                debug!(node_id = %self.graph.id(node), ?reason, "Skipping node");
                self.event_bus.publish(WorkflowEvent::NodeSkipped {
                    run_id: self.run_id.clone(),
                    node_id: self.graph.id(node).to_string(),
                    reason,
                });
                continue;
            }

            let result = self.process(nodes, node).await;
            executed[node] = true;
            let succeeded = result.succeeded;
            results.push(result);

            if !succeeded {
                continue;
            }

            path.push(node);
            for &child in self.graph.children(node).iter().rev() {
                stack.push(Frame {
                    node: child,
                    depth: depth + 1,
                });
            }
        }

        results
    }

    fn skip_reason(&self, node: usize, executed: &[bool], path: &[usize]) -> Option<SkipReason> {
        match self.revisit {
            RevisitPolicy::Once if executed[node] => Some(SkipReason::AlreadyExecuted),
            RevisitPolicy::PerPath if path.contains(&node) => Some(SkipReason::OnCurrentPath),
            _ => None,
        }
    }

    /// Refresh inputs, run the task, store outputs.
    async fn process(&self, nodes: &mut [Node], index: usize) -> NodeResult {
        update_node_inputs(nodes, self.graph, self.edges, index);

        let node = &nodes[index];
        let node_id = node.id.clone();
        let kind = node.task_kind;
        debug!(node_id = %node_id, state = ?NodeState::InputsUpdated, "Inputs updated");

        self.event_bus.publish(WorkflowEvent::NodeStarted {
            run_id: self.run_id.clone(),
            node_id: node_id.clone(),
            kind,
        });
        info!(node_id = %node_id, kind = %kind, "Executing node");

        let ctx = TaskContext {
            run_id: self.run_id.clone(),
            node_id: node_id.clone(),
            label: node.display_name().to_string(),
        };
        let start = Instant::now();
        let result = self.executor.execute(kind, node.inputs.clone(), ctx).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(outputs) => {
                nodes[index].outputs = outputs;
                debug!(node_id = %node_id, elapsed_ms, state = ?NodeState::Completed, "Node execution complete");
                self.event_bus.publish(WorkflowEvent::NodeCompleted {
                    run_id: self.run_id.clone(),
                    node_id: node_id.clone(),
                    elapsed_ms,
                });
                NodeResult {
                    node_id,
                    kind,
                    state: NodeState::Completed,
                    succeeded: true,
                    error: None,
                    elapsed_ms,
                }
            }
            Err(e) => {
                error!(node_id = %node_id, error = %e, "Node execution failed");
                self.event_bus.publish(WorkflowEvent::NodeFailed {
                    run_id: self.run_id.clone(),
                    node_id: node_id.clone(),
                    label: nodes[index].display_name().to_string(),
                    error: e.to_string(),
                });
                NodeResult {
                    node_id,
                    kind,
                    state: NodeState::Failed,
                    succeeded: false,
                    error: Some(e.to_string()),
                    elapsed_ms,
                }
            }
        }
    }
}
