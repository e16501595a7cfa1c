use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use nodeflow_core::config::{EngineConfig, RevisitPolicy};
use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::event::EventBus;
use nodeflow_core::traits::TaskExecutor;
use nodeflow_core::types::{NodeState, RunId, TaskKind, WorkflowEvent};

use super::builder::{build_graph, find_start_nodes};
use super::edge::Edge;
use super::node::Node;
use super::propagate::pass_data_between_nodes;
use super::traversal::Traversal;

/// Result of executing a single node.
#[derive(Debug, Clone)]
pub struct NodeResult {
    /// Which node was executed.
    pub node_id: String,
    pub kind: TaskKind,
    /// `Completed` or `Failed`.
    pub state: NodeState,
    /// Whether the node succeeded.
    pub succeeded: bool,
    /// The task error, for failed nodes.
    pub error: Option<String>,
    /// Execution time in milliseconds.
    pub elapsed_ms: u64,
}

/// Result of executing an entire workflow.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub run_id: RunId,
    /// The node list, same ids and order as the input, with outputs filled in.
    pub nodes: Vec<Node>,
    /// Per-node results in execution order.
    pub node_results: Vec<NodeResult>,
    /// Whether no start node existed and the first node was used instead.
    pub cycle_fallback: bool,
    /// Total execution time in milliseconds.
    pub total_elapsed_ms: u64,
    /// Whether every executed node succeeded.
    pub succeeded: bool,
}

impl ExecutionResult {
    pub fn failed_nodes(&self) -> impl Iterator<Item = &NodeResult> {
        self.node_results.iter().filter(|r| !r.succeeded)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Executes workflows against a task executor.
///
/// Each run builds a fresh graph, propagates existing outputs across all
/// edges, then walks the graph from its start nodes. A failing node stops
/// only its own subtree; the run itself fails only on malformed input.
pub struct WorkflowEngine {
    executor: Arc<dyn TaskExecutor>,
    event_bus: Arc<EventBus>,
    revisit: RevisitPolicy,
}

impl WorkflowEngine {
    /// Create an engine with the default revisit policy.
    pub fn new(executor: Arc<dyn TaskExecutor>, event_bus: Arc<EventBus>) -> Self {
        Self {
            executor,
            event_bus,
            revisit: RevisitPolicy::default(),
        }
    }

    /// Create an engine from the `[engine]` config section.
    pub fn from_config(
        executor: Arc<dyn TaskExecutor>,
        event_bus: Arc<EventBus>,
        config: &EngineConfig,
    ) -> Self {
        Self::new(executor, event_bus).with_revisit(config.revisit)
    }

    pub fn with_revisit(mut self, revisit: RevisitPolicy) -> Self {
        self.revisit = revisit;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Execute the workflow and return the updated node list.
    pub async fn execute(&self, nodes: Vec<Node>, edges: &[Edge]) -> Result<Vec<Node>> {
        Ok(self.run(nodes, edges).await?.nodes)
    }

    /// Execute the workflow and return the node list plus a per-node report.
    pub async fn run(&self, nodes: Vec<Node>, edges: &[Edge]) -> Result<ExecutionResult> {
        let start = Instant::now();
        let run_id = RunId::new();

        let graph = build_graph(&nodes, edges);
        if let Some(dup) = graph.duplicate_ids().first() {
            return Err(NodeflowError::InvalidWorkflow(format!(
                "duplicate node id '{}'",
                dup
            )));
        }

        info!(run_id = %run_id, nodes = nodes.len(), edges = edges.len(), "Workflow execution started");
        self.event_bus.publish(WorkflowEvent::RunStarted {
            run_id: run_id.clone(),
            node_count: nodes.len(),
            started_at: Utc::now(),
        });

        let mut nodes = pass_data_between_nodes(nodes, edges);

        let mut starts = find_start_nodes(&graph);
        let cycle_fallback = starts.is_empty() && !nodes.is_empty();
        if cycle_fallback {
            warn!(
                run_id = %run_id,
                fallback_node = %nodes[0].id,
                "No start nodes found, workflow may contain cycles"
            );
            self.event_bus.publish(WorkflowEvent::CycleSuspected {
                run_id: run_id.clone(),
                fallback_node: nodes[0].id.clone(),
            });
            starts.push(0);
        }

        let traversal = Traversal {
            graph: &graph,
            edges,
            executor: self.executor.as_ref(),
            event_bus: &self.event_bus,
            run_id: &run_id,
            revisit: self.revisit,
        };
        let node_results = traversal.run(&mut nodes, &starts).await;

        let total_elapsed_ms = start.elapsed().as_millis() as u64;
        let failed = node_results.iter().filter(|r| !r.succeeded).count();

        info!(
            run_id = %run_id,
            executed = node_results.len(),
            failed,
            elapsed_ms = total_elapsed_ms,
            "Workflow execution complete"
        );
        self.event_bus.publish(WorkflowEvent::RunComplete {
            run_id: run_id.clone(),
            executed: node_results.len(),
            failed,
            elapsed_ms: total_elapsed_ms,
        });

        Ok(ExecutionResult {
            run_id,
            nodes,
            succeeded: failed == 0,
            node_results,
            cycle_fallback,
            total_elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_core::types::{SkipReason, Value};
    use nodeflow_test_utils::{ports, MockExecutor};

    fn engine(mock: Arc<MockExecutor>) -> WorkflowEngine {
        WorkflowEngine::new(mock, Arc::new(EventBus::default()))
    }

    fn text_node(id: &str) -> Node {
        Node::new(id, TaskKind::GenerateText).with_input("prompt", id)
    }

    #[tokio::test]
    async fn test_linear_chain_text_to_audio() {
        let mock = Arc::new(MockExecutor::new());
        let nodes = vec![
            Node::new("1", TaskKind::GenerateText).with_input("prompt", "hi"),
            Node::new("2", TaskKind::GenerateAudio).with_input("text", ""),
        ];
        let edges = vec![Edge::new("1", "2")];

        let nodes = engine(mock.clone()).execute(nodes, &edges).await.unwrap();

        let text = nodes[0].output("text").cloned().unwrap();
        assert_eq!(text, Value::from("generated: hi"));
        assert_eq!(nodes[1].input("text"), Some(&text));
        assert!(nodes[1].output("audio").is_some());
        assert_eq!(mock.call_order(), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_depth_first_sibling_order() {
        // a -> b -> d, a -> c: b's subtree finishes before c starts.
        let mock = Arc::new(MockExecutor::new());
        let nodes = vec![text_node("a"), text_node("b"), text_node("c"), text_node("d")];
        let edges = vec![Edge::new("a", "b"), Edge::new("a", "c"), Edge::new("b", "d")];

        engine(mock.clone()).execute(nodes, &edges).await.unwrap();
        assert_eq!(mock.call_order(), vec!["a", "b", "d", "c"]);
    }

    #[tokio::test]
    async fn test_child_waits_for_parent_call() {
        let delay = std::time::Duration::from_millis(25);
        let mock = Arc::new(MockExecutor::new().with_delay(delay));
        let nodes = vec![
            text_node("a"),
            Node::new("b", TaskKind::GenerateImage).with_input("prompt", ""),
        ];
        let edges = vec![Edge::new("a", "b")];

        let started = std::time::Instant::now();
        let result = engine(mock.clone()).run(nodes, &edges).await.unwrap();

        assert!(started.elapsed() >= delay * 2);
        assert!(result.node_results.iter().all(|r| r.elapsed_ms >= 25));
        // b was dispatched with a's finished output, so a's call had resolved.
        let calls = mock.calls();
        assert_eq!(calls[1].node_id, "b");
        assert_eq!(calls[1].inputs["prompt"], Value::from("generated: a"));
    }

    #[tokio::test]
    async fn test_multiple_roots_in_list_order() {
        let mock = Arc::new(MockExecutor::new());
        let nodes = vec![text_node("r1"), text_node("x"), text_node("r2"), text_node("y")];
        let edges = vec![Edge::new("r1", "x"), Edge::new("r2", "y")];

        engine(mock.clone()).execute(nodes, &edges).await.unwrap();
        assert_eq!(mock.call_order(), vec!["r1", "x", "r2", "y"]);
    }

    #[tokio::test]
    async fn test_failure_contained_to_subtree() {
        // Diamond-ish: a -> b, a -> c, b -> d; b fails.
        let mock = Arc::new(MockExecutor::new().fail_node("b"));
        let nodes = vec![text_node("a"), text_node("b"), text_node("c"), text_node("d")];
        let edges = vec![Edge::new("a", "b"), Edge::new("a", "c"), Edge::new("b", "d")];

        let result = engine(mock.clone()).run(nodes, &edges).await.unwrap();

        assert!(!result.succeeded);
        assert_eq!(result.nodes.len(), 4);
        assert!(result.node("b").unwrap().outputs.is_empty());
        assert!(result.node("d").unwrap().outputs.is_empty());
        assert!(result.node("c").unwrap().output("text").is_some());
        assert_eq!(mock.call_count("d"), 0);

        let failed: Vec<&str> = result.failed_nodes().map(|r| r.node_id.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
        let b = &result.node_results[1];
        assert_eq!(b.state, NodeState::Failed);
        assert!(b.error.as_deref().unwrap().contains("mock failure"));
    }

    #[tokio::test]
    async fn test_failed_node_keeps_previous_outputs() {
        let mock = Arc::new(MockExecutor::new().fail_node("a"));
        let nodes = vec![text_node("a").with_output("text", "old")];

        let nodes = engine(mock).execute(nodes, &[]).await.unwrap();
        assert_eq!(nodes[0].output("text"), Some(&Value::from("old")));
    }

    #[tokio::test]
    async fn test_cycle_fallback_terminates() {
        let mock = Arc::new(MockExecutor::new());
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let nodes = vec![text_node("a"), text_node("b")];
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "a")];

        let result = WorkflowEngine::new(mock.clone(), bus)
            .run(nodes, &edges)
            .await
            .unwrap();

        assert!(result.cycle_fallback);
        assert_eq!(mock.call_order(), vec!["a", "b"]);

        let mut saw_warning = false;
        let mut saw_skip = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                WorkflowEvent::CycleSuspected { fallback_node, .. } => {
                    assert_eq!(fallback_node, "a");
                    saw_warning = true;
                }
                WorkflowEvent::NodeSkipped { node_id, reason, .. } => {
                    assert_eq!(node_id, "a");
                    assert_eq!(reason, SkipReason::AlreadyExecuted);
                    saw_skip = true;
                }
                _ => {}
            }
        }
        assert!(saw_warning);
        assert!(saw_skip);
    }

    #[tokio::test]
    async fn test_cycle_fallback_per_path_terminates() {
        let mock = Arc::new(MockExecutor::new());
        let nodes = vec![text_node("a"), text_node("b"), text_node("c")];
        let edges = vec![Edge::new("a", "b"), Edge::new("b", "c"), Edge::new("c", "a")];

        let result = engine(mock.clone())
            .with_revisit(RevisitPolicy::PerPath)
            .run(nodes, &edges)
            .await
            .unwrap();

        assert!(result.cycle_fallback);
        assert_eq!(mock.call_order(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_shared_descendant_runs_once_by_default() {
        // a -> b -> d, a -> c -> d
        let mock = Arc::new(MockExecutor::new());
        let nodes = vec![text_node("a"), text_node("b"), text_node("c"), text_node("d")];
        let edges = vec![
            Edge::new("a", "b"),
            Edge::new("a", "c"),
            Edge::new("b", "d"),
            Edge::new("c", "d"),
        ];

        engine(mock.clone()).execute(nodes, &edges).await.unwrap();
        assert_eq!(mock.call_order(), vec!["a", "b", "d", "c"]);
    }

    #[tokio::test]
    async fn test_shared_descendant_per_path() {
        let mock = Arc::new(MockExecutor::new());
        let nodes = vec![text_node("a"), text_node("b"), text_node("c"), text_node("d")];
        let edges = vec![
            Edge::new("a", "b"),
            Edge::new("a", "c"),
            Edge::new("b", "d"),
            Edge::new("c", "d"),
        ];

        let nodes = engine(mock.clone())
            .with_revisit(RevisitPolicy::PerPath)
            .execute(nodes, &edges)
            .await
            .unwrap();

        assert_eq!(mock.call_order(), vec!["a", "b", "d", "c", "d"]);
        // The second run of d saw c's output last (edge order: b->d, c->d).
        assert_eq!(nodes[3].input("prompt"), Some(&Value::from("generated: c")));
    }

    #[tokio::test]
    async fn test_fresh_outputs_reach_child() {
        let mock = Arc::new(
            MockExecutor::new().respond("a", ports([("text", Value::from("fresh"))])),
        );
        let nodes = vec![
            text_node("a").with_output("text", "stale"),
            Node::new("b", TaskKind::GenerateImage).with_input("prompt", ""),
        ];
        let edges = vec![Edge::new("a", "b")];

        engine(mock.clone()).execute(nodes, &edges).await.unwrap();

        let calls = mock.calls();
        assert_eq!(calls[1].inputs.get("prompt"), Some(&Value::from("fresh")));
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let nodes = vec![
            Node::new("1", TaskKind::GenerateText).with_input("prompt", "hi"),
            Node::new("2", TaskKind::GenerateAudio).with_input("text", ""),
            Node::new("3", TaskKind::TranscribeAudio).with_input("file", ""),
        ];
        let edges = vec![Edge::new("1", "2"), Edge::new("2", "3")];
        let engine = engine(Arc::new(MockExecutor::new()));

        let first = engine.execute(nodes.clone(), &edges).await.unwrap();
        let second = engine.execute(nodes, &edges).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let mock = Arc::new(MockExecutor::new());
        let nodes = vec![text_node("a"), text_node("a")];
        let err = engine(mock.clone()).execute(nodes, &[]).await.unwrap_err();
        assert!(matches!(err, NodeflowError::InvalidWorkflow(_)));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_workflow() {
        let result = engine(Arc::new(MockExecutor::new()))
            .run(Vec::new(), &[])
            .await
            .unwrap();
        assert!(result.nodes.is_empty());
        assert!(result.node_results.is_empty());
        assert!(!result.cycle_fallback);
        assert!(result.succeeded);
    }

    #[tokio::test]
    async fn test_run_events_bracket_execution() {
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let engine = WorkflowEngine::new(Arc::new(MockExecutor::new().fail_node("a")), bus);

        engine.execute(vec![text_node("a")], &[]).await.unwrap();

        let events: Vec<WorkflowEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(matches!(events.first(), Some(WorkflowEvent::RunStarted { node_count: 1, .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, WorkflowEvent::NodeFailed { node_id, .. } if node_id == "a")));
        assert!(matches!(
            events.last(),
            Some(WorkflowEvent::RunComplete { executed: 1, failed: 1, .. })
        ));
    }
}
