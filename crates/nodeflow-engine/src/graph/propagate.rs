use tracing::trace;

use nodeflow_core::types::{Ports, TaskKind};

use super::builder::{build_graph, Graph};
use super::edge::Edge;
use super::node::Node;

/// Output keys the propagator knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputClass {
    /// `text`, `summary`
    Text,
    /// `image`, `imageUrl`
    Image,
    /// `audio`
    Audio,
}

fn classify(key: &str) -> Option<OutputClass> {
    match key {
        "text" | "summary" => Some(OutputClass::Text),
        "image" | "imageUrl" => Some(OutputClass::Image),
        "audio" => Some(OutputClass::Audio),
        _ => None,
    }
}

/// Which input of `target` receives a value of the given class, if any.
fn destination(class: OutputClass, target: &Node) -> Option<&'static str> {
    match class {
        OutputClass::Text => {
            if target.task_kind == TaskKind::GenerateAudio || target.has_input("text") {
                Some("text")
            } else if target.has_input("prompt") {
                Some("prompt")
            } else {
                None
            }
        }
        OutputClass::Image | OutputClass::Audio => target.has_input("file").then_some("file"),
    }
}

/// Copy recognised outputs of a source node into the inputs of `target`.
///
/// Keys are matched exactly. Unrecognised keys and keys with no matching
/// input on the target are left alone. Never fails.
pub fn propagate(source_outputs: &Ports, target: &mut Node) {
    for (key, value) in source_outputs {
        let Some(class) = classify(key) else {
            continue;
        };
        if let Some(input) = destination(class, target) {
            trace!(target_node = %target.id, output = %key, input, "Propagating value");
            target.inputs.insert(input.to_string(), value.clone());
        }
    }
}

/// Propagate along one edge, by arena index.
fn propagate_edge(nodes: &mut [Node], source: usize, target: usize) {
    if nodes[source].outputs.is_empty() {
        return;
    }
    let outputs = nodes[source].outputs.clone();
    propagate(&outputs, &mut nodes[target]);
}

/// Refresh one node's inputs from every edge that targets it, in edge order.
pub(crate) fn update_node_inputs(nodes: &mut [Node], graph: &Graph, edges: &[Edge], target: usize) {
    let target_id = graph.id(target);
    for (source, _) in edges
        .iter()
        .filter(|e| e.targets(target_id))
        .filter_map(Edge::endpoints)
    {
        if let Some(s) = graph.index_of(source) {
            propagate_edge(nodes, s, target);
        }
    }
}

/// Bulk pass: propagate across every edge, in edge order, without executing
/// anything. Useful to preview what each node will receive.
pub fn pass_data_between_nodes(mut nodes: Vec<Node>, edges: &[Edge]) -> Vec<Node> {
    let graph = build_graph(&nodes, edges);
    for (source, target) in edges.iter().filter_map(Edge::endpoints) {
        if let (Some(s), Some(t)) = (graph.index_of(source), graph.index_of(target)) {
            propagate_edge(&mut nodes, s, t);
        }
    }
    nodes
}
