use std::collections::HashMap;

use super::edge::Edge;
use super::node::Node;

/// Adjacency and in-degree derived from one node list and edge list.
///
/// Index `i` refers to `nodes[i]` of the list the graph was built from.
/// A graph is built fresh for every run and discarded afterwards.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    children: Vec<Vec<usize>>,
    in_degree: Vec<usize>,
    duplicates: Vec<String>,
}

impl Graph {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Arena index of the first node with this id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id(&self, index: usize) -> &str {
        &self.ids[index]
    }

    /// Children of a node, in edge order.
    pub fn children(&self, index: usize) -> &[usize] {
        &self.children[index]
    }

    pub fn in_degree(&self, index: usize) -> usize {
        self.in_degree[index]
    }

    /// Child ids of the node with this id.
    pub fn child_ids(&self, id: &str) -> Option<Vec<&str>> {
        let index = self.index_of(id)?;
        Some(self.children[index].iter().map(|&c| self.id(c)).collect())
    }

    /// In-degree of the node with this id.
    pub fn in_degree_of(&self, id: &str) -> Option<usize> {
        self.index_of(id).map(|i| self.in_degree[i])
    }

    /// Ids that appear more than once in the node list.
    pub fn duplicate_ids(&self) -> &[String] {
        &self.duplicates
    }
}

/// Build adjacency and in-degree counts.
///
/// Every node starts with no children and in-degree 0. For each edge with
/// both ends present, a known target gets its in-degree bumped and, when the
/// source is known too, is appended to the source's children. Unknown ends
/// are skipped.
pub fn build_graph(nodes: &[Node], edges: &[Edge]) -> Graph {
    let mut graph = Graph {
        ids: Vec::with_capacity(nodes.len()),
        index: HashMap::with_capacity(nodes.len()),
        children: vec![Vec::new(); nodes.len()],
        in_degree: vec![0; nodes.len()],
        duplicates: Vec::new(),
    };

    for (i, node) in nodes.iter().enumerate() {
        graph.ids.push(node.id.clone());
        if graph.index.contains_key(&node.id) {
            graph.duplicates.push(node.id.clone());
        } else {
            graph.index.insert(node.id.clone(), i);
        }
    }

    for (source, target) in edges.iter().filter_map(Edge::endpoints) {
        let Some(t) = graph.index_of(target) else {
            continue;
        };
        graph.in_degree[t] += 1;
        if let Some(s) = graph.index_of(source) {
            graph.children[s].push(t);
        }
    }

    graph
}

/// Nodes without incoming edges, in node-list order.
pub fn find_start_nodes(graph: &Graph) -> Vec<usize> {
    (0..graph.len())
        .filter(|&i| graph.in_degree[i] == 0 && graph.index_of(graph.id(i)) == Some(i))
        .collect()
}
