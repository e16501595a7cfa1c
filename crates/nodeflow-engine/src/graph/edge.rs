use serde::{Deserialize, Serialize};

/// A directed connection between two nodes.
///
/// Completion of `source` makes `target` eligible to run, and the outputs of
/// `source` feed the inputs of `target`. Either end may be missing or refer
/// to an unknown node; such edges are ignored where that end is needed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Source node id.
    #[serde(default)]
    pub source: Option<String>,
    /// Target node id.
    #[serde(default)]
    pub target: Option<String>,
}

impl Edge {
    /// Create an edge from `source` to `target`.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: Some(source.into()),
            target: Some(target.into()),
        }
    }

    /// Both endpoints, when both are present and non-empty.
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        let source = self.source.as_deref().filter(|s| !s.is_empty())?;
        let target = self.target.as_deref().filter(|s| !s.is_empty())?;
        Some((source, target))
    }

    /// Whether this edge points at `node_id`.
    pub fn targets(&self, node_id: &str) -> bool {
        self.endpoints().is_some_and(|(_, t)| t == node_id)
    }
}
