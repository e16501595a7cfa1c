use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use nodeflow_core::error::{NodeflowError, Result};

use crate::graph::{Edge, Node};

/// A saved workflow document: the node list and edge list as the editor
/// stores them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Workflow {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a workflow from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(NodeflowError::InvalidWorkflow(format!(
                "workflow file not found: {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let workflow = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            nodes = workflow.nodes.len(),
            edges = workflow.edges.len(),
            "Loaded workflow"
        );
        Ok(workflow)
    }

    /// Write the workflow as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_core::types::{TaskKind, Value};

    const SAMPLE: &str = r#"{
        "nodes": [
            {"id": "1", "taskKind": "generateText", "label": "Draft",
             "inputs": {"prompt": "hi", "maxTokens": 200}},
            {"id": "2", "taskKind": "generateAudio", "inputs": {"text": ""}}
        ],
        "edges": [
            {"id": "e1-2", "source": "1", "target": "2"},
            {"id": "broken", "source": "1"}
        ]
    }"#;

    #[test]
    fn test_from_json() {
        let wf = Workflow::from_json(SAMPLE).unwrap();
        assert_eq!(wf.nodes.len(), 2);
        assert_eq!(wf.edges.len(), 2);
        let draft = wf.node("1").unwrap();
        assert_eq!(draft.display_name(), "Draft");
        assert_eq!(draft.input("maxTokens"), Some(&Value::Number(200.0)));
        assert_eq!(wf.node("2").unwrap().task_kind, TaskKind::GenerateAudio);
        assert!(wf.edges[1].endpoints().is_none());
    }

    #[test]
    fn test_null_inputs_load() {
        let wf = Workflow::from_json(
            r#"{"nodes": [{"id": "1", "taskKind": "generateText",
                "inputs": {"prompt": "hi", "maxTokens": null}}]}"#,
        )
        .unwrap();
        let node = wf.node("1").unwrap();
        assert!(node.has_input("maxTokens"));
        assert_eq!(node.input("maxTokens"), Some(&Value::Null));
    }

    #[test]
    fn test_missing_sections_default_empty() {
        let wf = Workflow::from_json("{}").unwrap();
        assert!(wf.nodes.is_empty());
        assert!(wf.edges.is_empty());
    }

    #[test]
    fn test_unknown_task_kind_rejected() {
        let err = Workflow::from_json(r#"{"nodes": [{"id": "1", "taskKind": "dance"}]}"#);
        assert!(matches!(err, Err(NodeflowError::Json(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("wf.json");
        let wf = Workflow::from_json(SAMPLE).unwrap();

        wf.save(&path).unwrap();
        assert_eq!(Workflow::load(&path).unwrap(), wf);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Workflow::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, NodeflowError::InvalidWorkflow(_)));
    }
}
