use serde::{Deserialize, Serialize};

use nodeflow_core::types::{Ports, TaskKind, Value};

/// Canvas position. Carried through untouched; the engine never reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A node in the workflow graph.
///
/// `inputs` are written by the editor and by data propagation; `outputs`
/// hold the result of the node's last successful execution.
///
/// Always serialized flat. Deserialization also accepts the canvas shape,
/// where kind, label, inputs and outputs sit under `data` and the kind is
/// named `taskType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawNode")]
pub struct Node {
    /// Unique identifier for this node.
    pub id: String,
    /// Which task this node performs.
    pub task_kind: TaskKind,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub inputs: Ports,
    #[serde(default)]
    pub outputs: Ports,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Node fields as found in a workflow document, in either shape.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    id: String,
    task_kind: Option<TaskKind>,
    label: Option<String>,
    #[serde(default)]
    inputs: Ports,
    #[serde(default)]
    outputs: Ports,
    position: Option<Position>,
    data: Option<CanvasData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanvasData {
    label: Option<String>,
    task_type: Option<TaskKind>,
    #[serde(default)]
    inputs: Ports,
    #[serde(default)]
    outputs: Ports,
}

impl TryFrom<RawNode> for Node {
    type Error = String;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let (data_kind, data_label, data_inputs, data_outputs) = match raw.data {
            Some(d) => (d.task_type, d.label, d.inputs, d.outputs),
            None => (None, None, Ports::new(), Ports::new()),
        };
        let task_kind = raw
            .task_kind
            .or(data_kind)
            .ok_or_else(|| format!("node '{}' has no taskKind or data.taskType", raw.id))?;
        Ok(Self {
            id: raw.id,
            task_kind,
            label: raw.label.or(data_label),
            inputs: if raw.inputs.is_empty() { data_inputs } else { raw.inputs },
            outputs: if raw.outputs.is_empty() { data_outputs } else { raw.outputs },
            position: raw.position,
        })
    }
}

impl Node {
    /// Create a new node with no inputs.
    pub fn new(id: impl Into<String>, task_kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            task_kind,
            label: None,
            inputs: Ports::new(),
            outputs: Ports::new(),
            position: None,
        }
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set one input.
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Set one output, as if left over from an earlier run.
    pub fn with_output(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.outputs.insert(name.into(), value.into());
        self
    }

    /// The label, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_builder() {
        let node = Node::new("n1", TaskKind::GenerateText)
            .with_label("Draft")
            .with_input("prompt", "hi")
            .with_input("maxTokens", 200.0);

        assert_eq!(node.id, "n1");
        assert_eq!(node.display_name(), "Draft");
        assert!(node.has_input("prompt"));
        assert_eq!(node.input("maxTokens").and_then(Value::as_number), Some(200.0));
        assert!(node.outputs.is_empty());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let node = Node::new("n2", TaskKind::ReadImage);
        assert_eq!(node.display_name(), "n2");
    }

    #[test]
    fn test_deserialize_camel_case() {
        let node: Node = serde_json::from_str(
            r#"{
                "id": "1",
                "taskKind": "generateText",
                "inputs": {"prompt": "hi"},
                "position": {"x": 10.0, "y": 20.5}
            }"#,
        )
        .unwrap();
        assert_eq!(node.task_kind, TaskKind::GenerateText);
        assert_eq!(node.input("prompt"), Some(&Value::Text("hi".into())));
        assert!(node.outputs.is_empty());
        assert_eq!(node.position, Some(Position { x: 10.0, y: 20.5 }));

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["taskKind"], "generate-text");
        assert!(json.get("label").is_none());
    }

    #[test]
    fn test_deserialize_canvas_shape() {
        let node: Node = serde_json::from_str(
            r#"{
                "id": "summarizePdf-1",
                "type": "summarizePdf",
                "position": {"x": 40, "y": 80},
                "data": {
                    "label": "Summarise PDF",
                    "taskType": "summarisePdf",
                    "inputs": {"file": null, "maxLength": 500},
                    "outputs": {"summary": "old"}
                }
            }"#,
        )
        .unwrap();
        assert_eq!(node.task_kind, TaskKind::SummarizePdf);
        assert_eq!(node.display_name(), "Summarise PDF");
        assert_eq!(node.input("file"), Some(&Value::Null));
        assert_eq!(node.input("maxLength").and_then(Value::as_number), Some(500.0));
        assert_eq!(node.output("summary"), Some(&Value::from("old")));
        assert_eq!(node.position, Some(Position { x: 40.0, y: 80.0 }));

        // Written back in the flat shape.
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["taskKind"], "summarize-pdf");
        assert!(json.get("data").is_none());
        let reparsed: Node = serde_json::from_value(json).unwrap();
        assert_eq!(reparsed, node);
    }

    #[test]
    fn test_node_without_kind_rejected() {
        let err = serde_json::from_str::<Node>(r#"{"id": "x", "data": {"label": "?"}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("no taskKind"));
    }
}
