use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::NodeflowError;

/// Unique identifier of one workflow run.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of tasks a node can perform.
///
/// Serialized in kebab-case. The camelCase names used by older workflow
/// documents are accepted when deserializing.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskKind {
    #[serde(alias = "generateText")]
    GenerateText,
    #[serde(alias = "generateImage")]
    GenerateImage,
    #[serde(alias = "readImage")]
    ReadImage,
    #[serde(alias = "transcribeAudio")]
    TranscribeAudio,
    #[serde(alias = "generateAudio")]
    GenerateAudio,
    #[serde(alias = "summarisePdf", alias = "summarizePdf")]
    SummarizePdf,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        TaskKind::GenerateText,
        TaskKind::GenerateImage,
        TaskKind::ReadImage,
        TaskKind::TranscribeAudio,
        TaskKind::GenerateAudio,
        TaskKind::SummarizePdf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::GenerateText => "generate-text",
            TaskKind::GenerateImage => "generate-image",
            TaskKind::ReadImage => "read-image",
            TaskKind::TranscribeAudio => "transcribe-audio",
            TaskKind::GenerateAudio => "generate-audio",
            TaskKind::SummarizePdf => "summarize-pdf",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = NodeflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate-text" | "generateText" => Ok(TaskKind::GenerateText),
            "generate-image" | "generateImage" => Ok(TaskKind::GenerateImage),
            "read-image" | "readImage" => Ok(TaskKind::ReadImage),
            "transcribe-audio" | "transcribeAudio" => Ok(TaskKind::TranscribeAudio),
            "generate-audio" | "generateAudio" => Ok(TaskKind::GenerateAudio),
            "summarize-pdf" | "summarisePdf" | "summarizePdf" => Ok(TaskKind::SummarizePdf),
            other => Err(NodeflowError::InvalidWorkflow(format!(
                "unknown task kind '{}'",
                other
            ))),
        }
    }
}

/// Reference to binary content (image, audio, PDF).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRef {
    /// An http(s) URL or an inline `data:` URL.
    Url(String),
    /// A file on the local filesystem.
    Path(PathBuf),
}

impl FileRef {
    pub fn is_data_url(&self) -> bool {
        matches!(self, FileRef::Url(u) if u.starts_with("data:"))
    }

    /// Best-effort file name, used for multipart uploads and log lines.
    pub fn file_name(&self) -> String {
        match self {
            FileRef::Path(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "file".to_string()),
            FileRef::Url(u) if u.starts_with("data:") => "inline".to_string(),
            FileRef::Url(u) => u
                .split('?')
                .next()
                .and_then(|s| s.rsplit('/').next())
                .filter(|s| !s.is_empty())
                .unwrap_or("file")
                .to_string(),
        }
    }
}

impl std::fmt::Display for FileRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileRef::Url(u) if u.starts_with("data:") => {
                let header = u.split(',').next().unwrap_or("data:");
                write!(f, "{},...", header)
            }
            FileRef::Url(u) => f.write_str(u),
            FileRef::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

/// A value flowing through node inputs and outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(f64),
    File(FileRef),
    /// Declared by the editor but not yet filled in.
    Null,
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse().ok(),
            Value::File(_) | Value::Null => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileRef> {
        match self {
            Value::File(f) => Some(f),
            _ => None,
        }
    }

    /// Whether this value carries nothing usable (null or an empty string).
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Text(s) => s.trim().is_empty(),
            Value::Null => true,
            Value::Number(_) | Value::File(_) => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<FileRef> for Value {
    fn from(f: FileRef) -> Self {
        Value::File(f)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(s) => f.write_str(s),
            Value::Number(n) => write!(f, "{}", n),
            Value::File(r) => write!(f, "{}", r),
            Value::Null => Ok(()),
        }
    }
}

/// Named values attached to a node, ordered by name.
pub type Ports = BTreeMap<String, Value>;

/// Per-call context handed to a task executor.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub run_id: RunId,
    pub node_id: String,
    pub label: String,
}

/// Lifecycle of a node within one traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    InputsUpdated,
    Executing,
    Completed,
    Failed,
}

/// Why a traversal step did not execute its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The node already ran in this run.
    AlreadyExecuted,
    /// The node is an ancestor on the current path (cycle).
    OnCurrentPath,
}

/// Severity of a notification, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

/// Events emitted during a workflow run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// Workflow run started.
    RunStarted {
        run_id: RunId,
        node_count: usize,
        started_at: DateTime<Utc>,
    },
    /// No node without incoming edges; falling back to the first node.
    CycleSuspected { run_id: RunId, fallback_node: String },
    /// A node's task is about to be invoked.
    NodeStarted {
        run_id: RunId,
        node_id: String,
        kind: TaskKind,
    },
    /// A node's task completed and its outputs were stored.
    NodeCompleted {
        run_id: RunId,
        node_id: String,
        elapsed_ms: u64,
    },
    /// A node's task failed; its subtree will not run.
    NodeFailed {
        run_id: RunId,
        node_id: String,
        label: String,
        error: String,
    },
    /// A traversal step reached a node that was not executed again.
    NodeSkipped {
        run_id: RunId,
        node_id: String,
        reason: SkipReason,
    },
    /// Workflow run finished.
    RunComplete {
        run_id: RunId,
        executed: usize,
        failed: usize,
        elapsed_ms: u64,
    },
}

impl WorkflowEvent {
    pub fn run_id(&self) -> &RunId {
        match self {
            WorkflowEvent::RunStarted { run_id, .. }
            | WorkflowEvent::CycleSuspected { run_id, .. }
            | WorkflowEvent::NodeStarted { run_id, .. }
            | WorkflowEvent::NodeCompleted { run_id, .. }
            | WorkflowEvent::NodeFailed { run_id, .. }
            | WorkflowEvent::NodeSkipped { run_id, .. }
            | WorkflowEvent::RunComplete { run_id, .. } => run_id,
        }
    }

    pub fn level(&self) -> NotificationLevel {
        match self {
            WorkflowEvent::RunStarted { .. }
            | WorkflowEvent::NodeStarted { .. }
            | WorkflowEvent::NodeCompleted { .. }
            | WorkflowEvent::NodeSkipped { .. } => NotificationLevel::Info,
            WorkflowEvent::CycleSuspected { .. } => NotificationLevel::Warning,
            WorkflowEvent::NodeFailed { .. } => NotificationLevel::Error,
            WorkflowEvent::RunComplete { failed, .. } => {
                if *failed == 0 {
                    NotificationLevel::Success
                } else {
                    NotificationLevel::Warning
                }
            }
        }
    }

    /// One-line human-readable message.
    pub fn message(&self) -> String {
        match self {
            WorkflowEvent::RunStarted { node_count, .. } => {
                format!("Executing workflow with {} nodes", node_count)
            }
            WorkflowEvent::CycleSuspected { fallback_node, .. } => format!(
                "Workflow may contain cycles: no start node found, starting from '{}'",
                fallback_node
            ),
            WorkflowEvent::NodeStarted { node_id, kind, .. } => {
                format!("Running {} ({})", node_id, kind)
            }
            WorkflowEvent::NodeCompleted {
                node_id, elapsed_ms, ..
            } => format!("{} completed in {}ms", node_id, elapsed_ms),
            WorkflowEvent::NodeFailed { label, error, .. } => {
                format!("Error in {}: {}", label, error)
            }
            WorkflowEvent::NodeSkipped {
                node_id, reason, ..
            } => match reason {
                SkipReason::AlreadyExecuted => format!("{} already executed, skipping", node_id),
                SkipReason::OnCurrentPath => format!("{} is on the current path, skipping", node_id),
            },
            WorkflowEvent::RunComplete {
                executed, failed, ..
            } => {
                if *failed == 0 {
                    format!("Workflow complete: {} tasks processed", executed)
                } else {
                    format!(
                        "Workflow complete: {} tasks processed, {} failed",
                        executed, failed
                    )
                }
            }
        }
    }
}
