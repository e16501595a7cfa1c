//! Test doubles and fixtures shared across the workspace.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;

use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::TaskExecutor;
use nodeflow_core::types::{FileRef, Ports, TaskContext, TaskKind, Value};

/// One call observed by [`MockExecutor`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub node_id: String,
    pub kind: TaskKind,
    pub inputs: Ports,
}

/// Scripted task executor.
///
/// Produces [`default_outputs`] unless a node has a canned response, fails
/// the nodes it was told to fail, and records every call in order.
#[derive(Default)]
pub struct MockExecutor {
    failing: HashSet<String>,
    responses: HashMap<String, Ports>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every execution of `node_id` fail.
    pub fn fail_node(mut self, node_id: impl Into<String>) -> Self {
        self.failing.insert(node_id.into());
        self
    }

    /// Return `outputs` whenever `node_id` executes.
    pub fn respond(mut self, node_id: impl Into<String>, outputs: Ports) -> Self {
        self.responses.insert(node_id.into(), outputs);
        self
    }

    /// Sleep before answering, to make the awaited call observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }

    /// Node ids in the order they were executed.
    pub fn call_order(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.node_id).collect()
    }

    pub fn call_count(&self, node_id: &str) -> usize {
        self.calls().iter().filter(|c| c.node_id == node_id).count()
    }
}

impl TaskExecutor for MockExecutor {
    fn execute(
        &self,
        kind: TaskKind,
        inputs: Ports,
        ctx: TaskContext,
    ) -> BoxFuture<'_, Result<Ports>> {
        Box::pin(async move {
            self.calls
                .lock()
                .expect("mock lock poisoned")
                .push(RecordedCall {
                    node_id: ctx.node_id.clone(),
                    kind,
                    inputs: inputs.clone(),
                });

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.failing.contains(&ctx.node_id) {
                return Err(NodeflowError::TaskExecution {
                    kind,
                    message: format!("mock failure for {}", ctx.node_id),
                });
            }

            Ok(self
                .responses
                .get(&ctx.node_id)
                .cloned()
                .unwrap_or_else(|| default_outputs(kind, &inputs)))
        })
    }
}

/// Deterministic outputs for a task kind, derived from its inputs.
pub fn default_outputs(kind: TaskKind, inputs: &Ports) -> Ports {
    let input = |name: &str| inputs.get(name).map(|v| v.to_string()).unwrap_or_default();
    let mut out = Ports::new();
    match kind {
        TaskKind::GenerateText => {
            out.insert("text".into(), Value::Text(format!("generated: {}", input("prompt"))));
        }
        TaskKind::GenerateImage => {
            out.insert(
                "image".into(),
                Value::File(FileRef::Url(format!("mock://image/{}", input("prompt")))),
            );
        }
        TaskKind::ReadImage => {
            out.insert("text".into(), Value::Text(format!("read: {}", input("file"))));
            out.insert(
                "imageUrl".into(),
                Value::File(FileRef::Url(input("file"))),
            );
        }
        TaskKind::TranscribeAudio => {
            out.insert("text".into(), Value::Text(format!("transcript: {}", input("file"))));
        }
        TaskKind::GenerateAudio => {
            out.insert(
                "audio".into(),
                Value::File(FileRef::Url(format!("mock://audio/{}", input("text")))),
            );
        }
        TaskKind::SummarizePdf => {
            out.insert("summary".into(), Value::Text(format!("summary: {}", input("file"))));
        }
    }
    out
}

/// Build a port map from `(name, value)` pairs.
pub fn ports<const N: usize>(pairs: [(&str, Value); N]) -> Ports {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Write `contents` to a temp file that lives as long as the handle.
pub fn temp_file(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut tmp = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("create temp file");
    tmp.write_all(contents.as_bytes()).expect("write temp file");
    tmp
}
