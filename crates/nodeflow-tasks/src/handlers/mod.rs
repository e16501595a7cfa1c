pub mod audio;
pub mod image;
pub mod pdf;
pub mod text;

pub use audio::{GenerateAudioHandler, TranscribeAudioHandler};
pub use image::{GenerateImageHandler, ReadImageHandler};
pub use pdf::SummarizePdfHandler;
pub use text::GenerateTextHandler;

use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::types::{Ports, TaskKind, Value};

/// A required, non-blank text input.
pub(crate) fn required_text<'a>(kind: TaskKind, inputs: &'a Ports, name: &str) -> Result<&'a str> {
    match inputs.get(name) {
        Some(Value::Text(text)) if !text.trim().is_empty() => Ok(text),
        Some(Value::Text(_)) | Some(Value::Null) | None => Err(NodeflowError::task_input(
            kind,
            format!("missing required input '{}'", name),
        )),
        Some(other) => Err(NodeflowError::task_input(
            kind,
            format!("input '{}' must be text, got {}", name, other),
        )),
    }
}

/// An optional text input; blank values count as absent.
pub(crate) fn optional_text<'a>(inputs: &'a Ports, name: &str) -> Option<&'a str> {
    inputs
        .get(name)
        .and_then(Value::as_text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// An optional positive integer input, accepting numbers or numeric text.
pub(crate) fn optional_count(kind: TaskKind, inputs: &Ports, name: &str) -> Result<Option<u32>> {
    let Some(value) = inputs.get(name) else {
        return Ok(None);
    };
    if value.is_blank() {
        return Ok(None);
    }
    match value.as_number() {
        Some(n) if n >= 1.0 && n <= u32::MAX as f64 => Ok(Some(n as u32)),
        _ => Err(NodeflowError::task_input(
            kind,
            format!("input '{}' must be a positive number, got {}", name, value),
        )),
    }
}

pub(crate) fn single(name: &str, value: impl Into<Value>) -> Ports {
    let mut out = Ports::new();
    out.insert(name.to_string(), value.into());
    out
}
