use thiserror::Error;

use crate::types::TaskKind;

#[derive(Debug, Error)]
pub enum NodeflowError {
    // Provider errors
    #[error("Provider request failed: {0}")]
    ProviderRequest(String),

    #[error("Provider response parse error: {0}")]
    ProviderParse(String),

    #[error("Provider not supported: {0}")]
    UnsupportedProvider(String),

    // Task errors
    #[error("No executor registered for task kind: {0}")]
    UnsupportedTask(TaskKind),

    #[error("Invalid input for {kind}: {message}")]
    TaskInput { kind: TaskKind, message: String },

    #[error("Task failed: {kind}: {message}")]
    TaskExecution { kind: TaskKind, message: String },

    // File errors
    #[error("Failed to load file {reference}: {message}")]
    File { reference: String, message: String },

    // Workflow errors
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl NodeflowError {
    pub fn task_input(kind: TaskKind, message: impl Into<String>) -> Self {
        Self::TaskInput {
            kind,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NodeflowError>;
