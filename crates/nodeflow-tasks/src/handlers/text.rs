use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use nodeflow_core::config::TextTaskConfig;
use nodeflow_core::error::Result;
use nodeflow_core::traits::TaskHandler;
use nodeflow_core::types::{Ports, TaskContext, TaskKind};

use super::{optional_count, required_text, single};
use crate::client::{ChatMessage, ChatRequest, ProviderClient};

/// `generate-text`: one chat completion over `inputs.prompt`.
pub struct GenerateTextHandler {
    client: Arc<ProviderClient>,
    config: TextTaskConfig,
}

impl GenerateTextHandler {
    pub fn new(client: Arc<ProviderClient>, config: TextTaskConfig) -> Self {
        Self { client, config }
    }

    fn request(&self, inputs: &Ports) -> Result<ChatRequest> {
        let kind = TaskKind::GenerateText;
        let prompt = required_text(kind, inputs, "prompt")?;
        let max_tokens = optional_count(kind, inputs, "maxTokens")?.unwrap_or(self.config.max_tokens);
        Ok(ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens,
            temperature: None,
        })
    }
}

impl TaskHandler for GenerateTextHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::GenerateText
    }

    fn execute(&self, inputs: Ports, ctx: TaskContext) -> BoxFuture<'_, Result<Ports>> {
        Box::pin(async move {
            let request = self.request(&inputs)?;
            let text = self.client.chat(&request).await?;
            info!(node_id = %ctx.node_id, chars = text.len(), "Text generated");
            Ok(single("text", text))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodeflow_core::config::ProviderConfig;
    use nodeflow_core::error::NodeflowError;
    use nodeflow_core::types::{RunId, Value};
    use nodeflow_test_utils::ports;

    fn handler() -> GenerateTextHandler {
        let client = ProviderClient::from_config(&ProviderConfig::default()).unwrap();
        GenerateTextHandler::new(Arc::new(client), TextTaskConfig::default())
    }

    #[test]
    fn test_request_uses_max_tokens_override() {
        let inputs = ports([("prompt", Value::from("hi")), ("maxTokens", Value::Number(42.0))]);
        let request = handler().request(&inputs).unwrap();
        assert_eq!(request.max_tokens, 42);
        assert_eq!(request.model, "llama-3.3-70b-versatile");

        let request = handler().request(&ports([("prompt", Value::from("hi"))])).unwrap();
        assert_eq!(request.max_tokens, 500);
    }

    #[tokio::test]
    async fn test_missing_prompt_fails_before_request() {
        let ctx = TaskContext {
            run_id: RunId::new(),
            node_id: "n1".into(),
            label: "n1".into(),
        };
        let err = handler()
            .execute(ports([("prompt", Value::from(""))]), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, NodeflowError::TaskInput { kind: TaskKind::GenerateText, .. }));
    }
}
