use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use nodeflow_core::config::{SpeechTaskConfig, TranscriptionTaskConfig};
use nodeflow_core::error::Result;
use nodeflow_core::traits::TaskHandler;
use nodeflow_core::types::{FileRef, Ports, TaskContext, TaskKind};

use super::{optional_text, required_text, single};
use crate::client::{ProviderClient, SpeechRequest};
use crate::files::{file_input, load, to_data_url};

/// `transcribe-audio`: upload `inputs.file` and return `{text}`.
pub struct TranscribeAudioHandler {
    client: Arc<ProviderClient>,
    config: TranscriptionTaskConfig,
}

impl TranscribeAudioHandler {
    pub fn new(client: Arc<ProviderClient>, config: TranscriptionTaskConfig) -> Self {
        Self { client, config }
    }
}

impl TaskHandler for TranscribeAudioHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::TranscribeAudio
    }

    fn execute(&self, inputs: Ports, ctx: TaskContext) -> BoxFuture<'_, Result<Ports>> {
        Box::pin(async move {
            let file = file_input(TaskKind::TranscribeAudio, &inputs, "file")?;
            let data = load(self.client.http(), &file).await?;
            let text = self
                .client
                .transcribe(&self.config.model, &data, self.config.language.as_deref())
                .await?;
            info!(node_id = %ctx.node_id, file = %file, chars = text.len(), "Audio transcribed");
            Ok(single("text", text))
        })
    }
}

/// `generate-audio`: speak `inputs.text` and return `{audio}` as a data URL.
pub struct GenerateAudioHandler {
    client: Arc<ProviderClient>,
    config: SpeechTaskConfig,
}

impl GenerateAudioHandler {
    pub fn new(client: Arc<ProviderClient>, config: SpeechTaskConfig) -> Self {
        Self { client, config }
    }

    fn request(&self, inputs: &Ports) -> Result<SpeechRequest> {
        let text = required_text(TaskKind::GenerateAudio, inputs, "text")?;
        let voice = optional_text(inputs, "voice").unwrap_or(self.config.voice.as_str());
        Ok(SpeechRequest {
            model: self.config.model.clone(),
            input: text.to_string(),
            voice: voice.to_string(),
            response_format: self.config.format.clone(),
        })
    }
}

pub(crate) fn audio_mime(format: &str) -> &'static str {
    match format {
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "ogg" | "opus" => "audio/ogg",
        "aac" => "audio/aac",
        _ => "audio/wav",
    }
}

impl TaskHandler for GenerateAudioHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::GenerateAudio
    }

    fn execute(&self, inputs: Ports, ctx: TaskContext) -> BoxFuture<'_, Result<Ports>> {
        Box::pin(async move {
            let request = self.request(&inputs)?;
            let bytes = self.client.speech(&request).await?;
            info!(
                node_id = %ctx.node_id,
                voice = %request.voice,
                bytes = bytes.len(),
                "Audio generated"
            );
            let url = to_data_url(&bytes, audio_mime(&request.response_format));
            Ok(single("audio", FileRef::Url(url)))
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

    fn client() -> Arc<ProviderClient> {
        Arc::new(ProviderClient::from_config(&ProviderConfig::default()).unwrap())
    }

    #[test]
    fn test_speech_request_defaults_and_override() {
        let handler = GenerateAudioHandler::new(client(), SpeechTaskConfig::default());

        let request = handler.request(&ports([("text", Value::from("hello"))])).unwrap();
        assert_eq!(request.voice, "hannah");
        assert_eq!(request.response_format, "wav");
        assert_eq!(request.model, "canopylabs/orpheus-v1-english");

        let request = handler
            .request(&ports([("text", Value::from("hello")), ("voice", Value::from("tara"))]))
            .unwrap();
        assert_eq!(request.voice, "tara");
    }

    #[test]
    fn test_speech_requires_text() {
        let handler = GenerateAudioHandler::new(client(), SpeechTaskConfig::default());
        assert!(matches!(
            handler.request(&ports([("voice", Value::from("tara"))])),
            Err(NodeflowError::TaskInput { kind: TaskKind::GenerateAudio, .. })
        ));
    }

    #[test]
    fn test_audio_mime() {
        assert_eq!(audio_mime("wav"), "audio/wav");
        assert_eq!(audio_mime("mp3"), "audio/mpeg");
    }

    #[tokio::test]
    async fn test_transcribe_missing_file_is_file_error() {
        let handler = TranscribeAudioHandler::new(client(), TranscriptionTaskConfig::default());
        let ctx = TaskContext {
            run_id: RunId::new(),
            node_id: "t".into(),
            label: "t".into(),
        };
        let inputs = ports([("file", Value::from("/nonexistent/nodeflow/clip.wav"))]);
        let err = handler.execute(inputs, ctx).await.unwrap_err();
        assert!(matches!(err, NodeflowError::File { .. }));
    }
}
