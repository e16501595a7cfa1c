//! Offline stand-ins for every task kind.
//!
//! Used when no provider credentials are available, or when simulation is
//! forced in the config. Inputs are validated exactly like the real
//! handlers, so a workflow that fails here fails the same way online.

use futures::future::BoxFuture;
use reqwest::Client;
use tracing::{debug, info};

use nodeflow_core::config::TasksConfig;
use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::TaskHandler;
use nodeflow_core::types::{FileRef, Ports, TaskContext, TaskKind, Value};

use crate::files::{file_input, load, to_data_url};
use crate::handlers::audio::audio_mime;
use crate::handlers::image::{parse_size, placeholder_image};
use crate::handlers::pdf::document_context;
use crate::handlers::{optional_count, optional_text, required_text, single};

pub struct SimulatedHandler {
    kind: TaskKind,
    config: TasksConfig,
    http: Client,
}

impl SimulatedHandler {
    pub fn new(kind: TaskKind, config: TasksConfig) -> Self {
        Self {
            kind,
            config,
            http: Client::new(),
        }
    }

    async fn simulate(&self, inputs: &Ports) -> Result<Ports> {
        let kind = self.kind;
        match kind {
            TaskKind::GenerateText => {
                let prompt = required_text(kind, inputs, "prompt")?;
                let max_tokens = optional_count(kind, inputs, "maxTokens")?
                    .unwrap_or(self.config.text.max_tokens);
                Ok(single("text", simulated_text(prompt, max_tokens)))
            }
            TaskKind::GenerateImage => {
                required_text(kind, inputs, "prompt")?;
                let size = optional_text(inputs, "size").unwrap_or(self.config.image.size.as_str());
                if parse_size(size).is_none() {
                    return Err(NodeflowError::task_input(
                        kind,
                        format!("invalid image size '{}', expected WIDTHxHEIGHT", size),
                    ));
                }
                Ok(single("image", FileRef::Url(placeholder_image(size))))
            }
            TaskKind::ReadImage => {
                let file = file_input(kind, inputs, "file")?;
                let mut out = single(
                    "text",
                    "Simulated image reading: configure a provider API key to extract text from images.",
                );
                out.insert("imageUrl".into(), Value::File(file));
                Ok(out)
            }
            TaskKind::TranscribeAudio => {
                let file = file_input(kind, inputs, "file")?;
                Ok(single("text", simulated_transcript(&file.file_name())))
            }
            TaskKind::GenerateAudio => {
                required_text(kind, inputs, "text")?;
                let format = &self.config.speech.format;
                let url = to_data_url(&silent_wav(), audio_mime(format));
                Ok(single("audio", FileRef::Url(url)))
            }
            TaskKind::SummarizePdf => {
                let file = file_input(kind, inputs, "file")?;
                let max_length = optional_count(kind, inputs, "maxLength")?
                    .unwrap_or(self.config.pdf.max_length);
                let context = match load(&self.http, &file).await {
                    Ok(data) => document_context(&data.name, &data.bytes),
                    Err(e) => {
                        debug!(file = %file, error = %e, "Could not read PDF, summarizing by name");
                        document_context(&file.file_name(), &[])
                    }
                };
                Ok(single("summary", truncate_words(&context, max_length as usize)))
            }
        }
    }
}

impl TaskHandler for SimulatedHandler {
    fn kind(&self) -> TaskKind {
        self.kind
    }

    fn execute(&self, inputs: Ports, ctx: TaskContext) -> BoxFuture<'_, Result<Ports>> {
        Box::pin(async move {
            let out = self.simulate(&inputs).await?;
            info!(node_id = %ctx.node_id, kind = %self.kind, "Simulated task complete");
            Ok(out)
        })
    }
}

fn simulated_text(prompt: &str, max_tokens: u32) -> String {
    let lower = prompt.to_lowercase();
    if lower.contains("hello") || lower.split_whitespace().any(|w| w == "hi") {
        "Hello! How can I assist you today? I'm a simulated AI response since no API key was provided for the actual AI service.".to_string()
    } else if lower.contains("weather") {
        "The weather today is sunny with a high of 75°F and a low of 60°F. There's a 10% chance of rain in the evening. This is a simulated response.".to_string()
    } else {
        format!(
            "This is a simulated response to your prompt: \"{}\". With a valid API key you would receive an AI-generated response of up to {} tokens here.",
            prompt, max_tokens
        )
    }
}

fn simulated_transcript(file_name: &str) -> String {
    let lower = file_name.to_lowercase();
    if lower.contains("interview") {
        "Interviewer: Thank you for joining us today. Can you tell us about your research?\n\nGuest: Certainly. Our team has been studying applications of computing in healthcare for the past three years.".to_string()
    } else if lower.contains("lecture") || lower.contains("lesson") {
        "Today we'll be covering the fundamental principles of machine learning. Supervised learning relies on labeled data sets.".to_string()
    } else {
        format!(
            "This is a simulated transcription of the audio file \"{}\". No audio content was processed.",
            file_name
        )
    }
}

/// Cut `text` to at most `max_chars`, on a word boundary when possible.
fn truncate_words(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    match cut.rfind(' ') {
        Some(pos) if pos > 0 => format!("{}...", &cut[..pos]),
        _ => format!("{}...", cut),
    }
}

/// A valid, empty 16-bit mono PCM WAV file.
fn silent_wav() -> Vec<u8> {
    let sample_rate: u32 = 24_000;
    let mut wav = Vec::with_capacity(44);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&36u32.to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&1u16.to_le_bytes()); // mono
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&0u32.to_le_bytes());
    wav
}
