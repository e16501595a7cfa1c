use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info};

use nodeflow_core::config::PdfTaskConfig;
use nodeflow_core::error::Result;
use nodeflow_core::traits::TaskHandler;
use nodeflow_core::types::{Ports, TaskContext, TaskKind};

use super::{optional_count, single};
use crate::client::{ChatMessage, ChatRequest, ProviderClient};
use crate::files::{file_input, load};

const SYSTEM_PROMPT: &str = "You are a document summarization assistant. Generate a clear, concise summary of the PDF document based on the extracted text.";

/// Shortest printable run worth keeping.
const MIN_RUN: usize = 6;
/// How many of the longest runs to keep.
const MAX_RUNS: usize = 10;
/// Below this many characters the extraction is treated as a miss.
const MIN_EXTRACTED: usize = 50;
const MAX_SUMMARY_TOKENS: u32 = 600;

/// Pull readable text out of raw PDF bytes without parsing the format.
///
/// Collects runs of printable ASCII, keeps the ten longest that look like
/// words (at least about a third letters), and joins them with blank lines.
/// Returns `None` when fewer than 50 characters survive.
pub fn extract_printable_text(bytes: &[u8]) -> Option<String> {
    let mut runs: Vec<&[u8]> = bytes
        .split(|b| !(32..=126).contains(b))
        .filter(|run| run.len() >= MIN_RUN)
        .collect();
    runs.sort_by(|a, b| b.len().cmp(&a.len()));

    let text = runs
        .into_iter()
        .take(MAX_RUNS)
        .filter(|run| looks_like_text(run))
        .map(|run| String::from_utf8_lossy(run).into_owned())
        .collect::<Vec<_>>()
        .join("\n\n");

    (text.len() >= MIN_EXTRACTED).then_some(text)
}

fn looks_like_text(run: &[u8]) -> bool {
    let letters = run.iter().filter(|b| b.is_ascii_alphabetic()).count();
    (letters + 1) as f64 > run.len() as f64 / 3.0
}

/// The document text handed to the model, with a filename hint when the
/// extraction came up short.
pub(crate) fn document_context(name: &str, bytes: &[u8]) -> String {
    match extract_printable_text(bytes) {
        Some(text) => text,
        None => format!(
            "PDF document \"{}\" has content that appears to be mostly binary or encrypted. \
             Using filename and structure for context.\n\nThe document name is {} which may indicate its contents.",
            name, name
        ),
    }
}

pub(crate) fn summary_token_budget(max_length: u32) -> u32 {
    (max_length / 2).clamp(1, MAX_SUMMARY_TOKENS)
}

/// `summarize-pdf`: extract text from `inputs.file` and summarize it in
/// roughly `inputs.maxLength` characters.
pub struct SummarizePdfHandler {
    client: Arc<ProviderClient>,
    config: PdfTaskConfig,
}

impl SummarizePdfHandler {
    pub fn new(client: Arc<ProviderClient>, config: PdfTaskConfig) -> Self {
        Self { client, config }
    }

    fn request(&self, context: &str, max_length: u32) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Summarize the following PDF content in about {} characters:\n\n{}",
                    max_length, context
                )),
            ],
            max_tokens: summary_token_budget(max_length),
            temperature: None,
        }
    }
}

impl TaskHandler for SummarizePdfHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::SummarizePdf
    }

    fn execute(&self, inputs: Ports, ctx: TaskContext) -> BoxFuture<'_, Result<Ports>> {
        Box::pin(async move {
            let kind = TaskKind::SummarizePdf;
            let file = file_input(kind, &inputs, "file")?;
            let max_length =
                optional_count(kind, &inputs, "maxLength")?.unwrap_or(self.config.max_length);

            let data = load(self.client.http(), &file).await?;
            let context = document_context(&data.name, &data.bytes);
            debug!(node_id = %ctx.node_id, extracted = context.len(), "PDF text extracted");

            let summary = self.client.chat(&self.request(&context, max_length)).await?;
            info!(node_id = %ctx.node_id, file = %file, chars = summary.len(), "PDF summarized");
            Ok(single("summary", summary))
        })
    }
}
