use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::{debug, info};

use nodeflow_core::config::{ImageTaskConfig, VisionTaskConfig};
use nodeflow_core::error::{NodeflowError, Result};
use nodeflow_core::traits::TaskHandler;
use nodeflow_core::types::{FileRef, Ports, TaskContext, TaskKind, Value};

use super::{optional_text, required_text, single};
use crate::client::{ChatMessage, ChatRequest, ContentPart, ImageRequest, ImageUrl, ProviderClient};
use crate::files::{file_input, load};

/// Placeholder image service used when no image model is configured.
const PLACEHOLDER_URL: &str = "https://placehold.co";

/// Parse `WIDTHxHEIGHT`.
pub(crate) fn parse_size(size: &str) -> Option<(u32, u32)> {
    let (w, h) = size.trim().split_once(['x', 'X'])?;
    let w: u32 = w.parse().ok()?;
    let h: u32 = h.parse().ok()?;
    (w > 0 && h > 0).then_some((w, h))
}

pub(crate) fn placeholder_image(size: &str) -> String {
    format!("{}/{}/36C/EEF?text=AI+Image", PLACEHOLDER_URL, size)
}

/// `generate-image`: `inputs.prompt` (+ optional `inputs.size`) to `{image}`.
pub struct GenerateImageHandler {
    client: Arc<ProviderClient>,
    config: ImageTaskConfig,
}

impl GenerateImageHandler {
    pub fn new(client: Arc<ProviderClient>, config: ImageTaskConfig) -> Self {
        Self { client, config }
    }
}

impl TaskHandler for GenerateImageHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::GenerateImage
    }

    fn execute(&self, inputs: Ports, ctx: TaskContext) -> BoxFuture<'_, Result<Ports>> {
        Box::pin(async move {
            let kind = TaskKind::GenerateImage;
            let prompt = required_text(kind, &inputs, "prompt")?;
            let size = optional_text(&inputs, "size").unwrap_or(self.config.size.as_str());
            if parse_size(size).is_none() {
                return Err(NodeflowError::task_input(
                    kind,
                    format!("invalid image size '{}', expected WIDTHxHEIGHT", size),
                ));
            }

            let url = match &self.config.model {
                Some(model) => {
                    let request = ImageRequest {
                        model: model.clone(),
                        prompt: prompt.to_string(),
                        size: size.to_string(),
                        n: 1,
                    };
                    self.client.generate_image(&request).await?
                }
                None => {
                    debug!(node_id = %ctx.node_id, size, "No image model configured, using placeholder");
                    placeholder_image(size)
                }
            };

            info!(node_id = %ctx.node_id, size, "Image generated");
            Ok(single("image", FileRef::Url(url)))
        })
    }
}

/// `read-image`: describe / OCR an image with a vision model.
///
/// Remote URLs are passed through as-is; local files and data URLs are
/// sent inline. Outputs `{text, imageUrl}`.
pub struct ReadImageHandler {
    client: Arc<ProviderClient>,
    config: VisionTaskConfig,
}

impl ReadImageHandler {
    pub fn new(client: Arc<ProviderClient>, config: VisionTaskConfig) -> Self {
        Self { client, config }
    }

    async fn image_url(&self, file: &FileRef) -> Result<String> {
        match file {
            FileRef::Url(url) => Ok(url.clone()),
            FileRef::Path(_) => Ok(load(self.client.http(), file).await?.to_data_url()),
        }
    }
}

impl TaskHandler for ReadImageHandler {
    fn kind(&self) -> TaskKind {
        TaskKind::ReadImage
    }

    fn execute(&self, inputs: Ports, ctx: TaskContext) -> BoxFuture<'_, Result<Ports>> {
        Box::pin(async move {
            let file = file_input(TaskKind::ReadImage, &inputs, "file")?;
            let image_url = self.image_url(&file).await?;

            let request = ChatRequest {
                model: self.config.model.clone(),
                messages: vec![ChatMessage::user_parts(vec![ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.clone(),
                    },
                }])],
                max_tokens: self.config.max_tokens,
                temperature: None,
            };
            let text = self.client.chat(&request).await?;
            info!(node_id = %ctx.node_id, image = %file, "Image read");

            let mut out = single("text", text);
            out.insert("imageUrl".into(), Value::File(FileRef::Url(image_url)));
            Ok(out)
        })
    }
}
