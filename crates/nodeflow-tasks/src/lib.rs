pub mod client;
pub mod files;
pub mod handlers;
pub mod presets;
pub mod registry;
pub mod retry;
pub mod simulated;

use std::sync::Arc;

use tracing::info;

use nodeflow_core::config::AppConfig;
use nodeflow_core::error::Result;
use nodeflow_core::types::TaskKind;

pub use client::ProviderClient;
pub use handlers::{
    GenerateAudioHandler, GenerateImageHandler, GenerateTextHandler, ReadImageHandler,
    SummarizePdfHandler, TranscribeAudioHandler,
};
pub use registry::TaskRegistry;
pub use simulated::SimulatedHandler;

/// Build a registry with a handler for every task kind.
///
/// In simulation mode every kind gets a [`SimulatedHandler`]; otherwise the
/// handlers share one [`ProviderClient`], with simulated fallbacks for
/// provider errors unless `fallback_to_simulation` is off.
pub fn create_registry(config: &AppConfig) -> Result<TaskRegistry> {
    let mut registry = TaskRegistry::new();

    if config.simulation_mode() {
        info!(provider = %config.provider.name, "No provider credentials, running tasks in simulation mode");
        for kind in TaskKind::ALL {
            registry.register(SimulatedHandler::new(kind, config.tasks.clone()));
        }
        return Ok(registry);
    }

    let client = Arc::new(ProviderClient::from_config(&config.provider)?);
    info!(provider = %config.provider.name, base_url = %client.base_url(), "Task provider configured");

    let tasks = &config.tasks;
    registry.register(GenerateTextHandler::new(client.clone(), tasks.text.clone()));
    registry.register(GenerateImageHandler::new(client.clone(), tasks.image.clone()));
    registry.register(ReadImageHandler::new(client.clone(), tasks.vision.clone()));
    registry.register(TranscribeAudioHandler::new(client.clone(), tasks.transcription.clone()));
    registry.register(GenerateAudioHandler::new(client.clone(), tasks.speech.clone()));
    registry.register(SummarizePdfHandler::new(client, tasks.pdf.clone()));

    if config.provider.fallback_to_simulation {
        for kind in TaskKind::ALL {
            registry.register_fallback(SimulatedHandler::new(kind, tasks.clone()));
        }
    }
    Ok(registry)
}
