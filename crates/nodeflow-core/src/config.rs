use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NodeflowError, Result};

/// Top-level Nodeflow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    /// Force canned task outputs even when a provider is configured.
    #[serde(default)]
    pub simulate: bool,
}

/// How the traversal treats a node reached more than once in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevisitPolicy {
    /// Execute every node at most once per run.
    #[default]
    Once,
    /// Execute a node once per path that reaches it; nodes already on the
    /// current path are skipped.
    PerPath,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub revisit: RevisitPolicy,
    /// Capacity of the notification broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            revisit: RevisitPolicy::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_event_capacity() -> usize { 256 }

/// OpenAI-compatible provider used by the built-in task handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// API root, e.g. `https://api.groq.com/openai/v1`. Defaults to the preset.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Answer with simulated output when a provider call fails, instead of
    /// failing the node. Invalid inputs still fail.
    #[serde(default = "default_true")]
    pub fallback_to_simulation: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider(),
            api_key: None,
            base_url: None,
            timeout_secs: default_timeout_secs(),
            extra_headers: HashMap::new(),
            retry: RetryConfig::default(),
            fallback_to_simulation: true,
        }
    }
}

impl ProviderConfig {
    /// Whether an API key is set to something other than an unexpanded
    /// `${VAR}` reference.
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.is_empty() && !k.starts_with("${"))
    }
}

fn default_provider() -> String { "groq".to_string() }
fn default_timeout_secs() -> u64 { 120 }
fn default_true() -> bool { true }

/// Retry configuration for provider requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Per-task model settings. Node inputs (`maxTokens`, `size`, `voice`,
/// `maxLength`) override the matching defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TasksConfig {
    #[serde(default)]
    pub text: TextTaskConfig,
    #[serde(default)]
    pub image: ImageTaskConfig,
    #[serde(default)]
    pub vision: VisionTaskConfig,
    #[serde(default)]
    pub transcription: TranscriptionTaskConfig,
    #[serde(default)]
    pub speech: SpeechTaskConfig,
    #[serde(default)]
    pub pdf: PdfTaskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextTaskConfig {
    #[serde(default = "default_text_model")]
    pub model: String,
    #[serde(default = "default_text_max_tokens")]
    pub max_tokens: u32,
}

impl Default for TextTaskConfig {
    fn default() -> Self {
        Self {
            model: default_text_model(),
            max_tokens: default_text_max_tokens(),
        }
    }
}

fn default_text_model() -> String { "llama-3.3-70b-versatile".to_string() }
fn default_text_max_tokens() -> u32 { 500 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageTaskConfig {
    /// Image model. Without one, generation returns a placeholder image URL.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_image_size")]
    pub size: String,
}

impl Default for ImageTaskConfig {
    fn default() -> Self {
        Self {
            model: None,
            size: default_image_size(),
        }
    }
}

fn default_image_size() -> String { "512x512".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionTaskConfig {
    #[serde(default = "default_vision_model")]
    pub model: String,
    #[serde(default = "default_vision_max_tokens")]
    pub max_tokens: u32,
}

impl Default for VisionTaskConfig {
    fn default() -> Self {
        Self {
            model: default_vision_model(),
            max_tokens: default_vision_max_tokens(),
        }
    }
}

fn default_vision_model() -> String { "meta-llama/llama-4-scout-17b-16e-instruct".to_string() }
fn default_vision_max_tokens() -> u32 { 300 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionTaskConfig {
    #[serde(default = "default_transcription_model")]
    pub model: String,
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for TranscriptionTaskConfig {
    fn default() -> Self {
        Self {
            model: default_transcription_model(),
            language: None,
        }
    }
}

fn default_transcription_model() -> String { "whisper-large-v3-turbo".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechTaskConfig {
    #[serde(default = "default_speech_model")]
    pub model: String,
    #[serde(default = "default_speech_voice")]
    pub voice: String,
    #[serde(default = "default_speech_format")]
    pub format: String,
}

impl Default for SpeechTaskConfig {
    fn default() -> Self {
        Self {
            model: default_speech_model(),
            voice: default_speech_voice(),
            format: default_speech_format(),
        }
    }
}

fn default_speech_model() -> String { "canopylabs/orpheus-v1-english".to_string() }
fn default_speech_voice() -> String { "hannah".to_string() }
fn default_speech_format() -> String { "wav".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfTaskConfig {
    #[serde(default = "default_pdf_model")]
    pub model: String,
    /// Target summary length in characters.
    #[serde(default = "default_pdf_max_length")]
    pub max_length: u32,
}

impl Default for PdfTaskConfig {
    fn default() -> Self {
        Self {
            model: default_pdf_model(),
            max_length: default_pdf_max_length(),
        }
    }
}

fn default_pdf_model() -> String { "llama3-8b-8192".to_string() }
fn default_pdf_max_length() -> u32 { 500 }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| NodeflowError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| NodeflowError::Config(e.to_string()))
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Whether the built-in handlers should produce canned outputs.
    pub fn simulation_mode(&self) -> bool {
        self.simulate || (self.provider.name != "ollama" && !self.provider.has_api_key())
    }
}

fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_NODEFLOW_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_NODEFLOW_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_NODEFLOW_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_NODEFLOW_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_NODEFLOW_VAR}\"");
    }

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.revisit, RevisitPolicy::Once);
        assert_eq!(config.engine.event_capacity, 256);
        assert_eq!(config.provider.name, "groq");
        assert_eq!(config.provider.retry.max_retries, 3);
        assert!(config.provider.fallback_to_simulation);
        assert_eq!(config.tasks.text.max_tokens, 500);
        assert_eq!(config.tasks.vision.max_tokens, 300);
        assert_eq!(config.tasks.speech.voice, "hannah");
        assert_eq!(config.tasks.pdf.max_length, 500);
        assert!(config.tasks.image.model.is_none());
        assert!(!config.simulate);
    }

    #[test]
    fn test_revisit_policy_kebab_case() {
        let config: AppConfig = toml::from_str(
            r#"
[engine]
revisit = "per-path"
"#,
        )
        .unwrap();
        assert_eq!(config.engine.revisit, RevisitPolicy::PerPath);
    }

    #[test]
    fn test_simulation_mode() {
        let mut config = AppConfig::default();
        assert!(config.simulation_mode(), "no api key means simulation");

        config.provider.api_key = Some("${GROQ_API_KEY}".into());
        assert!(config.simulation_mode(), "unexpanded reference is not a key");

        config.provider.api_key = Some("gsk-test".into());
        assert!(!config.simulation_mode());

        config.simulate = true;
        assert!(config.simulation_mode());

        let ollama = AppConfig {
            provider: ProviderConfig {
                name: "ollama".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(!ollama.simulation_mode());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config =
            AppConfig::load_or_default(Path::new("/nonexistent/nodeflow.toml")).unwrap();
        assert_eq!(config.provider.name, "groq");
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let err = AppConfig::load(Path::new("/nonexistent/nodeflow.toml")).unwrap_err();
        assert!(matches!(err, NodeflowError::ConfigNotFound(_)));
    }
}
