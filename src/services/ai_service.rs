use thiserror::Error;

use crate::models::ImageInput;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful WhatsApp assistant.";
pub const DEFAULT_IMAGE_INSTRUCTION: &str =
    "Describe the contents of this WhatsApp image in one or two concise sentences.";

#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("OpenRouter API key is missing.")]
    MissingApiKey,

    #[error("OpenRouter {0} model is not configured.")]
    MissingModel(&'static str),

    #[error("failed to read image {path}: {source}")]
    ImageRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OpenRouter request failed ({status}): {body}")]
    Http { status: u16, body: String },

    #[error("OpenRouter request could not be completed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("OpenRouter response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("OpenRouter returned an empty response.")]
    EmptyResponse,
}

impl CompletionError {
    /// Misconfiguration rather than a provider or network fault.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CompletionError::MissingApiKey | CompletionError::MissingModel(_))
    }
}

/// Single vision-capable completion. A request whose image resolves to nothing
/// is sent as plain text.
#[derive(Debug, Clone, Default)]
pub struct VisionRequest {
    pub image: ImageInput,
    pub instruction: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Trait for LLM completion backends (OpenRouter, test stubs, ...)
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, CompletionError>;

    async fn describe_image(&self, request: VisionRequest) -> Result<String, CompletionError>;
}

/// True when `err` carries a configuration fault anywhere in its chain.
pub fn is_configuration_error(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<CompletionError>())
        .any(CompletionError::is_configuration)
}
