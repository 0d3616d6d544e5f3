use serde::{Deserialize, Serialize};

use crate::config::OpenRouterConfig;
use crate::services::ai_service::{
    CompletionClient, CompletionError, VisionRequest, DEFAULT_IMAGE_INSTRUCTION, DEFAULT_SYSTEM_PROMPT,
};
use crate::services::media::resolve_image_url;

const TEXT_TEMPERATURE: f32 = 0.7;
const VISION_TEMPERATURE: f32 = 0.2;
const VISION_MAX_TOKENS: u32 = 300;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageBody,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageBody {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageData },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<ResponseContent>,
}

/// Providers answer with either a plain string or a list of content parts.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponseContent {
    Text(String),
    Parts(Vec<ResponsePart>),
    Part(ResponsePart),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponsePart {
    Text(String),
    Object {
        #[serde(default)]
        text: Option<String>,
    },
    Other(serde_json::Value),
}

impl ResponsePart {
    fn text(&self) -> Option<&str> {
        match self {
            ResponsePart::Text(text) => Some(text),
            ResponsePart::Object { text } => text.as_deref(),
            ResponsePart::Other(_) => None,
        }
    }
}

/// Flattens provider content into one trimmed string, dropping non-text parts.
fn normalize_content(content: Option<&ResponseContent>) -> String {
    match content {
        None => String::new(),
        Some(ResponseContent::Text(text)) => text.trim().to_string(),
        Some(ResponseContent::Parts(parts)) => parts
            .iter()
            .filter_map(ResponsePart::text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string(),
        Some(ResponseContent::Part(part)) => part.text().unwrap_or_default().trim().to_string(),
    }
}

pub struct OpenRouterService {
    config: OpenRouterConfig,
    client: reqwest::Client,
}

impl OpenRouterService {
    pub fn new(config: OpenRouterConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn text_model(&self) -> &str {
        &self.config.text_model
    }

    pub fn vision_model(&self) -> &str {
        &self.config.vision_model
    }

    async fn request_completion(&self, request: &ChatRequest<'_>) -> Result<String, CompletionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(CompletionError::MissingApiKey)?;

        log::info!("🤖 Sending request to OpenRouter with model: {}", request.model);
        log::debug!("📤 Request payload size: {} bytes", serde_json::to_string(request)?.len());

        let mut builder = self
            .client
            .post(&self.config.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json");

        if let Some(referer) = &self.config.referer {
            builder = builder.header("HTTP-Referer", referer);
        }
        if let Some(title) = &self.config.app_title {
            builder = builder.header("X-Title", title);
        }

        let response = builder.json(request).send().await?;
        let status = response.status();
        log::debug!("📥 OpenRouter response status: {}", status);

        let response_text = response.text().await?;
        if !status.is_success() {
            log::error!("❌ OpenRouter API error ({}): {}", status, response_text);
            return Err(CompletionError::Http {
                status: status.as_u16(),
                body: response_text,
            });
        }

        log::debug!("📄 Raw OpenRouter response size: {} bytes", response_text.len());
        let chat_response: ChatResponse = serde_json::from_str(&response_text)?;

        let content = chat_response
            .choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_ref());
        let normalized = normalize_content(content);

        if normalized.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }

        log::debug!("💬 OpenRouter response content: {}", normalized);
        Ok(normalized)
    }
}

#[async_trait::async_trait]
impl CompletionClient for OpenRouterService {
    fn is_enabled(&self) -> bool {
        self.config.api_key.is_some()
    }

    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, CompletionError> {
        if self.config.text_model.trim().is_empty() {
            return Err(CompletionError::MissingModel("text"));
        }

        let request = ChatRequest {
            model: &self.config.text_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageBody::Text(system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT).to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: MessageBody::Text(prompt.to_string()),
                },
            ],
            temperature: Some(TEXT_TEMPERATURE),
            max_tokens: None,
        };

        self.request_completion(&request).await
    }

    async fn describe_image(&self, request: VisionRequest) -> Result<String, CompletionError> {
        if self.config.vision_model.trim().is_empty() {
            return Err(CompletionError::MissingModel("vision"));
        }

        let image_url = resolve_image_url(&request.image)?;
        let instruction = request
            .instruction
            .unwrap_or_else(|| DEFAULT_IMAGE_INSTRUCTION.to_string());

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system {
            messages.push(ChatMessage {
                role: "system",
                content: MessageBody::Text(system),
            });
        }

        let user_content = match image_url {
            Some(url) => {
                log::debug!("🖼️ Image URL attached: {}...", url.chars().take(64).collect::<String>());
                MessageBody::Parts(vec![
                    ContentPart::Text { text: instruction },
                    ContentPart::ImageUrl {
                        image_url: ImageData { url },
                    },
                ])
            }
            None => {
                log::debug!("No image supplied, sending text-only vision request");
                MessageBody::Text(instruction)
            }
        };
        messages.push(ChatMessage {
            role: "user",
            content: user_content,
        });

        let chat_request = ChatRequest {
            model: &self.config.vision_model,
            messages,
            temperature: Some(request.temperature.unwrap_or(VISION_TEMPERATURE)),
            max_tokens: Some(request.max_tokens.unwrap_or(VISION_MAX_TOKENS)),
        };

        self.request_completion(&chat_request).await
    }
}
