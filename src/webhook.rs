use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

use crate::handlers::MessageHandler;
use crate::models::WhatsAppMessage;

/// Bird.com webhook payload structures (whatsapp.inbound format)
#[derive(Debug, Deserialize, Serialize)]
pub struct BirdWebhook {
    pub service: String,
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookPayload {
    pub id: String,
    #[serde(rename = "channelId")]
    pub channel_id: String,
    pub sender: Sender,
    pub body: MessageBody,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Sender {
    pub contact: Contact,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Contact {
    #[serde(rename = "identifierValue")]
    pub identifier_value: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MessageBody {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub text: Option<TextContent>,
    pub image: Option<MediaContent>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MediaContent {
    pub images: Vec<ImageData>,
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ImageData {
    #[serde(rename = "mediaUrl")]
    pub media_url: String,
}

impl BirdWebhook {
    /// Converts the inbound payload to a chat message. Unsupported body types yield `None`.
    pub fn into_message(self) -> Option<WhatsAppMessage> {
        let payload = self.payload;
        let from = payload.sender.contact.identifier_value;

        let mut message = match payload.body.msg_type.as_str() {
            "text" => {
                let text = payload.body.text?;
                log::info!("💬 Text message from {}: {}", from, text.text);
                WhatsAppMessage::text(&payload.id, &from, &text.text)
            }
            "image" => {
                let image = payload.body.image?;
                let Some(first_image) = image.images.first() else {
                    log::warn!("⚠️ Image message received but no images in array");
                    return None;
                };
                log::info!("📸 Image message from {}: mediaUrl={}", from, first_image.media_url);
                let caption = image.caption.as_deref().unwrap_or("");
                WhatsAppMessage::with_media(&payload.id, &from, caption, &first_image.media_url)
            }
            other => {
                log::warn!("⚠️ Unknown message type: {}", other);
                return None;
            }
        };

        if payload.created_at.is_some() {
            message.timestamp = payload.created_at;
        }
        Some(message)
    }
}

/// Handle incoming webhook from Bird.com
pub async fn handle_bird_webhook(handler: Arc<MessageHandler>, webhook: BirdWebhook) -> anyhow::Result<()> {
    log::info!("📨 Received webhook: event={}, id={}", webhook.event, webhook.payload.id);

    match webhook.into_message() {
        Some(message) => handler.handle_message(&message).await,
        None => Ok(()),
    }
}

/// Verify webhook signature using HMAC-SHA256
fn verify_webhook_signature(payload: &str, signature: &str, secret: &str) -> bool {
    type HmacSha256 = Hmac<Sha256>;

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };

    // Bird.com typically sends signature as "sha256=<signature>"
    let provided_signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(provided_bytes) = hex::decode(provided_signature) else {
        return false;
    };

    mac.update(payload.as_bytes());
    mac.verify_slice(&provided_bytes).is_ok()
}

// Client config admin API
#[cfg(feature = "webhook-server")]
pub mod admin;

#[cfg(feature = "webhook-server")]
pub mod server {
    use super::*;
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        routing::{get, post},
        Router,
    };

    pub struct AppState {
        pub message_handler: Arc<MessageHandler>,
        pub webhook_secret: Option<String>,
    }

    pub fn create_webhook_router(message_handler: Arc<MessageHandler>, webhook_secret: Option<String>) -> Router {
        let state = Arc::new(AppState {
            message_handler,
            webhook_secret,
        });

        Router::new()
            .route("/", get(root_handler))
            .route("/webhook/whatsapp", post(webhook_handler))
            .route("/health", get(health_check))
            .with_state(state)
    }

    fn signature_header(headers: &HeaderMap) -> &str {
        ["x-hub-signature-256", "x-signature", "signature"]
            .iter()
            .find_map(|name| headers.get(*name))
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
    }

    async fn webhook_handler(
        headers: HeaderMap,
        State(state): State<Arc<AppState>>,
        body: String,
    ) -> StatusCode {
        log::debug!("🔔 Webhook received: {}", body.chars().take(500).collect::<String>());

        let signature = signature_header(&headers);
        match state.webhook_secret.as_deref() {
            Some(secret) if !signature.is_empty() => {
                // Raw body only; re-serialized JSON would not match the HMAC
                if !verify_webhook_signature(&body, signature, secret) {
                    log::error!("❌ Webhook signature verification failed");
                    return StatusCode::UNAUTHORIZED;
                }
                log::info!("✅ Webhook signature verified");
            }
            Some(_) => {
                log::error!("❌ Webhook signature missing while a secret is configured");
                return StatusCode::UNAUTHORIZED;
            }
            None if !signature.is_empty() => {
                log::warn!("⚠️ Signature provided but no webhook secret configured");
            }
            None => {}
        }

        let payload: BirdWebhook = match serde_json::from_str(&body) {
            Ok(p) => p,
            Err(e) => {
                log::error!("❌ Failed to parse webhook payload: {}", e);
                return StatusCode::UNPROCESSABLE_ENTITY;
            }
        };

        // Each message runs on its own task; Bird.com only needs the 200
        let handler = state.message_handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_bird_webhook(handler, payload).await {
                log::error!("❌ Webhook processing error: {}", e);
            }
        });

        StatusCode::OK
    }

    async fn root_handler() -> &'static str {
        "FitBOT Webhook Server - Use /webhook/whatsapp for Bird.com webhooks"
    }

    async fn health_check() -> &'static str {
        "OK"
    }

}
