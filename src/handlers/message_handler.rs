use anyhow::Result;
use base64::{engine::general_purpose, Engine};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

use crate::models::{ImageInput, MealLogEntry, WhatsAppMessage};
use crate::services::ai_service::{is_configuration_error, CompletionClient, VisionRequest};
use crate::services::calorie_estimator::{estimate_plate_calories, render_calorie_estimate};
use crate::services::chat_summary::{summarize_recent_chat, SummaryOptions};
use crate::services::media::{is_image_mime, message_slug, persist_media};
use crate::services::meal_log::MealLogStore;
use crate::services::qna::generate_qna_response;
use crate::services::science_brief::generate_science_brief;
use crate::services::WhatsAppService;

const STARTUP_MESSAGE_PREFIX: &str = "FitBOT Initialised - Chat Summary module enabled";
const STARTUP_MESSAGE_COUNT: usize = 2;

/// Chat command recognised from an inbound message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Calories(String),
    Science(String),
    Ask(String),
    Summary(Option<String>),
    /// Media without a command
    Media,
    None,
}

impl Command {
    pub fn parse(body: &str, has_media: bool) -> Self {
        let incoming = body.trim();
        let normalized = incoming.to_lowercase();

        if has_media && normalized.starts_with("!calories") {
            return Command::Calories(argument(incoming, "!calories"));
        }
        if normalized.starts_with("!science") {
            return Command::Science(argument(incoming, "!science"));
        }
        if normalized.starts_with("!ask") {
            return Command::Ask(argument(incoming, "!ask"));
        }
        if normalized.starts_with("!summary") {
            let pref = argument(incoming, "!summary");
            return Command::Summary(if pref.is_empty() { None } else { Some(pref) });
        }
        if has_media {
            return Command::Media;
        }
        Command::None
    }
}

/// Text after the command keyword. Keywords are ASCII, so the byte offset is
/// valid in the incoming (non-lowercased) string.
fn argument(incoming: &str, keyword: &str) -> String {
    incoming.get(keyword.len()..).unwrap_or_default().trim().to_string()
}

fn disabled_reply(feature: &str) -> String {
    format!("OpenRouter API key missing. Set OPENROUTER_API_KEY to enable {}.", feature)
}

pub struct MessageHandler {
    ai: Arc<dyn CompletionClient>,
    whatsapp: Arc<dyn WhatsAppService>,
    meal_log: Arc<MealLogStore>,
    downloads_dir: PathBuf,
}

impl MessageHandler {
    pub fn new(
        ai: Arc<dyn CompletionClient>,
        whatsapp: Arc<dyn WhatsAppService>,
        meal_log: Arc<MealLogStore>,
        downloads_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ai,
            whatsapp,
            meal_log,
            downloads_dir: downloads_dir.into(),
        }
    }

    pub async fn handle_message(&self, message: &WhatsAppMessage) -> Result<()> {
        log::info!("📨 INCOMING MESSAGE - From: {} | Content: '{}' | Has Media: {}",
                   message.from, message.body, message.has_media);

        match Command::parse(&message.body, message.has_media) {
            Command::Calories(caption) => self.handle_calories(message, &caption).await,
            Command::Science(topic) => self.handle_science(message, &topic).await,
            Command::Ask(question) => self.handle_ask(message, &question).await,
            Command::Summary(preference) => self.handle_summary(&message.from, preference).await,
            Command::Media => {
                self.handle_media(message).await;
                Ok(())
            }
            Command::None => Ok(()),
        }
    }

    async fn handle_ask(&self, message: &WhatsAppMessage, question: &str) -> Result<()> {
        if question.is_empty() {
            return self.reply(message, "Usage: !ask <your prompt>").await;
        }
        if !self.ai.is_enabled() {
            return self.reply(message, &disabled_reply("AI responses")).await;
        }

        self.react(message, "⏳").await;
        match generate_qna_response(question, None, self.ai.as_ref()).await {
            Ok(answer) => {
                self.whatsapp.send_message(&message.from, &answer).await?;
                self.react(message, "✅").await;
            }
            Err(e) if is_configuration_error(&e) => {
                self.reply(message, &disabled_reply("AI responses")).await?;
            }
            Err(e) => {
                log::error!("❌ OpenRouter request failed: {}", e);
                self.react(message, "⚠️").await;
                self.reply(message, "I could not reach OpenRouter right now. Please try again soon.").await?;
            }
        }
        Ok(())
    }

    async fn handle_science(&self, message: &WhatsAppMessage, topic: &str) -> Result<()> {
        if topic.is_empty() {
            return self.reply(message, "Usage: !science <topic>").await;
        }
        if !self.ai.is_enabled() {
            return self.reply(message, &disabled_reply("science briefs")).await;
        }

        self.react(message, "🧪").await;
        match generate_science_brief(topic, self.ai.as_ref()).await {
            Ok(brief) => {
                self.whatsapp.send_message(&message.from, &brief).await?;
                self.react(message, "✅").await;
            }
            Err(e) if is_configuration_error(&e) => {
                self.reply(message, &disabled_reply("science briefs")).await?;
            }
            Err(e) => {
                log::error!("❌ Failed to generate science brief: {}", e);
                self.react(message, "⚠️").await;
                self.reply(message, "I could not generate a science brief right now. Please try again soon.").await?;
            }
        }
        Ok(())
    }

    async fn handle_calories(&self, message: &WhatsAppMessage, caption: &str) -> Result<()> {
        if !self.ai.is_enabled() {
            return self.reply(message, &disabled_reply("calorie estimation")).await;
        }

        self.react(message, "🍽️").await;
        if let Err(e) = self.estimate_and_log(message, caption).await {
            if is_configuration_error(&e) {
                return self.reply(message, &disabled_reply("calorie estimation")).await;
            }
            log::error!("❌ Failed to estimate calories: {}", e);
            self.react(message, "⚠️").await;
            self.reply(message, "I could not estimate calories right now. Please try again soon.").await?;
        }
        Ok(())
    }

    async fn estimate_and_log(&self, message: &WhatsAppMessage, caption: &str) -> Result<()> {
        let Some(media_url) = message.media_url.as_deref() else {
            return self.reply(message, "Attach a plate photo with the caption \"!calories <items>\".").await;
        };

        let media = self.whatsapp.download_media(media_url).await?;
        if !is_image_mime(&media.mime_type) {
            return self.reply(message, "Attach a plate photo with the caption \"!calories <items>\".").await;
        }

        let slug = message_slug(&message.id, message.timestamp);
        let saved_path = persist_media(&self.downloads_dir, &media, &slug).await?;

        let image = ImageInput {
            path: Some(saved_path.clone()),
            base64_data: Some(general_purpose::STANDARD.encode(&media.data)),
            mime_type: Some(media.mime_type.clone()),
            url: None,
        };

        let Some(estimate) = estimate_plate_calories(image, caption, self.ai.as_ref()).await? else {
            self.react(message, "⚠️").await;
            return self
                .reply(message, "Could not estimate calories reliably from this photo. Try a clearer image and caption.")
                .await;
        };

        let entry = MealLogEntry {
            ts: Utc::now().timestamp_millis(),
            caption: caption.to_string(),
            estimate: estimate.clone(),
            image_path: saved_path.display().to_string(),
        };
        if let Err(e) = self.meal_log.append(&message.from, &entry).await {
            log::error!("❌ Failed to append meal log: {}", e);
        }

        self.whatsapp
            .send_message(&message.from, &render_calorie_estimate(&estimate))
            .await?;
        self.react(message, "✅").await;
        Ok(())
    }

    async fn handle_summary(&self, chat_id: &str, preference: Option<String>) -> Result<()> {
        if !self.ai.is_enabled() {
            return self.whatsapp.send_message(chat_id, &disabled_reply("chat summaries")).await;
        }

        let options = SummaryOptions {
            preference,
            ..Default::default()
        };
        summarize_recent_chat(chat_id, options, self.whatsapp.as_ref(), self.ai.as_ref()).await
    }

    /// Saves any media message and captions images. Failures are only logged.
    async fn handle_media(&self, message: &WhatsAppMessage) {
        let Some(media_url) = message.media_url.as_deref() else {
            log::warn!("⚠️ Media flag set but no media URL on message {}", message.id);
            return;
        };

        let media = match self.whatsapp.download_media(media_url).await {
            Ok(media) => media,
            Err(e) => {
                log::error!("❌ Error handling media message: {}", e);
                return;
            }
        };

        let slug = message_slug(&message.id, message.timestamp);
        match persist_media(&self.downloads_dir, &media, &slug).await {
            Ok(path) => log::info!("💾 Saved media from message {} to {}", message.id, path.display()),
            Err(e) => {
                log::error!("❌ Error handling media message: {}", e);
                return;
            }
        }

        if !is_image_mime(&media.mime_type) || !self.ai.is_enabled() {
            return;
        }

        let request = VisionRequest {
            image: ImageInput::from_base64(general_purpose::STANDARD.encode(&media.data), media.mime_type.clone()),
            ..Default::default()
        };
        match self.ai.describe_image(request).await {
            Ok(caption) => {
                let text = format!("🖼️ Caption: {}", caption);
                if let Err(e) = self.whatsapp.send_message(&message.from, &text).await {
                    log::error!("❌ Failed to send image caption: {}", e);
                }
            }
            Err(e) => log::error!("❌ Failed to caption image via OpenRouter: {}", e),
        }
    }

    /// Sends the startup notices to `chat_id`, then a summary of that chat.
    pub async fn announce_startup(&self, chat_id: &str) -> Result<()> {
        for ordinal in 1..=STARTUP_MESSAGE_COUNT {
            let payload = format!("{}. Test message {}.", STARTUP_MESSAGE_PREFIX, ordinal);
            match self.whatsapp.send_message(chat_id, &payload).await {
                Ok(()) => log::info!("📨 Sent initial message to {}: \"{}\"", chat_id, payload),
                Err(e) => log::error!("❌ Failed to send initial message to {}: {}", chat_id, e),
            }
        }

        summarize_recent_chat(chat_id, SummaryOptions::default(), self.whatsapp.as_ref(), self.ai.as_ref()).await
    }

    async fn reply(&self, message: &WhatsAppMessage, text: &str) -> Result<()> {
        self.whatsapp.send_message(&message.from, text).await
    }

    async fn react(&self, message: &WhatsAppMessage, emoji: &str) {
        if let Err(e) = self.whatsapp.react(&message.from, &message.id, emoji).await {
            log::warn!("⚠️ Failed to react to {}: {}", message.id, e);
        }
    }
}
