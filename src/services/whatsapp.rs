use anyhow::Result;

use crate::models::{DownloadedMedia, TranscriptMessage};

/// Outbound side of the WhatsApp transport.
#[async_trait::async_trait]
pub trait WhatsAppService: Send + Sync {
    async fn send_message(&self, to: &str, message: &str) -> Result<()>;

    async fn download_media(&self, media_url: &str) -> Result<DownloadedMedia>;

    /// React to a message with an emoji. Transports without reaction
    /// support only log it.
    async fn react(&self, to: &str, message_id: &str, emoji: &str) -> Result<()> {
        log::debug!("💬 Reaction {} on {} ({})", emoji, message_id, to);
        Ok(())
    }

    /// Most recent messages of a chat, newest or oldest first. Callers sort.
    async fn fetch_recent_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<TranscriptMessage>> {
        log::debug!("📜 History not available for {} (limit {})", chat_id, limit);
        Ok(Vec::new())
    }
}
