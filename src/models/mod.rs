use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Calorie and macro ranges extracted from a model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalorieEstimate {
    pub kcal_low: f64,
    pub kcal_high: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub notes: String,
}

/// Image handed to a vision request. Every field is optional; the first
/// non-empty one in priority order (base64, url, path) wins.
#[derive(Debug, Clone, Default)]
pub struct ImageInput {
    pub path: Option<PathBuf>,
    pub base64_data: Option<String>,
    pub mime_type: Option<String>,
    pub url: Option<String>,
}

impl ImageInput {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn from_base64(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            base64_data: Some(data.into()),
            mime_type: Some(mime_type.into()),
            ..Default::default()
        }
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealLogEntry {
    /// Epoch milliseconds
    pub ts: i64,
    pub caption: String,
    pub estimate: CalorieEstimate,
    #[serde(rename = "imagePath")]
    pub image_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealLog {
    pub meals: Vec<MealLogEntry>,
}

/// Inbound chat event as delivered by the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppMessage {
    pub id: String,
    pub from: String,
    pub body: String,
    pub has_media: bool,
    pub media_url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl WhatsAppMessage {
    pub fn text(id: &str, from: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            from: from.to_string(),
            body: body.to_string(),
            has_media: false,
            media_url: None,
            timestamp: Some(Utc::now()),
        }
    }

    pub fn with_media(id: &str, from: &str, caption: &str, media_url: &str) -> Self {
        Self {
            has_media: true,
            media_url: Some(media_url.to_string()),
            ..Self::text(id, from, caption)
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadedMedia {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub filename: Option<String>,
}

/// One line of chat history fed into the summary prompt.
#[derive(Debug, Clone)]
pub struct TranscriptMessage {
    pub timestamp: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub body: String,
    pub has_media: bool,
    pub from_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub config: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
