use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::WhatsAppService;
use crate::config::BirdConfig;
use crate::models::{DownloadedMedia, TranscriptMessage};

const BIRD_API_BASE: &str = "https://api.bird.com";

/// Bird.com (MessageBird) WhatsApp Business API client
pub struct BirdComClient {
    api_key: String,
    workspace_id: String,
    channel_id: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct BirdMessage {
    receiver: Receiver,
    body: Body,
}

#[derive(Serialize)]
struct Receiver {
    contacts: Vec<Contact>,
}

#[derive(Serialize)]
struct Contact {
    #[serde(rename = "identifierValue")]
    identifier_value: String,
}

#[derive(Serialize)]
struct Body {
    #[serde(rename = "type")]
    msg_type: String,
    text: TextContent,
}

#[derive(Serialize)]
struct TextContent {
    text: String,
}

#[derive(Deserialize)]
struct BirdResponse {
    id: String,
}

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    results: Vec<Value>,
}

impl BirdComClient {
    pub fn new(api_key: String, workspace_id: String, channel_id: String) -> Self {
        Self {
            api_key,
            workspace_id,
            channel_id,
            base_url: BIRD_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &BirdConfig) -> Self {
        Self::new(
            config.api_key.clone(),
            config.workspace_id.clone(),
            config.channel_id.clone(),
        )
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/workspaces/{}{}", self.base_url, self.workspace_id, path)
    }

    fn auth_header(&self) -> String {
        format!("AccessKey {}", self.api_key)
    }
}

#[async_trait::async_trait]
impl WhatsAppService for BirdComClient {
    async fn send_message(&self, to: &str, message: &str) -> Result<()> {
        let url = self.api_url(&format!("/channels/{}/messages", self.channel_id));

        let payload = BirdMessage {
            receiver: Receiver {
                contacts: vec![Contact {
                    identifier_value: to.to_string(),
                }],
            },
            body: Body {
                msg_type: "text".to_string(),
                text: TextContent {
                    text: message.to_string(),
                },
            },
        };

        log::debug!("🔍 Sending to URL: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            anyhow::bail!("Bird.com API error ({}): {}", status, response_text);
        }

        let result: BirdResponse = serde_json::from_str(&response_text)?;
        log::info!("📤 OUTGOING MESSAGE - To: {} | Message ID: {} | Content: '{}'",
                   to, result.id, message);

        Ok(())
    }

    async fn download_media(&self, media_url: &str) -> Result<DownloadedMedia> {
        log::info!("📥 Downloading media from Bird.com: {}", media_url);

        let response = self
            .client
            .get(media_url)
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            anyhow::bail!("Bird.com media download error ({}): {}", status, error_text);
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let data = response.bytes().await?.to_vec();
        log::info!("✅ Media downloaded: {} bytes ({})", data.len(), mime_type);

        Ok(DownloadedMedia {
            data,
            mime_type,
            filename: None,
        })
    }

    async fn fetch_recent_messages(&self, chat_id: &str, limit: usize) -> Result<Vec<TranscriptMessage>> {
        let url = self.api_url(&format!("/channels/{}/messages", self.channel_id));

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit.to_string())])
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("Bird.com API error ({}): {}", status, response_text);
        }

        let list: MessageList = serde_json::from_str(&response_text)?;
        let messages = list
            .results
            .iter()
            .filter_map(|item| transcript_entry(item, chat_id))
            .take(limit)
            .collect();

        Ok(messages)
    }
}

/// Maps one Bird message resource to a transcript line when it belongs to `chat_id`.
fn transcript_entry(item: &Value, chat_id: &str) -> Option<TranscriptMessage> {
    let outgoing = item["direction"].as_str() == Some("outgoing");

    let contact = if outgoing {
        item["receiver"]["contacts"][0]["identifierValue"].as_str()
    } else {
        item["sender"]["contact"]["identifierValue"].as_str()
    }?;
    if contact != chat_id {
        return None;
    }

    let body = &item["body"];
    let msg_type = body["type"].as_str().unwrap_or_default();
    let text = match msg_type {
        "text" => body["text"]["text"].as_str().unwrap_or_default().to_string(),
        "image" => body["image"]["caption"].as_str().unwrap_or_default().to_string(),
        _ => String::new(),
    };

    let author = if outgoing {
        None
    } else {
        item["sender"]["contact"]["annotations"]["name"]
            .as_str()
            .map(str::to_string)
            .or_else(|| Some(contact.to_string()))
    };

    let timestamp = item["createdAt"]
        .as_str()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc));

    Some(TranscriptMessage {
        timestamp,
        author,
        body: text,
        has_media: !matches!(msg_type, "text" | ""),
        from_me: outgoing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client() -> BirdComClient {
        BirdComClient::new(
            "test_key".to_string(),
            "workspace_123".to_string(),
            "channel_456".to_string(),
        )
    }

    #[test]
    fn test_bird_client_creation() {
        let client = client();

        assert_eq!(client.workspace_id, "workspace_123");
        assert_eq!(client.channel_id, "channel_456");
    }

    #[test]
    fn test_api_url_generation() {
        let client = client();

        let url = client.api_url("/channels/channel_456/messages");
        assert_eq!(url, "https://api.bird.com/workspaces/workspace_123/channels/channel_456/messages");
    }

    #[tokio::test]
    async fn test_send_message_posts_text_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/workspaces/workspace_123/channels/channel_456/messages")
                .header("Authorization", "AccessKey test_key")
                .json_body(json!({
                    "receiver": { "contacts": [{ "identifierValue": "+905551234567" }] },
                    "body": { "type": "text", "text": { "text": "hello" } }
                }));
            then.status(202).json_body(json!({ "id": "msg-1" }));
        });

        let client = client().with_base_url(server.base_url());
        client.send_message("+905551234567", "hello").await.unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn test_send_message_surfaces_api_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(422).body("invalid receiver");
        });

        let client = client().with_base_url(server.base_url());
        let err = client.send_message("nobody", "hi").await.unwrap_err();

        assert!(err.to_string().contains("invalid receiver"));
    }

    #[tokio::test]
    async fn test_download_media_reads_content_type() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/media/plate");
            then.status(200)
                .header("Content-Type", "image/png; charset=binary")
                .body(b"png".to_vec());
        });

        let client = client();
        let media = client.download_media(&server.url("/media/plate")).await.unwrap();

        assert_eq!(media.mime_type, "image/png");
        assert_eq!(media.data, b"png");
    }

    #[tokio::test]
    async fn test_fetch_recent_messages_filters_by_contact() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/workspaces/workspace_123/channels/channel_456/messages")
                .query_param("limit", "50");
            then.status(200).json_body(json!({
                "results": [
                    {
                        "direction": "incoming",
                        "sender": { "contact": { "identifierValue": "+1", "annotations": { "name": "Ayla" } } },
                        "body": { "type": "text", "text": { "text": "lunch was pasta" } },
                        "createdAt": "2024-05-01T12:00:00Z"
                    },
                    {
                        "direction": "outgoing",
                        "receiver": { "contacts": [{ "identifierValue": "+1" }] },
                        "body": { "type": "text", "text": { "text": "noted" } },
                        "createdAt": "2024-05-01T12:01:00Z"
                    },
                    {
                        "direction": "incoming",
                        "sender": { "contact": { "identifierValue": "+2" } },
                        "body": { "type": "text", "text": { "text": "other chat" } }
                    },
                    {
                        "direction": "incoming",
                        "sender": { "contact": { "identifierValue": "+1" } },
                        "body": { "type": "image", "image": { "images": [] } }
                    }
                ]
            }));
        });

        let client = client().with_base_url(server.base_url());
        let messages = client.fetch_recent_messages("+1", 50).await.unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].author.as_deref(), Some("Ayla"));
        assert_eq!(messages[0].body, "lunch was pasta");
        assert!(messages[1].from_me);
        assert!(messages[2].has_media);
        assert!(messages[2].timestamp.is_none());
    }
}
