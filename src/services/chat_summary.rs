use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::models::TranscriptMessage;
use crate::services::ai_service::CompletionClient;
use crate::services::WhatsAppService;

pub const SUMMARY_SYSTEM_PROMPT: &str = "Write a short WhatsApp recap of the last 24 hours of chat.
Be accurate, not speculative. Optimize for what to do next.
Constraints:
* Keep under ~1200 characters.
* No invented facts. If unclear, say \"not specified\".
* Action items max 5 bullets. Open questions max 3 bullets.
* Use simple WhatsApp formatting (short lines).
Safety:
* If urgent issues appeared, flag as \"Needs medical attention\" in open questions/action items without diagnosing.";

const SUMMARY_PROMPT_TEMPLATE: &str = "Summarize:
Overview (2–3 lines)
Action items (max 5 bullets, owner if clear)
Open questions (max 3 bullets)

Transcript:
{{TRANSCRIPT}}";

pub const NO_MESSAGES_REPLY: &str = "ℹ️ No messages from the last 24 hours to summarize.";
pub const SUMMARY_FAILED_REPLY: &str = "⚠️ Unable to generate the chat summary right now. Please try again later.";

const DEFAULT_MAX_MESSAGES: usize = 50;
const MAX_PROMPT_CHARS: usize = 9_000;

pub struct SummaryOptions {
    pub lookback: Duration,
    pub max_messages: usize,
    pub preference: Option<String>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            lookback: Duration::hours(24),
            max_messages: DEFAULT_MAX_MESSAGES,
            preference: None,
        }
    }
}

/// Summarizes the recent history of `chat_id` and sends the result (or a
/// fallback notice) back to the same chat.
pub async fn summarize_recent_chat(
    chat_id: &str,
    options: SummaryOptions,
    whatsapp: &dyn WhatsAppService,
    client: &dyn CompletionClient,
) -> Result<()> {
    if !client.is_enabled() {
        log::warn!("⚠️ OpenRouter client disabled. Skipping chat summary.");
        return Ok(());
    }

    let reply = match build_summary(chat_id, &options, whatsapp, client).await {
        Ok(Some(summary)) => format!("📝 *Last 24h Summary*\n{}", summary.trim()),
        Ok(None) => NO_MESSAGES_REPLY.to_string(),
        Err(e) => {
            log::error!("❌ Failed to summarize chat {}: {}", chat_id, e);
            SUMMARY_FAILED_REPLY.to_string()
        }
    };

    whatsapp.send_message(chat_id, &reply).await
}

async fn build_summary(
    chat_id: &str,
    options: &SummaryOptions,
    whatsapp: &dyn WhatsAppService,
    client: &dyn CompletionClient,
) -> Result<Option<String>> {
    let history = whatsapp.fetch_recent_messages(chat_id, options.max_messages).await?;
    let recent = select_recent(history, Utc::now() - options.lookback);

    if recent.is_empty() {
        return Ok(None);
    }

    let transcript = build_transcript(&recent);
    let prompt = build_summary_prompt(&transcript, options.preference.as_deref());
    let summary = client.generate_text(&prompt, Some(SUMMARY_SYSTEM_PROMPT)).await?;

    Ok(Some(summary))
}

/// Keeps timestamped messages newer than `cutoff`, oldest first.
pub fn select_recent(messages: Vec<TranscriptMessage>, cutoff: DateTime<Utc>) -> Vec<TranscriptMessage> {
    let mut recent: Vec<TranscriptMessage> = messages
        .into_iter()
        .filter(|m| m.timestamp.map_or(false, |ts| ts >= cutoff))
        .collect();
    recent.sort_by_key(|m| m.timestamp);
    recent
}

pub fn build_transcript(messages: &[TranscriptMessage]) -> String {
    let transcript = messages
        .iter()
        .map(|message| {
            let timestamp = message
                .timestamp
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_else(|| "unknown-time".to_string());
            format!("[{}] {}: {}", timestamp, author_label(message), message_body(message))
        })
        .collect::<Vec<_>>()
        .join("\n");

    let total = transcript.chars().count();
    if total <= MAX_PROMPT_CHARS {
        return transcript;
    }

    // keep the newest part of the conversation
    transcript.chars().skip(total - MAX_PROMPT_CHARS).collect()
}

pub fn build_summary_prompt(transcript: &str, preference: Option<&str>) -> String {
    let prompt = SUMMARY_PROMPT_TEMPLATE.replace("{{TRANSCRIPT}}", transcript);
    match preference.map(str::trim).filter(|p| !p.is_empty()) {
        Some(pref) => format!("Summary preference: {}\n\n{}", pref, prompt),
        None => prompt,
    }
}

fn author_label(message: &TranscriptMessage) -> &str {
    if message.from_me {
        return "Me";
    }
    message
        .author
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or("Contact")
}

fn message_body(message: &TranscriptMessage) -> String {
    let collapsed = message.body.split_whitespace().collect::<Vec<_>>().join(" ");
    if !collapsed.is_empty() {
        collapsed
    } else if message.has_media {
        "[media message]".to_string()
    } else {
        "[no text]".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DownloadedMedia;
    use crate::services::ai_service::{CompletionError, VisionRequest};
    use std::sync::Mutex;

    fn message(minutes_ago: i64, author: &str, body: &str) -> TranscriptMessage {
        TranscriptMessage {
            timestamp: Some(Utc::now() - Duration::minutes(minutes_ago)),
            author: Some(author.to_string()),
            body: body.to_string(),
            has_media: false,
            from_me: false,
        }
    }

    struct History {
        messages: Vec<TranscriptMessage>,
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl WhatsAppService for History {
        async fn send_message(&self, to: &str, message: &str) -> Result<()> {
            self.sent.lock().unwrap().push((to.to_string(), message.to_string()));
            Ok(())
        }

        async fn download_media(&self, _media_url: &str) -> Result<DownloadedMedia> {
            anyhow::bail!("no media")
        }

        async fn fetch_recent_messages(&self, _chat_id: &str, _limit: usize) -> Result<Vec<TranscriptMessage>> {
            Ok(self.messages.clone())
        }
    }

    struct PromptRecorder {
        reply: Result<String, ()>,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl CompletionClient for PromptRecorder {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn generate_text(&self, prompt: &str, _system: Option<&str>) -> Result<String, CompletionError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(|_| CompletionError::EmptyResponse)
        }

        async fn describe_image(&self, _request: VisionRequest) -> Result<String, CompletionError> {
            Err(CompletionError::EmptyResponse)
        }
    }

    #[test]
    fn test_transcript_lines_and_labels() {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T08:00:00Z").unwrap().with_timezone(&Utc);
        let messages = vec![
            TranscriptMessage {
                timestamp: Some(ts),
                author: Some("Ayla".to_string()),
                body: "  ran   5k\n today ".to_string(),
                has_media: false,
                from_me: false,
            },
            TranscriptMessage {
                timestamp: Some(ts),
                author: Some("bot".to_string()),
                body: String::new(),
                has_media: true,
                from_me: true,
            },
            TranscriptMessage {
                timestamp: None,
                author: None,
                body: String::new(),
                has_media: false,
                from_me: false,
            },
        ];

        let transcript = build_transcript(&messages);

        assert_eq!(
            transcript,
            "[2024-05-01T08:00:00.000Z] Ayla: ran 5k today\n\
             [2024-05-01T08:00:00.000Z] Me: [media message]\n\
             [unknown-time] Contact: [no text]"
        );
    }

    #[test]
    fn test_long_transcript_keeps_the_tail() {
        let messages: Vec<_> = (0..400).map(|i| message(400 - i, "A", &format!("message number {}", i))).collect();

        let transcript = build_transcript(&messages);

        assert_eq!(transcript.chars().count(), MAX_PROMPT_CHARS);
        assert!(transcript.ends_with("message number 399"));
    }

    #[test]
    fn test_select_recent_drops_old_and_untimed_and_sorts() {
        let mut untimed = message(0, "A", "no time");
        untimed.timestamp = None;
        let messages = vec![message(5, "A", "newer"), message(60 * 30, "A", "too old"), untimed, message(90, "A", "older")];

        let recent = select_recent(messages, Utc::now() - Duration::hours(24));

        let bodies: Vec<_> = recent.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["older", "newer"]);
    }

    #[test]
    fn test_prompt_contains_transcript_and_preference() {
        let prompt = build_summary_prompt("[t] A: hi", Some(" bullets only "));

        assert!(prompt.starts_with("Summary preference: bullets only\n\n"));
        assert!(prompt.ends_with("Transcript:\n[t] A: hi"));
        assert!(!prompt.contains("{{TRANSCRIPT}}"));
    }

    #[tokio::test]
    async fn test_summary_is_sent_to_the_chat() {
        let whatsapp = History {
            messages: vec![message(10, "Ayla", "protein goal?")],
            sent: Mutex::new(Vec::new()),
        };
        let client = PromptRecorder {
            reply: Ok("  Overview: protein talk  ".to_string()),
            prompts: Mutex::new(Vec::new()),
        };

        summarize_recent_chat("+1", SummaryOptions::default(), &whatsapp, &client).await.unwrap();

        let sent = whatsapp.sent.lock().unwrap();
        assert_eq!(sent[0], ("+1".to_string(), "📝 *Last 24h Summary*\nOverview: protein talk".to_string()));
        assert!(client.prompts.lock().unwrap()[0].contains("Ayla: protein goal?"));
    }

    #[tokio::test]
    async fn test_empty_history_and_failures_get_notices() {
        let whatsapp = History {
            messages: Vec::new(),
            sent: Mutex::new(Vec::new()),
        };
        let client = PromptRecorder {
            reply: Err(()),
            prompts: Mutex::new(Vec::new()),
        };
        summarize_recent_chat("+1", SummaryOptions::default(), &whatsapp, &client).await.unwrap();
        assert_eq!(whatsapp.sent.lock().unwrap()[0].1, NO_MESSAGES_REPLY);

        let whatsapp = History {
            messages: vec![message(1, "A", "hi")],
            sent: Mutex::new(Vec::new()),
        };
        summarize_recent_chat("+1", SummaryOptions::default(), &whatsapp, &client).await.unwrap();
        assert_eq!(whatsapp.sent.lock().unwrap()[0].1, SUMMARY_FAILED_REPLY);
    }
}
