use anyhow::{bail, Result};

use crate::services::ai_service::CompletionClient;

pub const SCIENCE_SYSTEM_PROMPT: &str =
    "Summarize consensus of high-quality evidence (RCTs, meta-analyses). Avoid absolute claims. No magic hacks.";

const SCIENCE_PROMPT_TEMPLATE: &str = "
You are preparing a short science brief about **{{TOPIC}}**.

Requirements:
- Cite only high-quality evidence (RCTs, meta-analyses, umbrella reviews).
- Use neutral language, highlight consensus first, then unknowns.
- Output must use markdown with EXACTLY these sections and bullet counts.

Format:
## Evidence
- 2-3 concise bullets that summarize what studies show.

## Uncertainties
- 1-2 bullets on what remains unclear, conflicting, or under-studied.

## Practical Takeaways
- 3 numbered bullets with pragmatic guidance grounded in the evidence.
";

pub fn build_science_brief_prompt(topic: &str) -> Result<String> {
    let topic = topic.trim();
    if topic.is_empty() {
        bail!("Topic is required to build a science brief prompt.");
    }
    Ok(SCIENCE_PROMPT_TEMPLATE.replace("{{TOPIC}}", topic))
}

pub async fn generate_science_brief(topic: &str, client: &dyn CompletionClient) -> Result<String> {
    let topic = topic.trim();
    if topic.is_empty() {
        bail!("Topic is required for science brief generation.");
    }
    if !client.is_enabled() {
        bail!("OpenRouter client is disabled.");
    }

    let prompt = build_science_brief_prompt(topic)?;
    log::info!("🧪 Requesting science brief for topic: {}", topic);
    Ok(client.generate_text(&prompt, Some(SCIENCE_SYSTEM_PROMPT)).await?)
}
