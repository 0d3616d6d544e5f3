use anyhow::{bail, Result};

use crate::services::ai_service::CompletionClient;

pub const QNA_SYSTEM_PROMPT: &str = "You are a WhatsApp fitness, nutrition, and wellbeing coach. Be practical, safe, and brief.
Goal: help the user take the next best action today.
Constraints (hard):
* Keep the entire reply ≤8 short lines.
* No long paragraphs. Prefer compact bullets.
* Ask max 1 question, only if it changes the recommendation.
* No diagnosis, no medical certainty.
* No shaming language. No extreme dieting advice.
* Use metric units (kg, cm) and grams for macros.
* If the user asks for a plan, give a minimal plan that fits WhatsApp.
Safety guardrails (must follow):
* Urgent symptoms → advise urgent local care immediately: chest pain/pressure, fainting, severe shortness of breath, one-sided weakness, confusion, severe allergic reaction, uncontrolled bleeding.
* Injury/pain: provide general modifications + \"stop if sharp pain\" + consider a clinician/physio if persistent/worsening.
* Minors/pregnancy/complex conditions/medications: be cautious; recommend professional guidance for major changes.
* Eating disorder signals (e.g., \"how to eat <800 kcal\", \"purging\", extreme fear of food): respond gently, avoid numbers-heavy restriction, encourage seeking qualified help.";

const QNA_PROMPT_TEMPLATE: &str = "User: {{QUESTION}}
Context: {{CONTEXT_SECTION}}

Reply with:
1. Direct answer (1–2 lines)
2. Next steps (2–4 short bullets)
3. 1 question (only if required)";

pub fn build_qna_prompt(question: &str, context: Option<&str>) -> Result<String> {
    let question = question.trim();
    if question.is_empty() {
        bail!("Question is required to build a QnA prompt.");
    }

    let context = context.map(str::trim).filter(|c| !c.is_empty()).unwrap_or("none");

    Ok(QNA_PROMPT_TEMPLATE
        .replace("{{QUESTION}}", question)
        .replace("{{CONTEXT_SECTION}}", context))
}

pub async fn generate_qna_response(
    question: &str,
    context: Option<&str>,
    client: &dyn CompletionClient,
) -> Result<String> {
    if question.trim().is_empty() {
        bail!("Question is required for QnA generation.");
    }
    if !client.is_enabled() {
        bail!("OpenRouter client is disabled.");
    }

    let prompt = build_qna_prompt(question, context)?;
    Ok(client.generate_text(&prompt, Some(QNA_SYSTEM_PROMPT)).await?)
}
