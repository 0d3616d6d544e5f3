//! Plate calorie estimation: prompt, one vision completion, tolerant JSON parsing.
//!
//! The model is asked for a single JSON object
//! `{ kcal_low, kcal_high, protein_g, carbs_g, fat_g, notes }` and the parser
//! reads exactly that shape.

use serde_json::Value;

use crate::models::{CalorieEstimate, ImageInput};
use crate::services::ai_service::{CompletionClient, CompletionError, VisionRequest};

pub const CALORIE_SYSTEM_PROMPT: &str = "You are a nutrition assistant. Output only JSON.";
const CALORIE_TEMPERATURE: f32 = 0.1;
const CALORIE_MAX_TOKENS: u32 = 600;

pub fn build_calorie_prompt(caption: &str) -> String {
    let caption = caption.trim();

    let mut lines = vec![
        "Analyze the food on the plate and estimate realistic calories and macros.".to_string(),
        "Infer portion sizes from the image and the caption context.".to_string(),
        "Use ranges, not single numbers.".to_string(),
        "Explicitly label uncertainty in notes.".to_string(),
        "Output only JSON with keys { kcal_low, kcal_high, protein_g, carbs_g, fat_g, notes }.".to_string(),
        "Do not include any text outside the JSON object.".to_string(),
    ];
    if !caption.is_empty() {
        lines.push(format!("Caption: {}", caption));
    }

    lines.join("\n")
}

/// Finite numbers pass through; strings keep only `[0-9.-]` and are read like
/// JavaScript's `parseFloat`. Anything else is 0.
fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Some(Value::String(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            parse_float_prefix(&cleaned).unwrap_or(0.0)
        }
        _ => 0.0,
    }
}

/// Longest leading `-?digits[.digits]` prefix, e.g. "300-450" -> 300, "1.2.3" -> 1.2.
fn parse_float_prefix(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let mut end = 0;

    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    s[..end]
        .trim_end_matches('.')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Extracts the estimate from raw completion text. `None` is a normal
/// outcome: no JSON, or nothing but zeros.
pub fn try_parse_estimate(text: &str) -> Option<CalorieEstimate> {
    let trimmed = text.trim();
    let candidate = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    };

    let raw: Value = match serde_json::from_str(candidate) {
        Ok(raw) => raw,
        Err(e) => {
            log::debug!("Calorie reply is not JSON: {}", e);
            return None;
        }
    };

    let estimate = CalorieEstimate {
        kcal_low: coerce_number(raw.get("kcal_low")),
        kcal_high: coerce_number(raw.get("kcal_high")),
        protein_g: coerce_number(raw.get("protein_g")),
        carbs_g: coerce_number(raw.get("carbs_g")),
        fat_g: coerce_number(raw.get("fat_g")),
        notes: raw
            .get("notes")
            .and_then(Value::as_str)
            .map(|notes| notes.trim().to_string())
            .unwrap_or_default(),
    };

    let all_zero = [
        estimate.kcal_low,
        estimate.kcal_high,
        estimate.protein_g,
        estimate.carbs_g,
        estimate.fat_g,
    ]
    .iter()
    .all(|v| *v == 0.0);

    if all_zero {
        log::warn!("Calorie reply parsed but every value is zero");
        return None;
    }

    Some(estimate)
}

/// JavaScript `Math.round`: halves go toward positive infinity.
fn round_half_up(value: f64) -> i64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor as i64 + 1
    } else {
        floor as i64
    }
}

pub fn render_calorie_estimate(estimate: &CalorieEstimate) -> String {
    let mut lines = vec![
        format!(
            "Calories: {}–{} kcal",
            round_half_up(estimate.kcal_low),
            round_half_up(estimate.kcal_high)
        ),
        format!(
            "Macros: {} g protein, {} g carbs, {} g fat",
            round_half_up(estimate.protein_g),
            round_half_up(estimate.carbs_g),
            round_half_up(estimate.fat_g)
        ),
    ];
    if !estimate.notes.is_empty() {
        lines.push(format!("Notes: {}", estimate.notes));
    }
    lines.join("\n")
}

/// Builds the prompt, performs one vision completion and parses the reply.
///
/// Errors are transport, configuration or image I/O faults; `Ok(None)` means
/// the model answered but no usable estimate could be read from it.
pub async fn estimate_plate_calories(
    image: ImageInput,
    caption: &str,
    client: &dyn CompletionClient,
) -> Result<Option<CalorieEstimate>, CompletionError> {
    let instruction = build_calorie_prompt(caption);

    let raw = client
        .describe_image(VisionRequest {
            image,
            instruction: Some(instruction),
            system: Some(CALORIE_SYSTEM_PROMPT.to_string()),
            temperature: Some(CALORIE_TEMPERATURE),
            max_tokens: Some(CALORIE_MAX_TOKENS),
        })
        .await?;

    Ok(try_parse_estimate(&raw))
}
