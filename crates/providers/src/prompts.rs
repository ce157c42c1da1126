//! Instruction text sent to the model, and lenient parsing of what comes back.

use promptscaffold_core::{ClarifyingQuestion, Scaffold, SlotKey};
use tracing::debug;

/// Instruction for rewriting a prompt into a richer one.
pub fn enhance_instruction(prompt: &str, image_count: usize) -> String {
    let mut text = String::from(
        "You improve prompts for image generation models. Rewrite the prompt below into a \
         single detailed prompt covering subject, setting, artistic style, composition, \
         lighting, atmosphere and quality. Keep the user's intent and any details they gave. \
         Reply with the rewritten prompt only, as comma-separated phrases, no preamble.",
    );
    if image_count > 0 {
        text.push_str(&format!(
            "\nUse the {image_count} attached reference image(s) to inform style and content."
        ));
    }
    text.push_str("\n\nPrompt: ");
    text.push_str(prompt);
    text
}

/// Instruction for short additions the user might adopt.
pub fn suggestions_instruction(prompt: &str) -> String {
    format!(
        "Suggest up to 5 short phrases that would improve this image generation prompt. \
         Reply with a JSON array of strings and nothing else.\n\nPrompt: {prompt}"
    )
}

/// Instruction for one question per empty slot.
pub fn questions_instruction(scaffold: &Scaffold, empty: &[SlotKey]) -> String {
    let filled = scaffold
        .slots()
        .iter()
        .filter(|s| s.is_filled())
        .map(|s| format!("- {} ({}): {}", s.name, s.key.code(), s.content.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    let wanted = empty
        .iter()
        .map(|k| format!("- {} ({}): {}", k.name(), k.code(), k.hint()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "An image prompt is being built from these parts:\n{filled}\n\n\
         Ask one short question for each missing part below, with 3 to 4 short answer options.\n\
         {wanted}\n\n\
         Reply with a JSON array of objects shaped like \
         {{\"key\": \"<code>\", \"question\": \"...\", \"options\": [\"...\"]}} and nothing else."
    )
}

/// Clean up free-text model output: code fences and wrapping quotes go.
pub fn clean_text(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }
    text.trim_matches('"').trim().to_string()
}

/// The first balanced `[...]` in `s`, skipping brackets inside JSON strings.
pub fn extract_first_json_array(s: &str) -> Option<&str> {
    let start = s.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in s.bytes().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a JSON array of strings out of model output. Non-strings are skipped.
pub fn parse_string_list(raw: &str) -> Option<Vec<String>> {
    let array = extract_first_json_array(raw)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(array).ok()?;
    Some(
        values
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.trim().to_string()))
            .filter(|s| !s.is_empty())
            .collect(),
    )
}

/// Parse a JSON array of questions. Entries that don't fit, or that target a
/// slot outside `allowed`, are dropped.
pub fn parse_questions(raw: &str, allowed: &[SlotKey]) -> Option<Vec<ClarifyingQuestion>> {
    let array = extract_first_json_array(raw)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(array).ok()?;
    let total = values.len();
    let questions: Vec<ClarifyingQuestion> = values
        .into_iter()
        .filter_map(|v| serde_json::from_value::<ClarifyingQuestion>(v).ok())
        .filter(|q| allowed.contains(&q.key) && !q.question.trim().is_empty())
        .collect();
    if questions.len() < total {
        debug!(kept = questions.len(), total, "Dropped unusable clarifying questions");
    }
    Some(questions)
}
