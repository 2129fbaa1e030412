//! Prompt construction for slide extraction.

use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content, MessageRole};

use crate::core::models::DEFAULT_TONE;
use crate::errors::GenerationError;

/// List of disallowed patterns in caller guidance (prompt injection protection)
pub const DISALLOWED_PATTERNS: [&str; 4] = ["system:", "assistant:", "user:", "{{"];

/// Maximum length allowed for caller guidance
pub const MAX_GUIDANCE_LENGTH: usize = 800;

/// Tone is a short label such as "professional" or "casual"
pub const MAX_TONE_LENGTH: usize = 40;

pub const DEFAULT_GUIDANCE: &str = "Standard presentation";

pub const SYSTEM_PROMPT: &str =
    "You are a JSON generator. Return only valid JSON, no other text.";

/// Sanitizes caller guidance to prevent prompt injection attacks
pub fn sanitize_guidance(guidance: &str) -> Result<String, GenerationError> {
    if guidance.chars().count() > MAX_GUIDANCE_LENGTH {
        return Err(GenerationError::InvalidRequest(format!(
            "Guidance exceeds maximum length of {MAX_GUIDANCE_LENGTH} characters"
        )));
    }

    let lowered = guidance.to_lowercase();
    for pattern in &DISALLOWED_PATTERNS {
        if lowered.contains(pattern) {
            return Err(GenerationError::InvalidRequest(format!(
                "Guidance contains disallowed pattern: {pattern}"
            )));
        }
    }

    Ok(guidance.chars().filter(|c| !c.is_control()).collect())
}

/// Remove control characters and hard-truncate; empty input falls back to the default tone.
#[must_use]
pub fn sanitize_tone(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_TONE_LENGTH)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        DEFAULT_TONE.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Cuts `text` to at most `max_chars` characters. Returns whether anything was dropped.
#[must_use]
pub fn truncate_input(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// Builds the chat transcript sent to every provider.
///
/// Guidance must already have gone through [`sanitize_guidance`].
#[must_use]
pub fn build_prompt(
    text: &str,
    guidance: Option<&str>,
    tone: &str,
    max_input_chars: usize,
) -> Vec<ChatCompletionMessage> {
    let (body, truncated) = truncate_input(text.trim(), max_input_chars);
    let ellipsis = if truncated { "..." } else { "" };
    let guidance = guidance
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .unwrap_or(DEFAULT_GUIDANCE);
    let tone = sanitize_tone(tone);

    let user_prompt = format!(
        r#"Convert this text into a presentation structure.

Text: {body}{ellipsis}

Guidance: {guidance}
Tone: {tone}

Respond with ONLY this JSON format (no other text):
{{
    "title": "Your presentation title here",
    "slides": [
        {{
            "type": "title",
            "title": "Main Title",
            "subtitle": "Subtitle if needed",
            "speaker_notes": "Introduction notes"
        }},
        {{
            "type": "section",
            "title": "Section Name",
            "subtitle": "Optional section subtitle",
            "speaker_notes": "Transition notes"
        }},
        {{
            "type": "content",
            "title": "First Topic",
            "content": ["Point 1", "Point 2", "Point 3"],
            "speaker_notes": "Explanation for this slide"
        }}
    ]
}}

Create 5-10 slides total. Return ONLY valid JSON."#
    );

    vec![
        ChatCompletionMessage {
            role: MessageRole::system,
            content: Content::Text(SYSTEM_PROMPT.to_string()),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        },
        ChatCompletionMessage {
            role: MessageRole::user,
            content: Content::Text(user_prompt),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        },
    ]
}

/// Concatenates the system messages of a transcript, for APIs that take the
/// system prompt as a separate field.
#[must_use]
pub fn system_text(prompt: &[ChatCompletionMessage]) -> String {
    prompt
        .iter()
        .filter(|m| matches!(m.role, MessageRole::system))
        .filter_map(|m| match &m.content {
            Content::Text(text) => Some(text.as_str()),
            Content::ImageUrl(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
