//! Turns raw model output into a validated [`SlidePlan`].
//!
//! Models wrap JSON in Markdown fences or chatter around it often enough that
//! the parser first cuts the text down to the outermost `{ ... }` before
//! handing it to `serde_json`. Missing fields are filled in; a missing or empty
//! `slides` array is an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::core::models::{SlideEntry, SlideKind, SlidePlan};
use crate::errors::GenerationError;

pub const DEFAULT_PLAN_TITLE: &str = "Generated Presentation";
pub const DEFAULT_CONTENT_POINT: &str = "Main point for this slide";

/// Upper bound on slides taken from one response.
pub const MAX_SLIDES: usize = 30;

const PREVIEW_CHARS: usize = 100;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[A-Za-z0-9_-]*").expect("static regex compile"));

pub fn parse_slide_plan(response: &str) -> Result<SlidePlan, GenerationError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::InvalidLlmResponse(
            "Empty response from LLM".to_string(),
        ));
    }

    let cleaned = FENCE_RE.replace_all(trimmed, "");
    let json_text = outer_object(&cleaned).ok_or_else(|| {
        GenerationError::InvalidLlmResponse(format!(
            "No JSON object in LLM response. Response started with: {}",
            preview(trimmed)
        ))
    })?;

    let value: Value = serde_json::from_str(json_text).map_err(|e| {
        GenerationError::InvalidLlmResponse(format!(
            "Invalid JSON from LLM ({e}). Response started with: {}",
            preview(trimmed)
        ))
    })?;

    let Some(object) = value.as_object() else {
        return Err(GenerationError::InvalidLlmResponse(
            "Response is not a JSON object".to_string(),
        ));
    };

    let Some(slides_value) = object.get("slides") else {
        return Err(GenerationError::InvalidLlmResponse(
            "No 'slides' key found in response".to_string(),
        ));
    };

    let slides = slides_value
        .as_array()
        .filter(|slides| !slides.is_empty())
        .ok_or_else(|| {
            GenerationError::InvalidLlmResponse("'slides' must be a non-empty array".to_string())
        })?;

    if slides.len() > MAX_SLIDES {
        info!(
            "LLM returned {} slides, keeping the first {}",
            slides.len(),
            MAX_SLIDES
        );
    }

    let entries = slides
        .iter()
        .take(MAX_SLIDES)
        .enumerate()
        .map(|(i, slide)| slide_from_value(i, slide))
        .collect::<Result<Vec<_>, _>>()?;

    let title = text_field(object, "title").unwrap_or_else(|| DEFAULT_PLAN_TITLE.to_string());

    debug!("Parsed slide plan '{}' with {} slides", title, entries.len());

    Ok(SlidePlan {
        title,
        slides: entries,
    })
}

/// Slice from the first `{` to the last `}`, inclusive.
fn outer_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    let cut: String = text.chars().take(PREVIEW_CHARS).collect();
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        cut
    }
}

fn slide_from_value(index: usize, value: &Value) -> Result<SlideEntry, GenerationError> {
    let number = index + 1;
    let Some(object) = value.as_object() else {
        return Err(GenerationError::InvalidLlmResponse(format!(
            "Slide {number} is not a JSON object"
        )));
    };

    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .map(SlideKind::from_label)
        .unwrap_or_default();

    let mut content = content_items(object.get("content"));
    if kind == SlideKind::Content && content.is_empty() {
        content.push(DEFAULT_CONTENT_POINT.to_string());
    }

    Ok(SlideEntry {
        kind,
        title: text_field(object, "title").unwrap_or_else(|| format!("Slide {number}")),
        subtitle: text_field(object, "subtitle"),
        content,
        speaker_notes: Some(
            text_field(object, "speaker_notes")
                .unwrap_or_else(|| format!("Notes for slide {number}")),
        ),
    })
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Accepts either a JSON array of points or a single newline-separated string.
fn content_items(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(strip_bullet(s)),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .lines()
            .map(strip_bullet)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn strip_bullet(line: &str) -> String {
    line.trim()
        .trim_start_matches(['-', '*', '•'])
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outer_object_strips_surrounding_chatter() {
        assert_eq!(
            outer_object("Sure! {\"a\": {\"b\": 1}} Hope this helps"),
            Some("{\"a\": {\"b\": 1}}")
        );
        assert_eq!(outer_object("no json here"), None);
        assert_eq!(outer_object("} backwards {"), None);
    }

    #[test]
    fn test_content_items_from_string_strips_bullets() {
        let value = Value::String("- first\n* second\n\n• third".to_string());
        assert_eq!(
            content_items(Some(&value)),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "a".repeat(150);
        assert_eq!(preview(&long).len(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
