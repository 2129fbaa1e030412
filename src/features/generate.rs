use tracing::{info, warn};

use crate::ai::client::{PlanRequest, SlidePlanner};
use crate::core::models::{GeneratedPresentation, GenerationRequest, SlidePlan, TemplateStyle};
use crate::errors::GenerationError;
use crate::pptx::{build_presentation, extract_style};

/// Longest slug taken from a plan title for the download name.
const MAX_FILE_STEM_CHARS: usize = 60;
const FALLBACK_FILE_STEM: &str = "presentation";

/// Reads a template's style off the async runtime.
///
/// # Errors
///
/// Returns `InvalidTemplate` when the bytes are not a readable presentation.
pub async fn analyze_template(template: Vec<u8>) -> Result<TemplateStyle, GenerationError> {
    tokio::task::spawn_blocking(move || extract_style(&template)).await?
}

/// Asks the planner for a slide outline without touching any template.
///
/// # Errors
///
/// Returns `InvalidRequest` for empty text and whatever the planner reports.
pub async fn plan_outline(
    planner: &dyn SlidePlanner,
    request: PlanRequest<'_>,
) -> Result<SlidePlan, GenerationError> {
    if request.text.trim().is_empty() {
        return Err(GenerationError::InvalidRequest(
            "Text is required".to_string(),
        ));
    }
    planner.plan(request).await
}

/// Turns one upload into one presentation.
///
/// The template is validated before the LLM is called, so a bad upload never
/// costs the caller an API request. Nothing is written until the plan has
/// been parsed, which means an upstream failure produces no output at all.
///
/// # Errors
///
/// Any [`GenerationError`]; see its variants for the mapping to causes.
pub async fn generate_presentation(
    planner: &dyn SlidePlanner,
    request: GenerationRequest,
) -> Result<GeneratedPresentation, GenerationError> {
    let GenerationRequest {
        text,
        guidance,
        tone,
        provider,
        api_key,
        template,
        template_name,
    } = request;

    if text.trim().is_empty() {
        return Err(GenerationError::InvalidRequest(
            "Text is required".to_string(),
        ));
    }

    let (template, style) = tokio::task::spawn_blocking(move || {
        extract_style(&template).map(|style| (template, style))
    })
    .await??;
    info!(
        template = template_name.as_deref().unwrap_or("<unnamed>"),
        layouts = style.layouts.len(),
        "Template accepted"
    );

    let plan = planner
        .plan(PlanRequest {
            text: &text,
            guidance: guidance.as_deref(),
            tone: &tone,
            provider,
            api_key: &api_key,
        })
        .await?;
    drop(api_key);

    let (built, plan) = tokio::task::spawn_blocking(move || {
        build_presentation(&template, &plan).map(|built| (built, plan))
    })
    .await??;

    if built.slide_count == 0 {
        warn!("Presentation was built without slides");
    }

    Ok(GeneratedPresentation {
        file_name: file_name_for(&plan.title),
        bytes: built.bytes,
        slide_count: built.slide_count,
    })
}

/// `"Q3 Results: Outlook"` -> `"q3-results-outlook.pptx"`.
#[must_use]
pub fn file_name_for(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.is_empty() && !stem.ends_with('-') {
            stem.push('-');
        }
        if stem.len() >= MAX_FILE_STEM_CHARS {
            break;
        }
    }
    let stem = stem.trim_end_matches('-');
    if stem.is_empty() {
        format!("{FALLBACK_FILE_STEM}.pptx")
    } else {
        format!("{stem}.pptx")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_for() {
        assert_eq!(file_name_for("Q3 Results: Outlook"), "q3-results-outlook.pptx");
        assert_eq!(file_name_for("  --Hello--  "), "hello.pptx");
        assert_eq!(file_name_for("日本語"), "presentation.pptx");
        assert!(file_name_for(&"a".repeat(200)).len() <= MAX_FILE_STEM_CHARS + 5);
    }
}
