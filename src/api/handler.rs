//! Route handlers.
//!
//! Each handler parses its input, delegates to `features::generate` and maps
//! the outcome to a response. Request bodies are never logged; every
//! generating request runs inside a span carrying a fresh correlation id.

use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::response::Response;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use super::AppState;
use super::helpers::pptx_response;
use super::parsing::{OutlineBody, read_multipart};
use crate::ai::client::PlanRequest;
use crate::ai::provider::LlmProvider;
use crate::core::models::{DEFAULT_TONE, SlidePlan, TemplateStyle};
use crate::core::secret::ApiKey;
use crate::errors::GenerationError;
use crate::features::generate::{analyze_template as analyze, generate_presentation, plan_outline};

pub const SERVICE_NAME: &str = "Text-to-PowerPoint Generator API";

#[derive(Debug, Serialize)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub model: String,
}

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

/// Providers a caller can choose from, with the model each one will use.
pub async fn providers(State(state): State<AppState>) -> Json<Vec<ProviderInfo>> {
    let providers = LlmProvider::ALL
        .iter()
        .map(|p| ProviderInfo {
            id: p.id(),
            name: p.display_name(),
            model: p.model(&state.config).to_string(),
        })
        .collect();
    Json(providers)
}

pub async fn analyze_template(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TemplateStyle>, GenerationError> {
    let correlation_id = Uuid::new_v4();
    async move {
        let mut form = read_multipart(multipart).await?;
        let (template, name) = form.take_template()?;
        info!(
            template = name.as_deref().unwrap_or("<unnamed>"),
            bytes = template.len(),
            "Analyzing template"
        );
        Ok(Json(analyze(template).await?))
    }
    .instrument(info_span!("analyze_template", %correlation_id))
    .await
}

pub async fn outline(
    State(state): State<AppState>,
    body: Result<Json<OutlineBody>, JsonRejection>,
) -> Result<Json<SlidePlan>, GenerationError> {
    let correlation_id = Uuid::new_v4();
    async move {
        let Json(body) =
            body.map_err(|e| GenerationError::InvalidRequest(e.body_text()))?;
        let provider: LlmProvider = body.provider.parse()?;
        let api_key = ApiKey::new(body.api_key)?;
        let tone = body
            .tone
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_TONE);

        info!(%provider, text_chars = body.text.chars().count(), "Planning outline");
        let plan = plan_outline(
            state.planner.as_ref(),
            PlanRequest {
                text: &body.text,
                guidance: body.guidance.as_deref(),
                tone,
                provider,
                api_key: &api_key,
            },
        )
        .await?;
        info!(slides = plan.slides.len(), "Outline ready");
        Ok(Json(plan))
    }
    .instrument(info_span!("outline", %correlation_id))
    .await
}

pub async fn generate(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, GenerationError> {
    let correlation_id = Uuid::new_v4();
    async move {
        let request = read_multipart(multipart).await?.into_generation_request()?;
        info!(
            provider = %request.provider,
            text_chars = request.text.chars().count(),
            template_bytes = request.template.len(),
            "Generating presentation"
        );

        let presentation = generate_presentation(state.planner.as_ref(), request).await?;
        info!(
            slides = presentation.slide_count,
            bytes = presentation.bytes.len(),
            file_name = %presentation.file_name,
            "Presentation generated"
        );
        Ok(pptx_response(presentation))
    }
    .instrument(info_span!("generate", %correlation_id))
    .await
}
