//! Multipart and JSON request parsing.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::http::StatusCode;
use serde::Deserialize;

use crate::ai::provider::LlmProvider;
use crate::core::models::{DEFAULT_TONE, GenerationRequest};
use crate::core::secret::ApiKey;
use crate::errors::GenerationError;

pub const TEMPLATE_FIELD: &str = "template";

const TEMPLATE_EXTENSIONS: [&str; 2] = ["pptx", "potx"];

/// Fields of one multipart upload: text fields plus the optional template file.
#[derive(Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub template: Option<Vec<u8>>,
    pub template_name: Option<String>,
}

impl MultipartForm {
    /// Non-empty value of a text field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// # Errors
    ///
    /// Returns `InvalidRequest` naming the field when it is missing or blank.
    pub fn required(&self, name: &str) -> Result<&str, GenerationError> {
        self.field(name)
            .ok_or_else(|| GenerationError::InvalidRequest(format!("Missing field: {name}")))
    }

    /// Takes the uploaded template, checking its file extension when one was given.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` when no file was uploaded, `InvalidTemplate` when the
    /// file is empty or is not named like a presentation.
    pub fn take_template(&mut self) -> Result<(Vec<u8>, Option<String>), GenerationError> {
        let bytes = self.template.take().ok_or_else(|| {
            GenerationError::InvalidRequest(format!("Missing field: {TEMPLATE_FIELD}"))
        })?;
        let name = self.template_name.take();

        if let Some(name) = name.as_deref() {
            let extension = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
            let accepted = extension
                .as_deref()
                .is_some_and(|ext| TEMPLATE_EXTENSIONS.contains(&ext));
            if !accepted {
                return Err(GenerationError::InvalidTemplate(format!(
                    "{name} is not a .pptx or .potx file"
                )));
            }
        }
        if bytes.is_empty() {
            return Err(GenerationError::InvalidTemplate(
                "Template file is empty".to_string(),
            ));
        }

        Ok((bytes, name))
    }

    /// Builds a generation request, consuming the upload.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for missing fields, an unknown provider or a bad key.
    pub fn into_generation_request(mut self) -> Result<GenerationRequest, GenerationError> {
        let (template, template_name) = self.take_template()?;
        let text = self.required("text")?.to_string();
        let provider: LlmProvider = self.required("provider")?.parse()?;
        let api_key = ApiKey::new(self.required("api_key")?)?;

        Ok(GenerationRequest {
            text,
            guidance: self.field("guidance").map(str::to_string),
            tone: self.field("tone").unwrap_or(DEFAULT_TONE).to_string(),
            provider,
            api_key,
            template,
            template_name,
        })
    }
}

/// Reads every part of a multipart body. The part named `template` is kept as
/// bytes; all other parts are read as text.
///
/// # Errors
///
/// Returns `InvalidRequest` when the request is not multipart, the body is
/// malformed, or it exceeds the upload limit.
pub async fn read_multipart(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<MultipartForm, GenerationError> {
    let mut multipart = multipart.map_err(|e| GenerationError::InvalidRequest(e.body_text()))?;
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == TEMPLATE_FIELD {
            form.template_name = field.file_name().map(str::to_string);
            form.template = Some(field.bytes().await.map_err(multipart_error)?.to_vec());
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

fn multipart_error(err: MultipartError) -> GenerationError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GenerationError::InvalidRequest("Upload exceeds the maximum allowed size".to_string())
    } else {
        GenerationError::InvalidRequest(format!("Malformed multipart body: {}", err.body_text()))
    }
}

/// Body of `POST /outline`.
#[derive(Deserialize)]
pub struct OutlineBody {
    pub text: String,
    pub provider: String,
    pub api_key: String,
    #[serde(default)]
    pub guidance: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

// The key must not reach a log line through a derived Debug.
impl std::fmt::Debug for OutlineBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutlineBody")
            .field("text_chars", &self.text.chars().count())
            .field("provider", &self.provider)
            .field("guidance", &self.guidance)
            .field("tone", &self.tone)
            .finish_non_exhaustive()
    }
}
