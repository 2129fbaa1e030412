//! Response builders shared by the handlers.

use axum::Json;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::core::models::GeneratedPresentation;
use crate::errors::GenerationError;

pub const PPTX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

pub const X_SLIDE_COUNT: HeaderName = HeaderName::from_static("x-slide-count");

/// JSON body used for every error: `{"error": ..., "kind": ...}`.
#[must_use]
pub fn error_body(err: &GenerationError) -> serde_json::Value {
    json!({ "error": err.to_string(), "kind": err.kind() })
}

impl IntoResponse for GenerationError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            error!(kind = self.kind(), status = status.as_u16(), "Request failed: {}", self);
        } else {
            warn!(kind = self.kind(), status = status.as_u16(), "Request rejected: {}", self);
        }

        (status, Json(error_body(&self))).into_response()
    }
}

/// The finished deck as a download.
#[must_use]
pub fn pptx_response(presentation: GeneratedPresentation) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        presentation.file_name.replace('"', "")
    );
    let headers = [
        (CONTENT_TYPE, PPTX_CONTENT_TYPE.to_string()),
        (CONTENT_DISPOSITION, disposition),
        (X_SLIDE_COUNT, presentation.slide_count.to_string()),
    ];
    (StatusCode::OK, headers, presentation.bytes).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_uses_mapped_status() {
        let response = GenerationError::UpstreamTimeout("slow".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let response = GenerationError::InvalidTemplate("bad".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_body_shape() {
        let body = error_body(&GenerationError::UpstreamAuth("nope".to_string()));
        assert_eq!(body["kind"], "upstream_auth");
        assert!(body["error"].as_str().unwrap().contains("nope"));
    }

    #[test]
    fn test_pptx_response_headers() {
        let response = pptx_response(GeneratedPresentation {
            file_name: "deck.pptx".to_string(),
            bytes: vec![1, 2, 3],
            slide_count: 4,
        });
        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], PPTX_CONTENT_TYPE);
        assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=\"deck.pptx\"");
        assert_eq!(headers["x-slide-count"], "4");
    }
}
