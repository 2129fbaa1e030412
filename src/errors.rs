use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("LLM provider rejected the API key: {0}")]
    UpstreamAuth(String),

    #[error("LLM provider timed out: {0}")]
    UpstreamTimeout(String),

    #[error("LLM provider request failed: {0}")]
    UpstreamError(String),

    #[error("LLM returned an unusable response: {0}")]
    InvalidLlmResponse(String),

    #[error("Presentation generation failed: {0}")]
    Internal(String),
}

impl GenerationError {
    /// HTTP status code surfaced to the caller for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidTemplate(_) | Self::InvalidRequest(_) => 400,
            Self::UpstreamAuth(_) => 401,
            Self::UpstreamTimeout(_) => 504,
            Self::UpstreamError(_) | Self::InvalidLlmResponse(_) => 502,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable name used in JSON error bodies.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTemplate(_) => "invalid_template",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UpstreamAuth(_) => "upstream_auth",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::UpstreamError(_) => "upstream_error",
            Self::InvalidLlmResponse(_) => "invalid_llm_response",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<zip::result::ZipError> for GenerationError {
    fn from(error: zip::result::ZipError) -> Self {
        GenerationError::InvalidTemplate(format!("not a readable pptx container: {error}"))
    }
}

impl From<quick_xml::Error> for GenerationError {
    fn from(error: quick_xml::Error) -> Self {
        GenerationError::InvalidTemplate(format!("malformed XML: {error}"))
    }
}

impl From<std::fmt::Error> for GenerationError {
    fn from(error: std::fmt::Error) -> Self {
        GenerationError::Internal(format!("failed to format XML: {error}"))
    }
}

impl From<tokio::task::JoinError> for GenerationError {
    fn from(error: tokio::task::JoinError) -> Self {
        GenerationError::Internal(format!("background task failed: {error}"))
    }
}
