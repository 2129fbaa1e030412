use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::config::AppConfig;
use crate::errors::GenerationError;

/// The three interchangeable LLM APIs a caller can pick from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Gemini,
}

impl LlmProvider {
    pub const ALL: [LlmProvider; 3] = [Self::OpenAi, Self::Anthropic, Self::Gemini];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Gemini => "Google Gemini",
        }
    }

    /// Model name configured for this provider.
    #[must_use]
    pub fn model(self, config: &AppConfig) -> &str {
        match self {
            Self::OpenAi => &config.openai_model,
            Self::Anthropic => &config.anthropic_model,
            Self::Gemini => &config.gemini_model,
        }
    }

    #[must_use]
    pub fn base_url(self, config: &AppConfig) -> &str {
        match self {
            Self::OpenAi => &config.openai_base_url,
            Self::Anthropic => &config.anthropic_base_url,
            Self::Gemini => &config.gemini_base_url,
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for LlmProvider {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" => Ok(Self::Gemini),
            other => Err(GenerationError::InvalidRequest(format!(
                "Unsupported LLM provider: {other}"
            ))),
        }
    }
}
