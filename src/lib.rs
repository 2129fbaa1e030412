//! slidegen - turns free-form text and a PowerPoint template into a styled deck.
//!
//! The service receives text plus a `.pptx` template, asks one of three LLM
//! providers (OpenAI, Anthropic, Gemini) for a slide outline using the
//! caller's own API key, and fills the template's layouts with the result.
//!
//! # Architecture
//!
//! - `api`: axum router, handlers and multipart parsing
//! - `ai`: prompt construction, provider HTTP calls, response parsing
//! - `pptx`: reading the template package, style extraction, slide writing
//! - `features`: the generation pipeline tying the above together
//!
//! # Example
//!
//! ```no_run
//! use slidegen::core::config::AppConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     slidegen::setup_logging();
//!     let config = AppConfig::from_env().map_err(anyhow::Error::msg)?;
//!     slidegen::api::serve(config).await
//! }
//! ```

pub mod ai;
pub mod api;
pub mod core;
pub mod errors;
pub mod features;
pub mod pptx;

/// Configure structured JSON logging.
///
/// Verbosity comes from `RUST_LOG` and defaults to `info`. Calling this more
/// than once is harmless: later calls leave the first subscriber in place.
///
/// # Example
///
/// ```
/// slidegen::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().json().with_target(true);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
