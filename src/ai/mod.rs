//! All AI/LLM functionality

pub mod client;
pub mod prompt_builder;
pub mod provider;
pub mod response_parser;

// Re-export main types for convenience
pub use client::{LlmClient, PlanRequest, SlidePlanner, estimate_tokens};
pub use provider::LlmProvider;
