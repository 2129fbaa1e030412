pub mod generate;

// Re-exports for thin handlers
pub use generate::{analyze_template, generate_presentation, plan_outline};
