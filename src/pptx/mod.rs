//! In-crate `.pptx` reading and writing over `zip` and `quick-xml`.

pub mod layout;
pub mod package;
pub mod style;
pub mod theme;
pub mod writer;
pub mod xml;

pub use package::TemplatePackage;
pub use style::extract_style;
pub use writer::{BuiltPresentation, build_presentation};
