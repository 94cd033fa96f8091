//! Line-level view of a TOML configuration file, backed by `toml_edit` for
//! key lookup and syntax validation.

pub mod document;
pub mod errors;
pub mod sections;

pub use document::{validate_document, ResourceList, TomlTarget};
pub use errors::TomlError;
pub use sections::{scan_sections, SectionPath, SectionSpan};
