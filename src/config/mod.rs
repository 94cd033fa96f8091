pub mod loader;
pub mod schema;

pub use loader::{
    discover_kernel, load_from_path, load_from_str, load_project, resolve_kernel, ConfigError,
    CONFIG_FILE_NAME,
};
pub use schema::{
    KernelConfig, KernelLayout, ProjectConfig, RoutingConfig, ServicesConfig, ValidationError,
    ValidationIssue,
};
