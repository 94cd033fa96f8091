//! Bundle Patcher: registers a generated bundle into an application's
//! configuration files.
//!
//! Three manipulators each add one entry to one kind of file:
//!
//! - [`BootstrapRegistrationManipulator`] adds the bundle to the kernel's
//!   registration collection (PHP)
//! - [`RouteImportManipulator`] imports the bundle's routes (YAML, TOML or XML)
//! - [`ServiceImportManipulator`] imports the bundle's services file (YAML or TOML)
//!
//! # Architecture
//!
//! Every change compiles down to a verified byte-span [`Edit`]. The
//! intelligence lives in locating the insertion point: a code mask that
//! hides strings and comments, delimiter matching for procedural and
//! markup files, a line outline for YAML and a section scan for TOML.
//!
//! # Safety
//!
//! - An entry whose key is already present is never written again
//! - Existing bytes are preserved; only the new entry is inserted
//! - Atomic file writes (tempfile + fsync + rename)
//! - When no insertion point is safe, nothing is written and the
//!   [`Outcome`] carries a literal [`Instruction`] to apply by hand
//!
//! # Example
//!
//! ```no_run
//! use bundle_patcher::{BootstrapRegistrationManipulator, BundleDescriptor, ConfigurationFormat};
//!
//! let bundle = BundleDescriptor::new("Acme/Blog", None, ConfigurationFormat::Annotation, false)?;
//! let kernel = BootstrapRegistrationManipulator::new("app/AppKernel.php");
//!
//! match kernel.register_bundle(&bundle)? {
//!     outcome if outcome.is_applied() => println!("{outcome}"),
//!     outcome => match outcome.instruction() {
//!         Some(instruction) => println!("{instruction}"),
//!         None => println!("{outcome}"),
//!     },
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bootstrap;
pub mod config;
pub mod descriptor;
pub mod edit;
pub mod fs;
pub mod locate;
pub mod outcome;
pub mod routing;
pub mod safety;
pub mod services;
pub mod target;
pub mod toml;
pub mod workflow;
pub mod yaml;

// Re-exports
pub use bootstrap::{BootstrapLayout, BootstrapRegistrationManipulator};
pub use config::{load_from_path, load_from_str, load_project, ConfigError, ProjectConfig};
pub use descriptor::{BundleDescriptor, ConfigurationFormat, DescriptorError};
pub use edit::{splice, Edit, EditError, EditVerification};
pub use fs::{DryRunFs, FileSystem, LocalFs};
pub use locate::{Anchor, Block, LocateError, Locator};
pub use outcome::{Instruction, Outcome, PatchError};
pub use routing::{RouteImport, RouteImportManipulator, RoutingSyntax};
pub use safety::{ProjectGuard, SafetyError};
pub use services::ServiceImportManipulator;
pub use target::{ConfigSyntax, LineEnding, TargetFile, TargetFormat};
pub use workflow::{Report, Step, StepKind, Targets, Workflow};
