//! Insertion-point location over line-oriented text.
//!
//! A heuristic substitute for parsing: find a distinguishing marker in code
//! (never inside a string or comment), then walk forward tracking the depth
//! of the format's bracket-like delimiters until the enclosing structure
//! closes. Anything less certain than that is reported, never guessed.

pub mod errors;
pub mod locator;
pub mod syntax;

pub use errors::LocateError;
pub use locator::{locate, Anchor, Block, Locator, Position};
pub use syntax::{CodeMask, InlineText, LineComment, Region, Syntax};
