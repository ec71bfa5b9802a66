// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Front-end contract for hipify.
//!
//! This crate contains everything the rewriting engine consumes from a
//! front end: the AST of one translation unit (restricted to constructs
//! written in the main file), source locations that distinguish spelling from
//! expansion, the preprocessor event stream, and the [`FrontEnd`] trait that
//! produces them.

pub mod ast;
pub mod error;
pub mod foundation;
pub mod frontend;
pub mod preprocessor;

// Re-export commonly used types
pub use foundation::{LineIndex, SourceLocation, Span};

pub use ast::*;
pub use error::FrontEndError;
pub use frontend::{FrontEnd, RawToken, RawTokenKind, Retokenizer};
pub use preprocessor::{InclusionDirective, MacroDefinition, MacroExpansion, PpEvent};
