//! Foundation types shared by every stage: spans and source locations.

pub mod span;

pub use span::{LineIndex, SourceLocation, Span};
