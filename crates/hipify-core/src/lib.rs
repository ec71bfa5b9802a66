// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! CUDA to HIP rewriting engine.
//!
//! Turns a CUDA source buffer into its HIP equivalent by textual
//! replacement driven by a semantic tree. The pipeline is:
//!
//! 1. A [`FrontEnd`](hipify_ast::FrontEnd) parses the buffer once per
//!    compilation view ([`CompilationPass`]).
//! 2. The [`MatchFinder`] classifies tree nodes and preprocessor events
//!    into [`Pattern`]s and dispatches them to the context rewriters.
//! 3. Rewriters look symbols up in the [`RenameTable`] and emit
//!    [`TextEdit`]s; kernel launches become one composite edit.
//! 4. The [`EditCollector`] merges identical edits across passes, folds
//!    edits nested in launch arguments, rejects overlaps and splices the
//!    buffer once.
//!
//! ```rust,ignore
//! use hipify_core::Engine;
//! use hipify_frontend::ReferenceFrontEnd;
//!
//! let engine = Engine::new(ReferenceFrontEnd::default());
//! let result = engine.transform("cudaFree(p);")?;
//! ```

pub mod dispatch;
pub mod driver;
pub mod edit;
pub mod error;
pub mod launch;
pub mod output;
pub mod report;
pub mod rewrite;
pub mod table;

pub use dispatch::{
    classify, MatchBinding, MatchContext, MatchFinder, MatchHandler, PassOutput, Pattern,
    SkippedMatch,
};
pub use driver::{CompilationPass, Engine, EngineConfig, PassConfig, Transformation};
pub use edit::{
    CommittedEdits, EditCollector, Provenance, RewriteContext, TextEdit, VerbatimSegment,
};
pub use error::{EditError, EngineError, OutputPlanError, PersistError, Result};
pub use launch::{KernelLaunchRewriter, LaunchSyntax, TemplateParamsRewriter};
pub use output::{
    persist, plan_output, read_source, validate_explicit_output, FilePosition, FilePositions,
    OutputPlan, SourceEncoding, SourceText,
};
pub use report::{EditRecord, FileReport, FileStatus, RunReport, SkipRecord};
pub use table::{LookupContext, RenameTable, RenameTableBuilder, SymbolClass};
