// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Reference front end for hipify.
//!
//! Preprocesses a CUDA source for one compilation view, then parses the
//! active tokens into the [`hipify_ast`] tree. Declarations of the vendor
//! runtime header come from a built-in [`VendorModel`] instead of the
//! header itself, so no CUDA installation is needed.
//!
//! ```rust,ignore
//! use hipify_ast::FrontEnd;
//! use hipify_frontend::ReferenceFrontEnd;
//!
//! let front_end = ReferenceFrontEnd::default();
//! let unit = front_end.parse(source, &["--cuda-host-only".into()])?;
//! ```

pub mod invocation;
pub mod parser;
pub mod preprocess;
pub mod vendor;

pub use invocation::{CompilationView, CompilerInvocation};
pub use parser::{parse_unit, ParseError, ParseErrorKind};
pub use preprocess::{preprocess, Preprocessed};
pub use vendor::VendorModel;

use hipify_ast::{FrontEnd, FrontEndError, RawToken, Retokenizer, Span, TranslationUnit};
use tracing::debug;

/// Preprocessor, parser and vendor model bundled behind [`FrontEnd`].
#[derive(Debug, Clone, Default)]
pub struct ReferenceFrontEnd {
    vendor: VendorModel,
}

impl ReferenceFrontEnd {
    pub fn new(vendor: VendorModel) -> Self {
        Self { vendor }
    }

    pub fn vendor(&self) -> &VendorModel {
        &self.vendor
    }
}

impl Retokenizer for ReferenceFrontEnd {
    fn retokenize(&self, source: &str, span: Span) -> Vec<RawToken> {
        hipify_lexer::retokenize(source, span.range())
            .iter()
            .map(preprocess::raw_token)
            .collect()
    }
}

impl FrontEnd for ReferenceFrontEnd {
    fn parse(&self, source: &str, args: &[String]) -> Result<TranslationUnit, FrontEndError> {
        let invocation = CompilerInvocation::from_args(args)?;
        debug!(view = ?invocation.view, "parsing translation unit");
        let pp = preprocess(source, &invocation)?;
        Ok(parse_unit(pp, &self.vendor)?)
    }
}
