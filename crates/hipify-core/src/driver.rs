//! Two-pass driver.
//!
//! Parses the same buffer once per compilation view and funnels every pass's
//! edits into one [`EditCollector`], so code visible to both views produces
//! a single merged edit. The buffer is spliced exactly once, after the last
//! pass.

use std::fmt;
use std::sync::Arc;

use hipify_ast::{FrontEnd, FrontEndError, LineIndex};
use indexmap::IndexSet;
use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::dispatch::{MatchContext, MatchFinder, SkippedMatch};
use crate::edit::{EditCollector, TextEdit};
use crate::error::{EngineError, Result};
use crate::launch::LaunchSyntax;
use crate::output::{persist, read_source, OutputPlan};
use crate::report::FileReport;
use crate::table::RenameTable;

/// A compilation view of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilationPass {
    /// Code reachable from the host compiler
    Host,
    /// Code reachable from the device compiler
    Device,
}

impl CompilationPass {
    /// Front-end flag selecting this view.
    pub fn flag(self) -> &'static str {
        match self {
            CompilationPass::Host => "--cuda-host-only",
            CompilationPass::Device => "--cuda-device-only",
        }
    }
}

impl fmt::Display for CompilationPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompilationPass::Host => "host",
            CompilationPass::Device => "device",
        })
    }
}

/// Compiler arguments of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassConfig {
    pub pass: CompilationPass,
    pub args: Vec<String>,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Passes to run, in order
    pub passes: Vec<CompilationPass>,
    pub language_standard: String,
    /// Appended to every pass (`-D`, `-U`, `-I`, `--cuda-gpu-arch=`)
    pub extra_args: Vec<String>,
    pub launch: LaunchSyntax,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            passes: vec![CompilationPass::Host, CompilationPass::Device],
            language_standard: "-std=c++11".to_string(),
            extra_args: Vec::new(),
            launch: LaunchSyntax::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_extra_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.extra_args.extend(args);
        self
    }

    /// Argument lists handed to the front end, one per pass.
    pub fn pass_configs(&self) -> Vec<PassConfig> {
        self.passes
            .iter()
            .map(|&pass| {
                let mut args = vec![pass.flag().to_string(), self.language_standard.clone()];
                args.extend(self.extra_args.iter().cloned());
                PassConfig { pass, args }
            })
            .collect()
    }
}

/// Result of transforming one buffer.
#[derive(Debug, Clone)]
pub struct Transformation {
    pub output: String,
    /// Committed edits, sorted by offset
    pub applied: Vec<TextEdit>,
    /// Edits absorbed into a composite edit
    pub folded: Vec<TextEdit>,
    /// Vendor symbols with no replacement, in first-seen order
    pub skipped: Vec<SkippedMatch>,
    /// Identical edits merged across rewriters and passes
    pub duplicates: usize,
}

impl Transformation {
    pub fn is_unchanged(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Rewrites CUDA sources to HIP through a [`FrontEnd`].
pub struct Engine<F> {
    front_end: F,
    table: Arc<RenameTable>,
    config: EngineConfig,
    finder: MatchFinder,
}

impl<F: FrontEnd> Engine<F> {
    /// An engine with the CUDA to HIP table and default configuration.
    pub fn new(front_end: F) -> Self {
        Self::with_config(
            front_end,
            Arc::new(RenameTable::cuda_to_hip()),
            EngineConfig::default(),
        )
    }

    pub fn with_config(front_end: F, table: Arc<RenameTable>, config: EngineConfig) -> Self {
        Self {
            front_end,
            table,
            config,
            finder: MatchFinder::hipify(),
        }
    }

    pub fn table(&self) -> &Arc<RenameTable> {
        &self.table
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run every pass over `source` and apply the merged edits.
    pub fn transform(&self, source: &str) -> Result<Transformation> {
        let mut collector = EditCollector::new();
        let mut skipped = IndexSet::new();

        for pass in self.config.pass_configs() {
            let output = self.run_pass(source, &pass)?;
            collector.extend(output.edits);
            skipped.extend(output.skipped);
        }

        let committed = collector.commit(source)?;
        let output = committed.apply(source);
        info!(
            applied = committed.edits.len(),
            folded = committed.folded.len(),
            skipped = skipped.len(),
            "transformation complete"
        );
        Ok(Transformation {
            output,
            applied: committed.edits,
            folded: committed.folded,
            skipped: skipped.into_iter().collect(),
            duplicates: committed.duplicates,
        })
    }

    /// Read, transform and write one file according to `plan`.
    ///
    /// Nothing is written when reading or transforming fails.
    #[instrument(skip_all, fields(input = %plan.input.display()))]
    pub fn process_file(&self, plan: &OutputPlan) -> FileReport {
        let source = match read_source(&plan.read_from) {
            Ok(source) => source,
            Err(err) => {
                error!(%err, "cannot read input");
                return FileReport::failure(&plan.input, err);
            }
        };
        let transformation = match self.transform(&source.text) {
            Ok(transformation) => transformation,
            Err(err) => {
                error!(%err, "transformation failed, input left untouched");
                return FileReport::failure(&plan.input, err);
            }
        };
        if let Err(err) = persist(plan, &source, &transformation.output) {
            error!(%err, "cannot write output");
            return FileReport::failure(&plan.input, err);
        }
        info!(
            output = %plan.destination.display(),
            edits = transformation.applied.len(),
            "file written"
        );
        FileReport::success(&plan.input, &plan.destination, &source, &transformation)
    }

    #[instrument(skip_all, fields(pass = %pass.pass))]
    fn run_pass(&self, source: &str, pass: &PassConfig) -> Result<crate::dispatch::PassOutput> {
        let unit = self
            .front_end
            .parse(source, &pass.args)
            .map_err(|err| parse_error(pass.pass, source, err))?;
        debug!(
            decls = unit.decls.len(),
            events = unit.preprocessor.len(),
            "parsed translation unit"
        );

        let cx = MatchContext {
            source,
            table: &self.table,
            unit: &unit,
            retokenizer: &self.front_end,
            launch: &self.config.launch,
        };
        let output = self.finder.run(&cx);
        debug!(
            edits = output.edits.len(),
            skipped = output.skipped.len(),
            deferred = output.deferred_templates.len(),
            "pass complete"
        );
        Ok(output)
    }
}

fn parse_error(pass: CompilationPass, source: &str, err: FrontEndError) -> EngineError {
    match err.span {
        Some(span) => {
            let (line, column) = LineIndex::new(source).line_col(span.start);
            EngineError::Parse {
                pass,
                message: err.message,
                line,
                column,
            }
        }
        None => EngineError::Invocation {
            pass,
            message: err.message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hipify_frontend::ReferenceFrontEnd;

    fn engine() -> Engine<ReferenceFrontEnd> {
        Engine::new(ReferenceFrontEnd::default())
    }

    #[test]
    fn test_pass_arguments() {
        let config = EngineConfig::default().with_extra_args(["-DFAST".to_string()]);
        let passes = config.pass_configs();
        assert_eq!(passes.len(), 2);
        assert_eq!(passes[0].pass, CompilationPass::Host);
        assert_eq!(passes[0].args, ["--cuda-host-only", "-std=c++11", "-DFAST"]);
        assert_eq!(passes[1].args, ["--cuda-device-only", "-std=c++11", "-DFAST"]);
    }

    #[test]
    fn test_shared_code_merges_across_passes() {
        let source = "void f(float *p) { cudaFree(p); }";
        let result = engine().transform(source).unwrap();
        assert_eq!(result.output, "void f(float *p) { hipFree(p); }");
        assert_eq!(result.applied.len(), 1);
        assert_eq!(result.duplicates, 1, "device pass repeats the host edit");
    }

    #[test]
    fn test_view_specific_regions() {
        let source = "#ifdef __CUDA_ARCH__\n\
                      __device__ void d() { __threadfence(); cudaDeviceSynchronize(); }\n\
                      #else\n\
                      void h() { cudaDeviceReset(); }\n\
                      #endif\n";
        let result = engine().transform(source).unwrap();
        assert!(result.output.contains("hipDeviceSynchronize();"));
        assert!(result.output.contains("hipDeviceReset();"));
        assert_eq!(result.duplicates, 0);
        assert_eq!(result.skipped.len(), 1);
        assert_eq!(result.skipped[0].name, "__threadfence");
    }

    #[test]
    fn test_parse_error_reports_pass_and_position() {
        let source = "#ifdef __CUDA_ARCH__\nvoid f() { k<<<1, 2, 3, 4, 5>>>(); }\n#endif\n";
        let err = engine().transform(source).unwrap_err();
        let EngineError::Parse {
            pass, line, column, ..
        } = &err
        else {
            panic!("expected a parse error, got {:?}", err);
        };
        assert_eq!(*pass, CompilationPass::Device);
        assert_eq!((*line, *column), (2, 13));
        assert!(err.to_string().starts_with("device pass: 2:13:"));
    }

    #[test]
    fn test_invocation_error() {
        let engine = Engine::with_config(
            ReferenceFrontEnd::default(),
            Arc::new(RenameTable::cuda_to_hip()),
            EngineConfig::default().with_extra_args(["-D".to_string()]),
        );
        let err = engine.transform("int x;").unwrap_err();
        assert!(matches!(
            err,
            EngineError::Invocation {
                pass: CompilationPass::Host,
                ..
            }
        ));
    }

    #[test]
    fn test_unchanged_source() {
        let result = engine().transform("int main() { return 0; }\n").unwrap();
        assert!(result.is_unchanged());
        assert_eq!(result.output, "int main() { return 0; }\n");
    }
}
