// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Hipify Tools
//!
//! Shared pieces of the `hipify` command-line driver.

use std::fs;
use std::path::{Path, PathBuf};

use hipify_ast::FrontEnd;
use hipify_core::{
    plan_output, validate_explicit_output, Engine, FileReport, OutputPlanError, RunReport,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Default is `info` for hipify crates and `warn` for others.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("warn,hipify=info,hipify_tools=info,hipify_core=info,hipify_frontend=warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Where the rewritten sources go.
#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub output: Option<PathBuf>,
    pub in_place: bool,
}

/// Rewrite every source in order.
///
/// A failing file is reported and the run continues with the next one.
/// Only an unusable output option aborts the run up front.
pub fn hipify_sources<F: FrontEnd>(
    engine: &Engine<F>,
    sources: &[PathBuf],
    options: &OutputOptions,
) -> Result<RunReport, OutputPlanError> {
    validate_explicit_output(sources.len(), options.output.as_deref())?;
    if options.output.is_some() && options.in_place {
        warn!("both an output path and --inplace given; writing to the output path");
    }

    let mut report = RunReport::default();
    for source in sources {
        let file = match plan_output(source, options.output.as_deref(), options.in_place) {
            Ok(plan) => engine.process_file(&plan),
            Err(err) => {
                warn!(input = %source.display(), %err, "skipping input");
                FileReport::failure(source, err)
            }
        };
        report.push(file);
    }
    info!(
        files = report.files.len(),
        failures = report.failures(),
        "run complete"
    );
    Ok(report)
}

/// Write the run report as pretty JSON.
pub fn write_report(path: &Path, report: &RunReport) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(report).map_err(std::io::Error::other)?;
    fs::write(path, json)
}
