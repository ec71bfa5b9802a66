//! Hipify
//!
//! Rewrites CUDA sources into HIP sources.
//!
//! Usage: `hipify <sources>... [-o OUTPUT] [--inplace] [--report FILE] [-- <compiler args>...]`

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use hipify_core::{Engine, EngineConfig, FileStatus, RenameTable};
use hipify_frontend::ReferenceFrontEnd;
use hipify_tools::{hipify_sources, write_report, OutputOptions};

#[derive(Parser, Debug)]
#[command(name = "hipify")]
#[command(about = "Translate CUDA sources into HIP sources")]
struct Args {
    /// CUDA source files
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Output path; only valid with a single source
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Rewrite each source in place, keeping the original as `<source>.prehip`
    #[arg(long = "inplace")]
    in_place: bool,

    /// Write a JSON report of all edits and skipped symbols
    #[arg(long)]
    report: Option<PathBuf>,

    /// Extra compiler arguments for both passes (`-D`, `-U`, `-I`, `--cuda-gpu-arch=`)
    #[arg(last = true)]
    compiler_args: Vec<String>,
}

fn main() {
    hipify_tools::init_logging();

    let args = Args::parse();

    let config = EngineConfig::default().with_extra_args(args.compiler_args);
    let engine = Engine::with_config(
        ReferenceFrontEnd::default(),
        Arc::new(RenameTable::cuda_to_hip()),
        config,
    );
    info!(
        sources = args.sources.len(),
        table = engine.table().len(),
        "hipify starting"
    );

    let options = OutputOptions {
        output: args.output,
        in_place: args.in_place,
    };
    let report = match hipify_sources(&engine, &args.sources, &options) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    for file in &report.files {
        match file.status {
            FileStatus::Failed => {}
            FileStatus::Unchanged => info!("{}: nothing to rewrite", file.input.display()),
            FileStatus::Rewritten => info!(
                "{}: {} edits, {} skipped",
                file.input.display(),
                file.applied.len(),
                file.skipped.len()
            ),
        }
        for skip in &file.skipped {
            warn!(
                "{}:{}:{}: no HIP equivalent for {} `{}`",
                file.input.display(),
                skip.line,
                skip.column,
                skip.context,
                skip.name
            );
        }
    }

    if let Some(path) = &args.report {
        if let Err(e) = write_report(path, &report) {
            error!("Failed to write report '{}': {}", path.display(), e);
            process::exit(1);
        }
        info!("Report written to {}", path.display());
    }

    if report.has_failures() {
        error!(
            "{} of {} files failed",
            report.failures(),
            report.files.len()
        );
        process::exit(1);
    }
}
