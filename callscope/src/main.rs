//! # callscope - Demo Entry Point
//!
//! Profiles the built-in multi-threaded workload and prints what was
//! recorded:
//! - **Summary** (default): top functions by total time
//! - **Structure** (`--structure`): every thread's call tree
//! - **Function** (`--function NAME`): callers, callees and per-thread totals
//! - **Export** (`--export trace.json`, `--records calls.json`): files for
//!   Perfetto or further processing

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::{self, BufWriter, Write};

use callscope::cli::Args;
use callscope::export::{write_records_json, ChromeTraceExporter};
use callscope::render;
use callscope::{Profiler, ProfilerError};

mod workload;

use workload::WorkloadConfig;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ProfilerError>() {
        Some(ProfilerError::InvalidOption { .. }) => EXIT_USAGE,
        _ => EXIT_ERROR,
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let options = args
        .profiler_options()?
        .with_on_finished(|| info!("profile finished, hook removed from all threads"));
    let profiler = Profiler::new(options)?;

    let config = WorkloadConfig { threads: args.threads, iterations: args.iterations };
    let digests = workload::run(&profiler, &config)?;
    profiler.stop();
    info!("workload digests: {digests:x?}");

    if let Some(fault) = profiler.last_error() {
        return Err(ProfilerError::Hook(fault)).context("Profiling aborted");
    }

    let snapshot = profiler.snapshot();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if !args.quiet {
        let summaries = callscope::analysis::function_summaries(&snapshot);
        render::print_summary(&summaries, snapshot.duration, args.top, &mut out)?;
        writeln!(out)?;
    }

    if args.structure {
        render::print_thread_call_structures(
            &callscope::analysis::build_hierarchy(&snapshot),
            &mut out,
        )?;
    }

    if let Some(ref name) = args.function {
        let analysis = callscope::analysis::analyze_function(&snapshot, name);
        render::print_function_analysis(name, &analysis, &mut out)?;
    }

    if let Some(ref path) = args.export {
        let file = File::create(path)
            .with_context(|| format!("Failed to create trace file: {}", path.display()))?;
        let exporter = ChromeTraceExporter::from_snapshot(&snapshot)?;
        exporter.export(BufWriter::new(file)).context("Failed to write trace JSON")?;
        if !args.quiet {
            writeln!(
                out,
                "Trace exported to {} ({} events). Open in https://ui.perfetto.dev",
                path.display(),
                exporter.event_count()
            )?;
        }
    }

    if let Some(ref path) = args.records {
        let file = File::create(path)
            .with_context(|| format!("Failed to create records file: {}", path.display()))?;
        write_records_json(&snapshot, BufWriter::new(file)).context("Failed to write records")?;
        info!("{} records written to {}", snapshot.records.len(), path.display());
    }

    Ok(())
}
