//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::domain::ProfilerError;
use crate::profiling::ProfilerOptions;

#[derive(Parser, Debug)]
#[command(
    name = "callscope",
    about = "Profile every call of a multi-threaded workload and summarize it",
    after_help = "\
EXAMPLES:
    callscope                                  Profile the default workload
    callscope --threads 8 --max-depth 4        Wider workload, shallow records
    callscope --function Parser.parse          Callers and callees of one function
    callscope --export trace.json --quiet      Chrome trace for Perfetto"
)]
pub struct Args {
    /// Worker threads spawned by the workload
    #[arg(long, default_value = "4")]
    pub threads: usize,

    /// Jobs processed by each worker
    #[arg(long, default_value = "50")]
    pub iterations: usize,

    /// Record calls up to this depth per thread
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_depth: Option<u64>,

    /// Stop profiling after N seconds (0 = unlimited)
    #[arg(long, default_value = "0", value_name = "SECS")]
    pub duration: f64,

    /// Rows shown in the summary table
    #[arg(long, default_value = "15")]
    pub top: usize,

    /// Print caller/callee analysis for one qualified function name
    #[arg(long, value_name = "NAME")]
    pub function: Option<String>,

    /// Print every thread's call tree
    #[arg(long)]
    pub structure: bool,

    /// Export a Chrome trace to FILE
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Write raw records as JSON to FILE
    #[arg(long, value_name = "FILE")]
    pub records: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Profiler options requested on the command line.
    ///
    /// # Errors
    /// Rejects a negative or non-finite `--duration`.
    pub fn profiler_options(&self) -> Result<ProfilerOptions, ProfilerError> {
        let mut options = ProfilerOptions::new().with_max_duration_secs(self.duration)?;
        if let Some(depth) = self.max_depth {
            let depth = usize::try_from(depth).map_err(|_| ProfilerError::InvalidOption {
                option: "max_depth",
                reason: format!("{depth} does not fit this platform"),
            })?;
            options = options.with_max_depth(depth);
        }
        Ok(options)
    }
}
