//! Run command - execute the built-in aggregate call suite

use crate::logging;
use crate::reporter::CaseReporter;
use abicheck_config::{Config, ConfigLoader, EngineConfig, HarnessConfig};
use abicheck_runtime::suite::builtin;
use abicheck_runtime::{CaseSelection, FfiVm, Harness, RunSummary};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

/// Arguments for the run command
#[derive(Debug, Default)]
pub struct RunArgs {
    /// Explicit case indices
    pub cases: Vec<usize>,
    /// First case of an inclusive range
    pub from: Option<usize>,
    /// Last case of an inclusive range
    pub to: Option<usize>,
    /// Print the run summary as JSON
    pub json: bool,
    /// PASS/FAIL lines with timings
    pub verbose: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    /// Log filter overriding everything else
    pub log_level: Option<String>,
    /// Argument buffer override in bytes
    pub arg_buffer_size: Option<usize>,
    /// Value-table bound override
    pub max_args: Option<usize>,
}

impl RunArgs {
    /// Case selection described by the flags
    pub fn selection(&self, len: usize) -> CaseSelection {
        if !self.cases.is_empty() {
            return CaseSelection::Indices(self.cases.clone());
        }
        match (self.from, self.to) {
            (None, None) => CaseSelection::All,
            (from, to) => CaseSelection::Range {
                from: from.unwrap_or(0),
                to: to.unwrap_or_else(|| len.saturating_sub(1)),
            },
        }
    }

    fn overrides(&self) -> HarnessConfig {
        HarnessConfig {
            harness: Some(EngineConfig {
                arg_buffer_size: self.arg_buffer_size,
                max_args: self.max_args,
            }),
            logging: None,
        }
    }
}

/// Load configuration and apply flag overrides
pub fn load_config(args: &RunArgs) -> Result<Config> {
    let loader = ConfigLoader::new();
    let mut config = match &args.config {
        Some(path) => loader.load_from_file(path)?,
        None => {
            let cwd = std::env::current_dir().context("cannot read working directory")?;
            loader.load_from_directory(&cwd)?
        }
    };

    config.harness.merge(&args.overrides());
    config.harness.validate()?;
    Ok(config)
}

/// Run the selected cases and return the run summary
pub fn execute(args: &RunArgs, config: &Config) -> Result<RunSummary> {
    let cases = builtin::cases();
    let selection = args.selection(cases.len());

    let vm = FfiVm::with_capacity(config.arg_buffer_size());
    let mut harness =
        Harness::new(vm, builtin::registry(), cases).with_max_args(config.max_args());

    let max_args = harness.expected().max_args();
    if max_args < builtin::MAX_ARGS {
        warn!(
            max_args,
            needed = builtin::MAX_ARGS,
            "value table bound does not cover the built-in cases; wider cases will fail"
        );
    }
    info!(
        arg_buffer_size = harness.vm().capacity(),
        max_args,
        "running built-in suite"
    );
    let summary = harness
        .run_selected(&selection)
        .context("invalid case selection")?;
    Ok(summary)
}

/// Run the run command; returns the process exit code
pub fn run(args: RunArgs) -> Result<i32> {
    let config = load_config(&args)?;
    logging::init(
        args.log_level.as_deref(),
        config.log_level(),
        config.log_json(),
    );
    if let Some(source) = config.source() {
        info!(config = %source.display(), "loaded configuration");
    }

    let summary = execute(&args, &config)?;

    if args.json {
        let report = serde_json::json!({
            "cases": summary.outcomes.len(),
            "passed": summary.passed(),
            "failed": summary.failed(),
            "result": if summary.all_passed() { 1 } else { 0 },
            "outcomes": summary.outcomes,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        CaseReporter::new(args.verbose)
            .with_no_color(args.no_color)
            .report(&summary)?;
    }

    Ok(summary.exit_code())
}
