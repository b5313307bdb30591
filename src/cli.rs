//! Run wiring for the CLI front door.
//!
//! Builds the run's components from plain option values, drives the
//! orchestrator, and renders a one-line JSON summary. All state lives in the
//! values constructed here; nothing is process-global.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::bank::{Bank, ERRORS_FILE};
use crate::diagnose::{DiagnoseOptions, Diagnoser};
use crate::error::SiftError;
use crate::inject::ProcessInjector;
use crate::metadata::Metadata;
use crate::prepare::{self, DIAGNOSE_FILE};
use crate::report::{ReportStore, REPORT_FILE};
use crate::rescan::Rescanner;

// ============================================================================
// Options
// ============================================================================

/// Options for a full diagnose run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory the build command runs in.
    pub workspace: PathBuf,
    /// Working directory holding analyzer and metadata artifacts.
    pub out_dir: PathBuf,
    /// Shell command that triggers a full re-analysis.
    pub build_command: String,
    /// Shell command implementing the annotation mutator exchange.
    pub inject_command: String,
    /// Subtract previously diagnosed fixes from the work list.
    pub optimized: bool,
    /// Measure only: roll back every fix, including kept ones.
    pub revert_all: bool,
    /// Mirror fixes across the method inheritance tree.
    pub propagate_inheritance: bool,
    /// Ceiling for one re-analysis run.
    pub timeout: Duration,
}

/// Options for the preparation step alone.
#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub workspace: PathBuf,
    pub out_dir: PathBuf,
    pub build_command: String,
    pub optimized: bool,
    pub timeout: Duration,
}

// ============================================================================
// Summaries
// ============================================================================

#[derive(Debug, Serialize)]
struct RunSummary {
    status: &'static str,
    candidates: usize,
    diagnosed: usize,
    kept: usize,
    reverted: usize,
    report: String,
}

#[derive(Debug, Serialize)]
struct PrepareSummary {
    status: &'static str,
    candidates: usize,
    work_list: String,
}

// ============================================================================
// Entry Points
// ============================================================================

/// Prepare the work list, drain it, and persist the reports.
pub fn run_diagnose(options: &RunOptions) -> Result<String, SiftError> {
    if options.build_command.trim().is_empty() {
        return Err(SiftError::invalid_args("build command must not be empty"));
    }
    if options.inject_command.trim().is_empty() {
        return Err(SiftError::invalid_args("inject command must not be empty"));
    }

    let rescanner = Rescanner::from_shell(
        &options.build_command,
        &options.workspace,
        options.timeout,
    );
    let work = prepare::prepare(&options.out_dir, &rescanner, options.optimized)?;

    // Root snapshots reflect the codebase before any candidate is applied.
    let bank = Bank::load(&options.out_dir.join(ERRORS_FILE))?;
    let metadata = Metadata::load(&options.out_dir)?;
    let injector = ProcessInjector::from_shell(&options.inject_command);

    let report_path = options.out_dir.join(REPORT_FILE);
    let prior = ReportStore::load_or_empty(&report_path);
    if !prior.is_empty() {
        info!("resuming with {} prior reports", prior.len());
    }

    let mut diagnoser = Diagnoser::new(
        DiagnoseOptions {
            revert_all: options.revert_all,
            propagate_inheritance: options.propagate_inheritance,
        },
        bank,
        metadata,
        injector,
        rescanner,
    );
    let reports = diagnoser.run(&work, prior);
    reports.save(&report_path)?;

    let summary = RunSummary {
        status: "ok",
        candidates: work.len(),
        diagnosed: reports.len(),
        kept: reports.kept_count(),
        reverted: reports.reverted_count(),
        report: report_path.display().to_string(),
    };
    Ok(serde_json::to_string(&summary)?)
}

/// Run only the preparation step.
pub fn run_prepare(options: &PrepareOptions) -> Result<String, SiftError> {
    if options.build_command.trim().is_empty() {
        return Err(SiftError::invalid_args("build command must not be empty"));
    }

    let rescanner = Rescanner::from_shell(
        &options.build_command,
        &options.workspace,
        options.timeout,
    );
    let work = prepare::prepare(&options.out_dir, &rescanner, options.optimized)?;

    let summary = PrepareSummary {
        status: "ok",
        candidates: work.len(),
        work_list: options.out_dir.join(DIAGNOSE_FILE).display().to_string(),
    };
    Ok(serde_json::to_string(&summary)?)
}

// ============================================================================
// Tests
// ============================================================================
