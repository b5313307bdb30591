//! Candidate-list preparation.
//!
//! One build run makes the analyzer deposit its candidate fixes; this module
//! turns them into the work list the orchestrator drains:
//!
//! 1. trigger a re-analysis so `fixes.csv` and `errors.csv` are fresh
//! 2. absent `fixes.csv` means "no candidates" (normal, not an error):
//!    write an empty `diagnose.json` and return an empty list
//! 3. convert `fixes.csv` to `fixes.json` (every field a string); a present
//!    but unreadable candidate file is a hard stop
//! 4. optimized mode subtracts the fixes already recorded in
//!    `diagnosed.json`, comparing whole records; malformed or missing
//!    prior-run data falls back to the full list

use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::fix::{CsvFixRow, Fix, FixError, FixRecord, WorkList, WorkListFile};
use crate::rescan::{RescanError, Rescanner};

/// File the analyzer deposits its candidate fixes in.
pub const FIXES_CSV: &str = "fixes.csv";
/// Converted candidate list.
pub const FIXES_JSON: &str = "fixes.json";
/// The work list actually fed to the orchestrator this run.
pub const DIAGNOSE_FILE: &str = "diagnose.json";
/// Fixes evaluated by prior runs (merge contract external to this tool).
pub const DIAGNOSED_FILE: &str = "diagnosed.json";

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised during preparation.
#[derive(Debug, Error)]
pub enum PrepareError {
    /// The initial build/re-analysis failed; there is nothing to prepare.
    #[error(transparent)]
    Build(#[from] RescanError),

    /// `fixes.csv` exists but cannot be converted.
    #[error("cannot convert candidate list {path}: {source}")]
    Convert {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// IO error writing a derived artifact.
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A converted record does not parse into a fix.
    #[error(transparent)]
    Fix(#[from] FixError),

    /// JSON error writing a derived artifact.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for preparation.
pub type PrepareResult<T> = Result<T, PrepareError>;

// ============================================================================
// Preparation
// ============================================================================

/// Run the build command, then derive this run's work list.
pub fn prepare(out_dir: &Path, rescanner: &Rescanner, optimized: bool) -> PrepareResult<WorkList> {
    info!("preparing candidate list (optimized: {optimized})");
    rescanner.rescan()?;
    prepare_from_existing(out_dir, optimized)
}

/// Derive the work list from analyzer outputs already on disk.
pub fn prepare_from_existing(out_dir: &Path, optimized: bool) -> PrepareResult<WorkList> {
    let fixes_csv = out_dir.join(FIXES_CSV);
    if !fixes_csv.exists() {
        info!("no candidate fixes deposited, writing empty work list");
        let empty = WorkList::default();
        empty.save(&out_dir.join(DIAGNOSE_FILE))?;
        return Ok(empty);
    }

    let records = convert_fixes_csv(&fixes_csv)?;
    write_work_file(&out_dir.join(FIXES_JSON), &records)?;

    let remaining = if optimized {
        subtract_diagnosed(out_dir, records)
    } else {
        records
    };
    write_work_file(&out_dir.join(DIAGNOSE_FILE), &remaining)?;

    let fixes = remaining
        .iter()
        .map(Fix::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    info!("work list holds {} fixes", fixes.len());
    Ok(WorkList { fixes })
}

/// Convert the analyzer's tabular candidates to string records.
fn convert_fixes_csv(path: &Path) -> PrepareResult<Vec<FixRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|source| PrepareError::Convert {
            path: path.display().to_string(),
            source,
        })?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let row: CsvFixRow = row.map_err(|source| PrepareError::Convert {
            path: path.display().to_string(),
            source,
        })?;
        records.push(FixRecord::from(row));
    }
    Ok(records)
}

fn write_work_file(path: &Path, records: &[FixRecord]) -> PrepareResult<()> {
    let file = WorkListFile {
        fixes: records.to_vec(),
    };
    let data = serde_json::to_string_pretty(&file)?;
    fs::write(path, data).map_err(|source| PrepareError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Drop candidates already diagnosed in prior runs.
///
/// Comparison is by whole record, not identity key: a record differing in
/// any field re-enters the work list. Unreadable prior-run data falls back
/// to the unoptimized full list.
fn subtract_diagnosed(out_dir: &Path, records: Vec<FixRecord>) -> Vec<FixRecord> {
    let diagnosed_path = out_dir.join(DIAGNOSED_FILE);
    let diagnosed: WorkListFile = match fs::read_to_string(&diagnosed_path)
        .map_err(|e| e.to_string())
        .and_then(|data| serde_json::from_str(&data).map_err(|e| e.to_string()))
    {
        Ok(file) => file,
        Err(reason) => {
            warn!(
                "cannot use {} for optimization ({reason}), keeping full list",
                diagnosed_path.display()
            );
            return records;
        }
    };
    let before = records.len();
    let remaining: Vec<FixRecord> = records
        .into_iter()
        .filter(|record| !diagnosed.fixes.contains(record))
        .collect();
    info!(
        "optimization removed {} already-diagnosed fixes",
        before - remaining.len()
    );
    remaining
}

// ============================================================================
// Tests
// ============================================================================
