//! Diagnose reports and the per-run report store.
//!
//! One `DiagnoseReport` exists per distinct fix ever attempted, keyed by the
//! fix's identity key so repeated runs skip work already done. The store is
//! an explicit owned value passed into and returned from the orchestrator;
//! nothing here is process-global.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::fix::{Fix, FixError, FixKey, FixRecord};

/// File the run's reports are flushed to.
pub const REPORT_FILE: &str = "diagnose_report.json";

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while persisting or restoring reports.
#[derive(Debug, Error)]
pub enum ReportError {
    /// IO error on the report file.
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON error on the report file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A persisted fix record no longer parses.
    #[error(transparent)]
    Record(#[from] FixError),
}

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

// ============================================================================
// Reports
// ============================================================================

/// Keep-or-revert decision for one measured fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// The edit did not regress the error count and stays in.
    Kept,
    /// The edit introduced findings and was rolled back.
    Reverted,
}

/// The measured effect of one attempted fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnoseReport {
    pub fix: Fix,
    /// Aggregate signed finding delta over the re-checked scope.
    pub delta: i64,
    pub decision: Decision,
    /// True when the fix had an empty re-check scope, so the zero delta is
    /// an absence of evidence rather than a measurement.
    pub degenerate: bool,
    /// The classes whose counts were compared, in diff order.
    pub scope: Vec<String>,
}

/// Serialized report shape (fix fields as strings, like every exchange file).
#[derive(Debug, Serialize, Deserialize)]
struct ReportRecord {
    fix: FixRecord,
    delta: i64,
    decision: Decision,
    degenerate: bool,
    scope: Vec<String>,
}

impl From<&DiagnoseReport> for ReportRecord {
    fn from(report: &DiagnoseReport) -> Self {
        ReportRecord {
            fix: FixRecord::from(&report.fix),
            delta: report.delta,
            decision: report.decision,
            degenerate: report.degenerate,
            scope: report.scope.clone(),
        }
    }
}

impl TryFrom<&ReportRecord> for DiagnoseReport {
    type Error = ReportError;

    fn try_from(record: &ReportRecord) -> ReportResult<DiagnoseReport> {
        Ok(DiagnoseReport {
            fix: Fix::try_from(&record.fix)?,
            delta: record.delta,
            decision: record.decision,
            degenerate: record.degenerate,
            scope: record.scope.clone(),
        })
    }
}

/// File shape of `diagnose_report.json`.
#[derive(Debug, Serialize, Deserialize)]
struct ReportFile {
    generated_at: String,
    reports: Vec<ReportRecord>,
}

// ============================================================================
// Report Store
// ============================================================================

/// Ordered, deduplicated record of every fix attempted.
#[derive(Debug, Default)]
pub struct ReportStore {
    reports: Vec<DiagnoseReport>,
    seen: HashSet<FixKey>,
}

impl ReportStore {
    pub fn new() -> Self {
        ReportStore::default()
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Whether an equal fix (by identity key) was already diagnosed.
    pub fn contains_fix(&self, fix: &Fix) -> bool {
        self.seen.contains(&fix.key())
    }

    /// Record a report. Returns false (and keeps the first record) when an
    /// equal fix is already present.
    pub fn insert(&mut self, report: DiagnoseReport) -> bool {
        if !self.seen.insert(report.fix.key()) {
            return false;
        }
        self.reports.push(report);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnoseReport> {
        self.reports.iter()
    }

    pub fn kept_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.decision == Decision::Kept)
            .count()
    }

    pub fn reverted_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.decision == Decision::Reverted)
            .count()
    }

    /// Write the store with a fresh timestamp.
    pub fn save(&self, path: &Path) -> ReportResult<()> {
        let file = ReportFile {
            generated_at: chrono::Utc::now().to_rfc3339(),
            reports: self.reports.iter().map(ReportRecord::from).collect(),
        };
        let data = serde_json::to_string_pretty(&file)?;
        fs::write(path, data).map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Read a store back from disk.
    pub fn load(path: &Path) -> ReportResult<ReportStore> {
        let data = fs::read_to_string(path).map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: ReportFile = serde_json::from_str(&data)?;
        let mut store = ReportStore::new();
        for record in &file.reports {
            store.insert(DiagnoseReport::try_from(record)?);
        }
        Ok(store)
    }

    /// Read a store, treating an absent or unreadable file as empty.
    ///
    /// The file is this tool's own prior output; when it is corrupt the run
    /// proceeds without cross-run dedup rather than failing.
    pub fn load_or_empty(path: &Path) -> ReportStore {
        if !path.exists() {
            return ReportStore::new();
        }
        match ReportStore::load(path) {
            Ok(store) => store,
            Err(e) => {
                warn!("ignoring unreadable report file {}: {e}", path.display());
                ReportStore::new()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fix::FixLocation;
    use tempfile::TempDir;

    fn sample_report(class: &str, delta: i64, decision: Decision) -> DiagnoseReport {
        DiagnoseReport {
            fix: Fix {
                annotation: "javax.annotation.Nullable".to_string(),
                location: FixLocation::Return,
                class_name: class.to_string(),
                method: "m()".to_string(),
                target: String::new(),
                uri: format!("src/{class}.java"),
                inject: true,
            },
            delta,
            decision,
            degenerate: false,
            scope: vec!["A".to_string()],
        }
    }

    mod dedup {
        use super::*;

        #[test]
        fn equal_fix_is_recorded_once() {
            let mut store = ReportStore::new();
            assert!(store.insert(sample_report("W", 0, Decision::Kept)));
            assert!(!store.insert(sample_report("W", 2, Decision::Reverted)));
            assert_eq!(store.len(), 1);
            assert_eq!(store.iter().next().unwrap().decision, Decision::Kept);
        }

        #[test]
        fn inverse_fix_counts_as_the_same_work() {
            let mut store = ReportStore::new();
            let report = sample_report("W", 0, Decision::Kept);
            let inverse = report.fix.inverse();
            store.insert(report);
            assert!(store.contains_fix(&inverse));
        }
    }

    mod persistence {
        use super::*;

        #[test]
        fn save_and_load_round_trip() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("diagnose_report.json");
            let mut store = ReportStore::new();
            store.insert(sample_report("A", -1, Decision::Kept));
            store.insert(sample_report("B", 3, Decision::Reverted));
            store.save(&path).unwrap();

            let loaded = ReportStore::load(&path).unwrap();
            assert_eq!(loaded.len(), 2);
            assert_eq!(loaded.kept_count(), 1);
            assert_eq!(loaded.reverted_count(), 1);
        }

        #[test]
        fn report_file_carries_a_timestamp() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("diagnose_report.json");
            ReportStore::new().save(&path).unwrap();
            let value: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
            assert!(value["generated_at"].is_string());
            assert_eq!(value["reports"], serde_json::json!([]));
        }

        #[test]
        fn absent_file_loads_as_empty() {
            let dir = TempDir::new().unwrap();
            let store = ReportStore::load_or_empty(&dir.path().join("absent.json"));
            assert!(store.is_empty());
        }

        #[test]
        fn corrupt_file_loads_as_empty() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("diagnose_report.json");
            std::fs::write(&path, "{not json").unwrap();
            let store = ReportStore::load_or_empty(&path);
            assert!(store.is_empty());
        }
    }
}
