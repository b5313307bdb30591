//! Error indexing and before/after deltas.
//!
//! The analyzer deposits its current findings in `errors.csv` on every
//! re-scan. The `Bank` captures two root snapshots of that file at
//! construction time (grouped by class and by class+method) and computes
//! signed deltas between the roots and any later snapshot. Snapshots are
//! immutable values: "current" state is always an explicit `Index` handed
//! around, never a mutable field.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// File the analyzer deposits its findings in on every re-scan.
pub const ERRORS_FILE: &str = "errors.csv";

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while building or refreshing error indexes.
#[derive(Debug, Error)]
pub enum BankError {
    /// IO error reading the analyzer's error log.
    #[error("cannot read error log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed row in the analyzer's error log.
    #[error("malformed error log {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// The two root groupings disagree on the total error count.
    ///
    /// Both indexes are built from the same snapshot of the error log, so a
    /// mismatch means the grouping logic itself is broken. Fatal at
    /// construction time.
    #[error("root snapshot groupings disagree: {by_class} by class vs {by_method} by method")]
    GroupTotalsDisagree { by_class: usize, by_method: usize },
}

/// Result type for bank operations.
pub type BankResult<T> = Result<T, BankError>;

// ============================================================================
// Error Records
// ============================================================================

/// One finding reported by the external analyzer.
///
/// Core never constructs these; they are only parsed from `errors.csv`,
/// indexed, and counted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorRecord {
    /// Analyzer-specific error kind.
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Containing class.
    #[serde(rename = "class")]
    pub class_name: String,
    /// Containing method signature (empty for class-level findings).
    pub method: String,
    /// File the finding points at.
    pub file: String,
}

/// Read the analyzer's error log.
///
/// An absent log is the clean-build case and yields an empty set.
pub fn read_error_log(path: &Path) -> BankResult<Vec<ErrorRecord>> {
    if !path.exists() {
        tracing::debug!("no error log at {}, treating as clean", path.display());
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|source| BankError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        let record: ErrorRecord = row.map_err(|source| BankError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

// ============================================================================
// Index
// ============================================================================

/// Grouping granularity of an `Index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// Group findings by containing class.
    Class,
    /// Group findings by (containing class, containing method).
    Method,
}

/// An immutable snapshot of the current error set, grouped one way.
///
/// Cheap, throwaway comparison baseline. The total count is identical
/// whichever grouping is chosen for the same underlying snapshot.
#[derive(Debug, Clone)]
pub struct Index {
    group: GroupBy,
    entries: HashMap<(String, String), Vec<ErrorRecord>>,
    total: usize,
}

impl Index {
    /// Group a snapshot of error records.
    pub fn build(records: &[ErrorRecord], group: GroupBy) -> Index {
        let mut entries: HashMap<(String, String), Vec<ErrorRecord>> = HashMap::new();
        for record in records {
            let key = match group {
                GroupBy::Class => (record.class_name.clone(), String::new()),
                GroupBy::Method => (record.class_name.clone(), record.method.clone()),
            };
            entries.entry(key).or_default().push(record.clone());
        }
        Index {
            group,
            entries,
            total: records.len(),
        }
    }

    pub fn group(&self) -> GroupBy {
        self.group
    }

    /// Total finding count across all groups.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Findings in a class. Only meaningful on a class-grouped index.
    pub fn count_class(&self, class_name: &str) -> usize {
        debug_assert_eq!(self.group, GroupBy::Class);
        self.entries
            .get(&(class_name.to_string(), String::new()))
            .map_or(0, Vec::len)
    }

    /// Findings in a method. Only meaningful on a method-grouped index.
    pub fn count_method(&self, class_name: &str, method: &str) -> usize {
        debug_assert_eq!(self.group, GroupBy::Method);
        self.entries
            .get(&(class_name.to_string(), method.to_string()))
            .map_or(0, Vec::len)
    }
}

// ============================================================================
// Bank
// ============================================================================

/// The error-indexing and diffing component.
///
/// Root snapshots are captured once at construction and are invariant for
/// the run; fresh snapshots re-read the error log the analyzer last wrote.
#[derive(Debug)]
pub struct Bank {
    errors_path: PathBuf,
    root_by_class: Index,
    root_by_method: Index,
}

impl Bank {
    /// Capture root snapshots from the analyzer's error log.
    pub fn load(errors_path: &Path) -> BankResult<Bank> {
        let records = read_error_log(errors_path)?;
        let by_class = Index::build(&records, GroupBy::Class);
        let by_method = Index::build(&records, GroupBy::Method);
        Bank::from_root_indexes(errors_path.to_path_buf(), by_class, by_method)
    }

    /// Assemble a bank from pre-built root indexes.
    ///
    /// Enforces the grouping-total invariant; construction fails when the
    /// two groupings disagree.
    pub fn from_root_indexes(
        errors_path: PathBuf,
        root_by_class: Index,
        root_by_method: Index,
    ) -> BankResult<Bank> {
        if root_by_class.total() != root_by_method.total() {
            return Err(BankError::GroupTotalsDisagree {
                by_class: root_by_class.total(),
                by_method: root_by_method.total(),
            });
        }
        Ok(Bank {
            errors_path,
            root_by_class,
            root_by_method,
        })
    }

    /// Total finding count in the root snapshot.
    pub fn root_total(&self) -> usize {
        self.root_by_class.total()
    }

    /// Build a fresh index from the error log as it stands now.
    ///
    /// Cost is proportional to the total finding count.
    pub fn snapshot(&self, group: GroupBy) -> BankResult<Index> {
        let records = read_error_log(&self.errors_path)?;
        Ok(Index::build(&records, group))
    }

    /// Signed finding delta for one class: fresh minus root.
    ///
    /// Positive means the last edit introduced findings in that class,
    /// negative means it fixed some.
    pub fn delta_by_class(&self, class_name: &str, fresh: &Index) -> i64 {
        fresh.count_class(class_name) as i64 - self.root_by_class.count_class(class_name) as i64
    }

    /// Signed finding delta for one method: fresh minus root.
    pub fn delta_by_method(&self, class_name: &str, method: &str, fresh: &Index) -> i64 {
        fresh.count_method(class_name, method) as i64
            - self.root_by_method.count_method(class_name, method) as i64
    }

    /// Global sanity signal: total current count minus root total,
    /// independent of any scoping.
    pub fn total_delta(&self) -> BankResult<i64> {
        let records = read_error_log(&self.errors_path)?;
        Ok(records.len() as i64 - self.root_total() as i64)
    }
}

// ============================================================================
// Tests
// ============================================================================
