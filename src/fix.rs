//! Fix values, identity keys, and work lists.
//!
//! A `Fix` is a single proposed annotation edit at a specific source
//! location. Fixes are immutable values: the inverse of a fix (the edit that
//! removes the annotation again) is the same value with only the `inject`
//! flag flipped, so an apply followed by its inverse restores the original
//! source exactly.
//!
//! Two serialized shapes exist for the same data:
//! - `FixRecord`: every field as a string, the exchange format used by
//!   `fixes.json`, `diagnose.json`, and `diagnosed.json`
//! - `CsvFixRow`: the tabular row the analyzer deposits in `fixes.csv`
//!   (candidates carry no inject column; they are always insertions)

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while parsing or loading fix data.
#[derive(Debug, Error)]
pub enum FixError {
    /// Unknown target location kind in a serialized record.
    #[error("unknown fix location '{value}' (expected PARAMETER, FIELD, or RETURN)")]
    InvalidLocation { value: String },

    /// Unparseable inject flag in a serialized record.
    #[error("invalid inject flag '{value}' (expected 'true' or 'false')")]
    InvalidInjectFlag { value: String },

    /// IO error while reading or writing a work list file.
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON error while reading or writing a work list file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for fix operations.
pub type FixResult<T> = Result<T, FixError>;

// ============================================================================
// Fix Location
// ============================================================================

/// Target location kind of an annotation edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixLocation {
    /// A method parameter.
    Parameter,
    /// A class field.
    Field,
    /// A method return type.
    Return,
}

impl FixLocation {
    /// Parse from the serialized token.
    pub fn parse(s: &str) -> FixResult<Self> {
        match s {
            "PARAMETER" => Ok(FixLocation::Parameter),
            "FIELD" => Ok(FixLocation::Field),
            "RETURN" => Ok(FixLocation::Return),
            _ => Err(FixError::InvalidLocation {
                value: s.to_string(),
            }),
        }
    }

    /// Serialized token for this location kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FixLocation::Parameter => "PARAMETER",
            FixLocation::Field => "FIELD",
            FixLocation::Return => "RETURN",
        }
    }
}

impl fmt::Display for FixLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Fix
// ============================================================================

/// A single proposed annotation edit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fix {
    /// Fully qualified annotation to insert (or remove).
    pub annotation: String,
    /// Target location kind.
    pub location: FixLocation,
    /// Containing class.
    pub class_name: String,
    /// Containing method signature (empty for class-level fields).
    pub method: String,
    /// Parameter index or field name the edit targets.
    pub target: String,
    /// Source locator of the containing compilation unit.
    pub uri: String,
    /// `true` inserts the annotation, `false` removes it.
    pub inject: bool,
}

impl Fix {
    /// The semantic inverse of this edit: same location, flipped flag.
    pub fn inverse(&self) -> Fix {
        Fix {
            inject: !self.inject,
            ..self.clone()
        }
    }

    /// Identity key for dedup across runs.
    ///
    /// Ignores `inject` (a fix and its inverse are the same unit of work)
    /// and `uri` (a relocated file does not make the edit a new fix).
    pub fn key(&self) -> FixKey {
        FixKey {
            annotation: self.annotation.clone(),
            location: self.location,
            class_name: self.class_name.clone(),
            method: self.method.clone(),
            target: self.target.clone(),
        }
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at {}#{}[{}]",
            self.annotation, self.location, self.class_name, self.method, self.target
        )
    }
}

/// Identity of a fix, independent of direction and file location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FixKey {
    pub annotation: String,
    pub location: FixLocation,
    pub class_name: String,
    pub method: String,
    pub target: String,
}

// ============================================================================
// Serialized Records
// ============================================================================

/// Exchange record: every fix field as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixRecord {
    pub annotation: String,
    pub location: String,
    pub class: String,
    pub method: String,
    pub target: String,
    pub uri: String,
    pub inject: String,
}

impl From<&Fix> for FixRecord {
    fn from(fix: &Fix) -> Self {
        FixRecord {
            annotation: fix.annotation.clone(),
            location: fix.location.as_str().to_string(),
            class: fix.class_name.clone(),
            method: fix.method.clone(),
            target: fix.target.clone(),
            uri: fix.uri.clone(),
            inject: fix.inject.to_string(),
        }
    }
}

impl TryFrom<&FixRecord> for Fix {
    type Error = FixError;

    fn try_from(record: &FixRecord) -> FixResult<Fix> {
        let inject = match record.inject.as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(FixError::InvalidInjectFlag {
                    value: other.to_string(),
                })
            }
        };
        Ok(Fix {
            annotation: record.annotation.clone(),
            location: FixLocation::parse(&record.location)?,
            class_name: record.class.clone(),
            method: record.method.clone(),
            target: record.target.clone(),
            uri: record.uri.clone(),
            inject,
        })
    }
}

/// Row shape of `fixes.csv` as the analyzer writes it.
///
/// Candidates have no inject column; conversion always yields an insertion.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvFixRow {
    pub annotation: String,
    pub location: String,
    pub class: String,
    pub method: String,
    pub target: String,
    pub uri: String,
}

impl From<CsvFixRow> for FixRecord {
    fn from(row: CsvFixRow) -> Self {
        FixRecord {
            annotation: row.annotation,
            location: row.location,
            class: row.class,
            method: row.method,
            target: row.target,
            uri: row.uri,
            inject: "true".to_string(),
        }
    }
}

// ============================================================================
// Work List
// ============================================================================

/// The ordered set of fixes to evaluate in one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkList {
    pub fixes: Vec<Fix>,
}

/// File shape of `diagnose.json` and friends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkListFile {
    pub fixes: Vec<FixRecord>,
}

impl WorkList {
    /// Build a work list from a single fix.
    pub fn single(fix: Fix) -> Self {
        WorkList { fixes: vec![fix] }
    }

    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    /// Read a work list from a `{"fixes":[...]}` JSON file.
    pub fn load(path: &Path) -> FixResult<WorkList> {
        let data = fs::read_to_string(path).map_err(|source| FixError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: WorkListFile = serde_json::from_str(&data)?;
        let fixes = file
            .fixes
            .iter()
            .map(Fix::try_from)
            .collect::<FixResult<Vec<_>>>()?;
        Ok(WorkList { fixes })
    }

    /// Write a work list as a `{"fixes":[...]}` JSON file.
    pub fn save(&self, path: &Path) -> FixResult<()> {
        let file = WorkListFile {
            fixes: self.fixes.iter().map(FixRecord::from).collect(),
        };
        let data = serde_json::to_string_pretty(&file)?;
        fs::write(path, data).map_err(|source| FixError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_fix() -> Fix {
        Fix {
            annotation: "javax.annotation.Nullable".to_string(),
            location: FixLocation::Return,
            class_name: "com.example.Widget".to_string(),
            method: "render(int)".to_string(),
            target: "".to_string(),
            uri: "src/com/example/Widget.java".to_string(),
            inject: true,
        }
    }

    mod inverse_law {
        use super::*;

        #[test]
        fn inverse_flips_only_the_inject_flag_for_every_location_kind() {
            for location in [FixLocation::Parameter, FixLocation::Field, FixLocation::Return] {
                let fix = Fix {
                    location,
                    ..sample_fix()
                };
                let inverse = fix.inverse();
                assert!(!inverse.inject);
                assert_eq!(inverse.annotation, fix.annotation);
                assert_eq!(inverse.location, fix.location);
                assert_eq!(inverse.class_name, fix.class_name);
                assert_eq!(inverse.method, fix.method);
                assert_eq!(inverse.target, fix.target);
                assert_eq!(inverse.uri, fix.uri);
            }
        }

        #[test]
        fn double_inverse_is_identity() {
            let fix = sample_fix();
            assert_eq!(fix.inverse().inverse(), fix);
        }
    }

    mod identity_key {
        use super::*;

        #[test]
        fn key_ignores_inject_flag() {
            let fix = sample_fix();
            assert_eq!(fix.key(), fix.inverse().key());
        }

        #[test]
        fn key_ignores_uri() {
            let fix = sample_fix();
            let moved = Fix {
                uri: "src/moved/Widget.java".to_string(),
                ..fix.clone()
            };
            assert_eq!(fix.key(), moved.key());
        }

        #[test]
        fn key_distinguishes_targets() {
            let fix = sample_fix();
            let other = Fix {
                target: "0".to_string(),
                location: FixLocation::Parameter,
                ..fix.clone()
            };
            assert_ne!(fix.key(), other.key());
        }
    }

    mod records {
        use super::*;

        #[test]
        fn record_round_trip() {
            let fix = sample_fix();
            let record = FixRecord::from(&fix);
            assert_eq!(record.location, "RETURN");
            assert_eq!(record.inject, "true");
            let back = Fix::try_from(&record).unwrap();
            assert_eq!(back, fix);
        }

        #[test]
        fn bad_location_is_rejected() {
            let mut record = FixRecord::from(&sample_fix());
            record.location = "METHOD_RETURN".to_string();
            assert!(matches!(
                Fix::try_from(&record),
                Err(FixError::InvalidLocation { .. })
            ));
        }

        #[test]
        fn bad_inject_flag_is_rejected() {
            let mut record = FixRecord::from(&sample_fix());
            record.inject = "yes".to_string();
            assert!(matches!(
                Fix::try_from(&record),
                Err(FixError::InvalidInjectFlag { .. })
            ));
        }

        #[test]
        fn csv_row_converts_to_insertion() {
            let row = CsvFixRow {
                annotation: "javax.annotation.Nullable".to_string(),
                location: "FIELD".to_string(),
                class: "com.example.Widget".to_string(),
                method: "".to_string(),
                target: "cache".to_string(),
                uri: "src/com/example/Widget.java".to_string(),
            };
            let record = FixRecord::from(row);
            assert_eq!(record.inject, "true");
        }
    }

    mod work_list_files {
        use super::*;
        use tempfile::TempDir;

        #[test]
        fn save_and_load_round_trip() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("diagnose.json");
            let list = WorkList {
                fixes: vec![sample_fix(), sample_fix().inverse()],
            };
            list.save(&path).unwrap();
            let loaded = WorkList::load(&path).unwrap();
            assert_eq!(loaded, list);
        }

        #[test]
        fn empty_list_serializes_as_empty_fixes_array() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("diagnose.json");
            WorkList::default().save(&path).unwrap();
            let raw = std::fs::read_to_string(&path).unwrap();
            let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
            assert_eq!(value["fixes"], serde_json::json!([]));
        }

        #[test]
        fn missing_file_is_an_io_error() {
            let dir = TempDir::new().unwrap();
            let result = WorkList::load(&dir.path().join("absent.json"));
            assert!(matches!(result, Err(FixError::Io { .. })));
        }
    }
}
