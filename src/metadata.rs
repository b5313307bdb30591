//! Static relationship graphs built by the offline metadata producer.
//!
//! Three read-only relations answer "who calls/uses/overrides X" queries:
//! the call graph, the field-usage graph, and the method-inheritance tree.
//! Each is loaded once from its tab-separated file at orchestrator start and
//! held immutable for the whole run; a load failure is fatal to the run.
//!
//! Query results use ordered sets so scope iteration (and therefore delta
//! aggregation) is deterministic for identical inputs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// File names the metadata producer deposits in the working directory.
pub const CALL_GRAPH_FILE: &str = "call_graph.csv";
pub const FIELD_GRAPH_FILE: &str = "field_graph.csv";
pub const METHOD_INFO_FILE: &str = "method_info.csv";

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while loading metadata relations.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A metadata file the producer should have written is absent.
    #[error("metadata file not found: {path}")]
    Missing { path: PathBuf },

    /// IO error reading a metadata file.
    #[error("cannot read metadata file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed row in a metadata file.
    #[error("malformed metadata file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

fn read_rows<T: DeserializeOwned>(path: &Path) -> MetadataResult<Vec<T>> {
    if !path.exists() {
        return Err(MetadataError::Missing {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|source| MetadataError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.map_err(|source| MetadataError::Malformed {
            path: path.to_path_buf(),
            source,
        })?);
    }
    Ok(rows)
}

// ============================================================================
// Method Nodes
// ============================================================================

/// A method in the inheritance/call relations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MethodNode {
    /// Method signature.
    pub method: String,
    /// Owning class.
    pub class_name: String,
    /// Source locator of the owning compilation unit.
    pub uri: String,
}

// ============================================================================
// Call Graph
// ============================================================================

#[derive(Debug, Deserialize)]
struct CallGraphRow {
    caller_class: String,
    #[allow(dead_code)]
    caller_method: String,
    callee_class: String,
    callee_method: String,
}

/// Who calls a given method, keyed by (method, owning class).
#[derive(Debug, Default)]
pub struct CallGraph {
    callers: HashMap<(String, String), BTreeSet<String>>,
}

impl CallGraph {
    /// Load from `call_graph.csv`.
    pub fn load(path: &Path) -> MetadataResult<CallGraph> {
        let rows: Vec<CallGraphRow> = read_rows(path)?;
        let mut callers: HashMap<(String, String), BTreeSet<String>> = HashMap::new();
        for row in rows {
            callers
                .entry((row.callee_class, row.callee_method))
                .or_default()
                .insert(row.caller_class);
        }
        Ok(CallGraph { callers })
    }

    /// Classes containing at least one call site of `method` on `class_name`.
    ///
    /// Empty when the method has no recorded callers.
    pub fn user_classes_of_method(&self, method: &str, class_name: &str) -> BTreeSet<String> {
        self.callers
            .get(&(class_name.to_string(), method.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

// ============================================================================
// Field Graph
// ============================================================================

#[derive(Debug, Deserialize)]
struct FieldGraphRow {
    user_class: String,
    #[allow(dead_code)]
    user_method: String,
    owner_class: String,
    field: String,
}

/// Who reads or writes a given field, keyed by (field, owning class).
#[derive(Debug, Default)]
pub struct FieldGraph {
    users: HashMap<(String, String), BTreeSet<String>>,
}

impl FieldGraph {
    /// Load from `field_graph.csv`.
    pub fn load(path: &Path) -> MetadataResult<FieldGraph> {
        let rows: Vec<FieldGraphRow> = read_rows(path)?;
        let mut users: HashMap<(String, String), BTreeSet<String>> = HashMap::new();
        for row in rows {
            users
                .entry((row.owner_class, row.field))
                .or_default()
                .insert(row.user_class);
        }
        Ok(FieldGraph { users })
    }

    /// Classes touching `field` of `owner_class`.
    pub fn user_classes_of_field(&self, field: &str, owner_class: &str) -> BTreeSet<String> {
        self.users
            .get(&(owner_class.to_string(), field.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}

// ============================================================================
// Method Inheritance Tree
// ============================================================================

#[derive(Debug, Deserialize)]
struct MethodInfoRow {
    class: String,
    method: String,
    uri: String,
    super_class: String,
    super_method: String,
}

/// Override relations between methods, walkable in both directions.
#[derive(Debug, Default)]
pub struct MethodInheritanceTree {
    nodes: HashMap<(String, String), MethodNode>,
    parent: HashMap<(String, String), (String, String)>,
    children: HashMap<(String, String), Vec<(String, String)>>,
}

impl MethodInheritanceTree {
    /// Load from `method_info.csv`.
    ///
    /// Rows with empty super columns are override roots.
    pub fn load(path: &Path) -> MetadataResult<MethodInheritanceTree> {
        let rows: Vec<MethodInfoRow> = read_rows(path)?;
        let mut tree = MethodInheritanceTree::default();
        for row in rows {
            let key = (row.class.clone(), row.method.clone());
            tree.nodes.insert(
                key.clone(),
                MethodNode {
                    method: row.method,
                    class_name: row.class,
                    uri: row.uri,
                },
            );
            if !row.super_class.is_empty() && !row.super_method.is_empty() {
                let parent_key = (row.super_class, row.super_method);
                tree.children
                    .entry(parent_key.clone())
                    .or_default()
                    .push(key.clone());
                tree.parent.insert(key, parent_key);
            }
        }
        for siblings in tree.children.values_mut() {
            siblings.sort();
        }
        Ok(tree)
    }

    /// Transitive overriding methods of `method` on `class_name`,
    /// in sorted (deterministic) order.
    pub fn sub_methods(&self, method: &str, class_name: &str) -> Vec<MethodNode> {
        let start = (class_name.to_string(), method.to_string());
        let mut out = Vec::new();
        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut queue: Vec<(String, String)> = vec![start];
        while let Some(key) = queue.pop() {
            if let Some(kids) = self.children.get(&key) {
                for kid in kids {
                    if visited.insert(kid.clone()) {
                        if let Some(node) = self.nodes.get(kid) {
                            out.push(node.clone());
                        }
                        queue.push(kid.clone());
                    }
                }
            }
        }
        out.sort();
        out
    }

    /// Transitive overridden methods of `method` on `class_name`,
    /// nearest ancestor first.
    pub fn super_methods(&self, method: &str, class_name: &str) -> Vec<MethodNode> {
        let mut out = Vec::new();
        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut key = (class_name.to_string(), method.to_string());
        while let Some(parent_key) = self.parent.get(&key) {
            if !visited.insert(parent_key.clone()) {
                break; // malformed cyclic input
            }
            if let Some(node) = self.nodes.get(parent_key) {
                out.push(node.clone());
            }
            key = parent_key.clone();
        }
        out
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// All three relations, loaded once per run from the working directory.
#[derive(Debug)]
pub struct Metadata {
    pub call_graph: CallGraph,
    pub field_graph: FieldGraph,
    pub inheritance: MethodInheritanceTree,
}

impl Metadata {
    pub fn load(out_dir: &Path) -> MetadataResult<Metadata> {
        Ok(Metadata {
            call_graph: CallGraph::load(&out_dir.join(CALL_GRAPH_FILE))?,
            field_graph: FieldGraph::load(&out_dir.join(FIELD_GRAPH_FILE))?,
            inheritance: MethodInheritanceTree::load(&out_dir.join(METHOD_INFO_FILE))?,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
