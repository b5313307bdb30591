//! Sift: feedback-driven search for safe source annotations.
//!
//! Sift automates the discovery of a minimal, safe set of annotation edits
//! that eliminate reports from an external static checker. It applies each
//! candidate edit through an external mutator, triggers a re-analysis,
//! measures the before/after error delta in the edit's neighborhood, and
//! keeps only the edits that do not regress.

// Core engine
pub mod bank;
pub mod diagnose;
pub mod explore;
pub mod fix;
pub mod metadata;
pub mod prepare;
pub mod report;

// External collaborator seams
pub mod inject;
pub mod rescan;

// Front door
pub mod cli;
pub mod error;
