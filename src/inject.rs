//! The annotation injector seam.
//!
//! Physically editing source text is an external collaborator's job. Core
//! hands the injector a work list of edits and gets back one outcome per
//! edit; it relies on the collaborator's guarantee that an edit and its
//! inverse are exact opposites, and never touches source text itself.
//!
//! `ProcessInjector` talks to an external mutator command with a one-shot
//! JSON-over-pipes exchange: the work list goes to stdin, the per-edit
//! results come back on stdout.

use std::io::Write;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fix::{FixRecord, WorkList};

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while driving the external mutator.
#[derive(Debug, Error)]
pub enum InjectError {
    /// No mutator command configured.
    #[error("empty injector command")]
    EmptyCommand,

    /// The mutator process could not be spawned or piped.
    #[error("injector IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The mutator exited unsuccessfully.
    #[error("injector command failed (exit code {exit_code:?}): {stderr}")]
    CommandFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The mutator's response did not follow the exchange contract.
    #[error("injector protocol error: {reason}")]
    Protocol { reason: String },

    /// Unparseable JSON on the mutator's stdout.
    #[error("injector response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for injector operations.
pub type InjectResult<T> = Result<T, InjectError>;

// ============================================================================
// Seam
// ============================================================================

/// Success or failure of one requested edit.
#[derive(Debug, Clone, Deserialize)]
pub struct InjectionOutcome {
    /// Whether the edit landed in the source.
    pub applied: bool,
    /// Mutator-provided detail for rejected edits.
    #[serde(default)]
    pub message: Option<String>,
}

/// Narrow interface to the external text mutator.
pub trait Injector {
    /// Apply every edit in the work list, returning one outcome per edit
    /// in the same order.
    fn inject(&mut self, work: &WorkList) -> InjectResult<Vec<InjectionOutcome>>;
}

// ============================================================================
// Process-Backed Injector
// ============================================================================

/// Exchange request written to the mutator's stdin.
#[derive(Debug, Serialize)]
struct InjectRequest<'a> {
    fixes: &'a [FixRecord],
}

/// Exchange response read from the mutator's stdout.
#[derive(Debug, Deserialize)]
struct InjectResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    results: Vec<InjectionOutcome>,
}

/// Injector backed by an external mutator command.
#[derive(Debug, Clone)]
pub struct ProcessInjector {
    command: Vec<String>,
}

impl ProcessInjector {
    /// Wrap an argv-style command.
    pub fn new(command: Vec<String>) -> Self {
        ProcessInjector { command }
    }

    /// Wrap a shell command line.
    pub fn from_shell(command_line: &str) -> Self {
        ProcessInjector {
            command: vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                command_line.to_string(),
            ],
        }
    }
}

impl Injector for ProcessInjector {
    fn inject(&mut self, work: &WorkList) -> InjectResult<Vec<InjectionOutcome>> {
        if self.command.is_empty() {
            return Err(InjectError::EmptyCommand);
        }

        let records: Vec<FixRecord> = work.fixes.iter().map(FixRecord::from).collect();
        let request = serde_json::to_string(&InjectRequest { fixes: &records })?;

        let mut child = Command::new(&self.command[0])
            .args(&self.command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(request.as_bytes())?;
        }
        let output = child.wait_with_output()?;

        if !output.status.success() {
            return Err(InjectError::CommandFailed {
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            });
        }

        let response: InjectResponse = serde_json::from_slice(&output.stdout)?;
        if response.status != "ok" {
            return Err(InjectError::Protocol {
                reason: response
                    .message
                    .unwrap_or_else(|| format!("mutator status '{}'", response.status)),
            });
        }
        if response.results.len() != work.fixes.len() {
            return Err(InjectError::Protocol {
                reason: format!(
                    "expected {} edit results, got {}",
                    work.fixes.len(),
                    response.results.len()
                ),
            });
        }
        Ok(response.results)
    }
}

// ============================================================================
// Recording Injector (test support)
// ============================================================================

/// Injector double that applies nothing and records every work list.
///
/// Used by the test suite to assert which edits the orchestrator issued and
/// in what order; every edit reports success.
#[derive(Debug, Default)]
pub struct RecordingInjector {
    /// Every work list received, in call order.
    pub calls: Vec<WorkList>,
}

impl Injector for RecordingInjector {
    fn inject(&mut self, work: &WorkList) -> InjectResult<Vec<InjectionOutcome>> {
        self.calls.push(work.clone());
        Ok(work
            .fixes
            .iter()
            .map(|_| InjectionOutcome {
                applied: true,
                message: None,
            })
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
