//! Opaque re-analysis step.
//!
//! The external analyzer is driven through a single build command. Running
//! it re-scans the project and deposits a fresh error log (and, on the first
//! run, the candidate fix list) as a side effect; core never parses the
//! command's own output beyond success/failure.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Default ceiling for one re-analysis run.
pub const DEFAULT_RESCAN_TIMEOUT: Duration = Duration::from_secs(600);

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised by the build/re-analysis step.
#[derive(Debug, Error)]
pub enum RescanError {
    /// No build command configured.
    #[error("empty build command")]
    EmptyCommand,

    /// The build command could not be spawned.
    #[error("cannot spawn build command: {0}")]
    Io(#[from] std::io::Error),

    /// The build command exited unsuccessfully.
    #[error("build command failed (exit code {exit_code:?})")]
    BuildFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// The build command exceeded its timeout and was killed.
    ///
    /// Treated by callers exactly like a build failure.
    #[error("build command timed out after {limit:?}")]
    Timeout { limit: Duration },
}

/// Result type for rescan operations.
pub type RescanResult<T> = Result<T, RescanError>;

// ============================================================================
// Rescanner
// ============================================================================

/// Outcome of a completed re-analysis run.
#[derive(Debug)]
pub struct RescanOutcome {
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

/// Runs the configured build command with an exclusive, blocking wait.
#[derive(Debug, Clone)]
pub struct Rescanner {
    command: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
}

impl Rescanner {
    /// Wrap an argv-style build command.
    pub fn new(command: Vec<String>, workdir: &Path, timeout: Duration) -> Self {
        Rescanner {
            command,
            workdir: workdir.to_path_buf(),
            timeout,
        }
    }

    /// Wrap a shell command line.
    pub fn from_shell(command_line: &str, workdir: &Path, timeout: Duration) -> Self {
        Rescanner {
            command: vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                command_line.to_string(),
            ],
            workdir: workdir.to_path_buf(),
            timeout,
        }
    }

    /// Trigger one full re-analysis and block until it finishes.
    ///
    /// On timeout the child is killed and reaped, and the expiry is
    /// reported as `RescanError::Timeout`.
    pub fn rescan(&self) -> RescanResult<RescanOutcome> {
        if self.command.is_empty() {
            return Err(RescanError::EmptyCommand);
        }

        let start = Instant::now();
        debug!("re-analysis: {:?}", self.command);

        let mut child = Command::new(&self.command[0])
            .args(&self.command[1..])
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        match child.wait_timeout(self.timeout)? {
            Some(status) => {
                let duration = start.elapsed();
                if !status.success() {
                    let stderr = child
                        .stderr
                        .take()
                        .map(|mut s| {
                            let mut buf = Vec::new();
                            std::io::Read::read_to_end(&mut s, &mut buf).ok();
                            String::from_utf8_lossy(&buf).to_string()
                        })
                        .unwrap_or_default();
                    return Err(RescanError::BuildFailed {
                        exit_code: status.code(),
                        stderr,
                    });
                }
                debug!("re-analysis finished in {:?}", duration);
                Ok(RescanOutcome {
                    exit_code: status.code(),
                    duration,
                })
            }
            None => {
                let _ = child.kill();
                let _ = child.wait(); // reap
                warn!(
                    "re-analysis timed out after {:?}: {:?}",
                    self.timeout, self.command
                );
                Err(RescanError::Timeout {
                    limit: self.timeout,
                })
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
    use tempfile::TempDir;

    fn rescanner(dir: &TempDir, script: &str, timeout: Duration) -> Rescanner {
        Rescanner::from_shell(script, dir.path(), timeout)
    }

    #[test]
    fn successful_command_reports_its_duration() {
        let dir = TempDir::new().unwrap();
        let outcome = rescanner(&dir, "true", DEFAULT_RESCAN_TIMEOUT)
            .rescan()
            .unwrap();
        assert_eq!(outcome.exit_code, Some(0));
    }

    #[test]
    fn command_runs_in_the_working_directory() {
        let dir = TempDir::new().unwrap();
        rescanner(&dir, "echo done > marker.txt", DEFAULT_RESCAN_TIMEOUT)
            .rescan()
            .unwrap();
        assert!(dir.path().join("marker.txt").exists());
    }

    #[test]
    fn failing_command_surfaces_exit_code_and_stderr() {
        let dir = TempDir::new().unwrap();
        let err = rescanner(&dir, "echo broken >&2; exit 2", DEFAULT_RESCAN_TIMEOUT)
            .rescan()
            .unwrap_err();
        match err {
            RescanError::BuildFailed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(2));
                assert!(stderr.contains("broken"));
            }
            other => panic!("expected BuildFailed, got {other:?}"),
        }
    }

    #[test]
    fn overrunning_command_is_killed_and_reported() {
        let dir = TempDir::new().unwrap();
        let err = rescanner(&dir, "sleep 5", Duration::from_millis(100))
            .rescan()
            .unwrap_err();
        assert!(matches!(err, RescanError::Timeout { .. }));
    }

    #[test]
    fn empty_command_is_rejected() {
        let dir = TempDir::new().unwrap();
        let rescanner = Rescanner::new(Vec::new(), dir.path(), DEFAULT_RESCAN_TIMEOUT);
        assert!(matches!(rescanner.rescan(), Err(RescanError::EmptyCommand)));
    }
}
