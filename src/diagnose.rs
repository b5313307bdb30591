//! The orchestrator: drives the work list one fix at a time.
//!
//! Each fix moves through apply, evaluate, and a keep-or-revert step. The
//! run is strictly sequential: every fix needs an exclusive, consistent view
//! of the codebase between apply and evaluate, so nothing here overlaps two
//! fixes' cycles. A failure inside one fix's cycle is logged and the loop
//! moves on; the failing fix stays unrecorded and is retried on the next
//! invocation.
//!
//! Physical edits follow the measured decision: a kept fix stays in the
//! source, a reverted fix has its inverse issued through the mutator.
//! Measurement-only runs (`revert_all`) roll back kept fixes too, leaving
//! the codebase untouched while the reports still carry the decisions.

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bank::Bank;
use crate::explore::{self, ExploreError};
use crate::fix::{Fix, FixLocation, WorkList};
use crate::inject::{InjectError, Injector};
use crate::metadata::Metadata;
use crate::report::{Decision, DiagnoseReport, ReportStore};
use crate::rescan::{RescanError, Rescanner};

// ============================================================================
// Error Types
// ============================================================================

/// Failures inside one fix's apply/evaluate cycle.
///
/// All variants are caught at the loop boundary; none aborts the run.
#[derive(Debug, Error)]
pub enum DiagnoseError {
    /// The mutator could not be driven.
    #[error(transparent)]
    Inject(#[from] InjectError),

    /// The re-analysis step failed or timed out.
    #[error(transparent)]
    Rescan(#[from] RescanError),

    /// Evaluation failed.
    #[error(transparent)]
    Explore(#[from] ExploreError),

    /// The mutator rejected part of the edit batch.
    #[error("mutator rejected {rejected} of {total} edits for {fix}")]
    ApplyRejected {
        fix: String,
        rejected: usize,
        total: usize,
    },
}

// ============================================================================
// Options
// ============================================================================

/// Per-run behavior switches.
#[derive(Debug, Clone, Default)]
pub struct DiagnoseOptions {
    /// Roll back every fix after measuring it, including kept ones.
    pub revert_all: bool,
    /// Mirror parameter/return fixes onto overriding/overridden methods so
    /// the hierarchy stays type-consistent; the sibling edits apply and
    /// revert atomically with the triggering fix.
    pub propagate_inheritance: bool,
}

// ============================================================================
// Diagnoser
// ============================================================================

/// State machine over the work list.
pub struct Diagnoser<I: Injector> {
    options: DiagnoseOptions,
    bank: Bank,
    metadata: Metadata,
    injector: I,
    rescanner: Rescanner,
}

impl<I: Injector> Diagnoser<I> {
    pub fn new(
        options: DiagnoseOptions,
        bank: Bank,
        metadata: Metadata,
        injector: I,
        rescanner: Rescanner,
    ) -> Self {
        Diagnoser {
            options,
            bank,
            metadata,
            injector,
            rescanner,
        }
    }

    /// Drain the work list, recording one report per newly diagnosed fix.
    ///
    /// Always terminates and returns the store, however many fixes failed
    /// or were skipped.
    pub fn run(&mut self, work: &WorkList, mut reports: ReportStore) -> ReportStore {
        info!("diagnosing {} candidate fixes", work.len());
        for fix in &work.fixes {
            if reports.contains_fix(fix) {
                debug!("already diagnosed, skipping {fix}");
                continue;
            }
            match self.process(fix) {
                Ok(report) => {
                    info!(
                        "{fix}: delta {} -> {:?}{}",
                        report.delta,
                        report.decision,
                        if report.degenerate { " (degenerate)" } else { "" }
                    );
                    reports.insert(report);
                }
                Err(e) => {
                    warn!("diagnosis of {fix} failed, continuing: {e}");
                }
            }
        }
        info!(
            "work list drained: {} kept, {} reverted",
            reports.kept_count(),
            reports.reverted_count()
        );
        reports
    }

    /// One full cycle: apply, re-analyze, evaluate, keep or revert.
    fn process(&mut self, fix: &Fix) -> Result<DiagnoseReport, DiagnoseError> {
        let batch = self.batch_for(fix);
        debug!("applying {} edit(s) for {fix}", batch.len());
        let outcomes = self.injector.inject(&batch)?;

        let applied: Vec<Fix> = batch
            .fixes
            .iter()
            .zip(&outcomes)
            .filter(|(_, outcome)| outcome.applied)
            .map(|(f, _)| f.clone())
            .collect();
        if applied.len() != batch.len() {
            // The batch is atomic: undo whatever landed before bailing out.
            self.revert(&applied);
            return Err(DiagnoseError::ApplyRejected {
                fix: fix.to_string(),
                rejected: batch.len() - applied.len(),
                total: batch.len(),
            });
        }

        // The expensive oracle step. On failure the codebase must not be
        // left carrying an unmeasured edit.
        if let Err(e) = self.rescanner.rescan() {
            self.revert(&applied);
            return Err(e.into());
        }

        let report = match explore::dispatch(fix, &self.bank, &self.metadata) {
            Ok(report) => report,
            Err(e) => {
                self.revert(&applied);
                return Err(e.into());
            }
        };

        if let Ok(total) = self.bank.total_delta() {
            debug!("global delta after {fix}: {total}");
        }

        match report.decision {
            Decision::Reverted => self.revert(&applied),
            Decision::Kept if self.options.revert_all => {
                debug!("measurement-only run, rolling back kept {fix}");
                self.revert(&applied);
            }
            Decision::Kept => {}
        }
        Ok(report)
    }

    /// The triggering fix plus its inheritance siblings, when enabled.
    fn batch_for(&self, fix: &Fix) -> WorkList {
        let mut fixes = vec![fix.clone()];
        if self.options.propagate_inheritance {
            let siblings = match fix.location {
                FixLocation::Parameter => self
                    .metadata
                    .inheritance
                    .sub_methods(&fix.method, &fix.class_name),
                FixLocation::Return => self
                    .metadata
                    .inheritance
                    .super_methods(&fix.method, &fix.class_name),
                FixLocation::Field => Vec::new(),
            };
            for node in siblings {
                fixes.push(Fix {
                    annotation: fix.annotation.clone(),
                    location: fix.location,
                    class_name: node.class_name,
                    method: node.method,
                    target: fix.target.clone(),
                    uri: node.uri,
                    inject: fix.inject,
                });
            }
        }
        WorkList { fixes }
    }

    /// Issue inverse edits for everything that was applied.
    ///
    /// A failed revert is logged rather than propagated: the caller is
    /// already unwinding, and the next run's fresh root re-baselines.
    fn revert(&mut self, applied: &[Fix]) {
        if applied.is_empty() {
            return;
        }
        let inverse = WorkList {
            fixes: applied.iter().map(Fix::inverse).collect(),
        };
        debug!("reverting {} edit(s)", inverse.len());
        if let Err(e) = self.injector.inject(&inverse) {
            error!("failed to revert {} edit(s): {e}", inverse.len());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
