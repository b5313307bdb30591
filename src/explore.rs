//! Scope-resolution strategies, one per fix location kind.
//!
//! Applying an annotation can only shift findings inside a bounded
//! neighborhood of the edit, so each strategy re-checks just that
//! neighborhood instead of re-diffing the whole project:
//!
//! - `Parameter`: the containing class, at class granularity
//! - `Field`: the containing class plus every class using the field
//!   (field-usage graph)
//! - `Return`: every class with a call site of the edited method
//!   (call graph)
//!
//! Strategies form a closed set dispatched over the fix's location kind;
//! a fix no strategy claims is surfaced as a typed error, never silently
//! skipped.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::debug;

use crate::bank::{Bank, BankError, GroupBy};
use crate::fix::{Fix, FixLocation};
use crate::metadata::Metadata;
use crate::report::{Decision, DiagnoseReport};

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while evaluating a fix's effect.
#[derive(Debug, Error)]
pub enum ExploreError {
    /// No strategy claims the fix. A programming or configuration error,
    /// surfaced loudly instead of being swallowed.
    #[error("no strategy matches fix: {fix}")]
    NoStrategy { fix: String },

    /// Snapshotting the error log failed.
    #[error(transparent)]
    Bank(#[from] BankError),
}

/// Result type for exploration.
pub type ExploreResult<T> = Result<T, ExploreError>;

// ============================================================================
// Strategies
// ============================================================================

/// A scope-resolution and evaluation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Explorer {
    Parameter,
    Field,
    Return,
}

/// Fixed dispatch order; strategies are mutually exclusive by location kind.
pub const STRATEGY_ORDER: [Explorer; 3] = [Explorer::Parameter, Explorer::Field, Explorer::Return];

impl Explorer {
    /// Whether this strategy evaluates the given fix.
    pub fn is_applicable(&self, fix: &Fix) -> bool {
        matches!(
            (self, fix.location),
            (Explorer::Parameter, FixLocation::Parameter)
                | (Explorer::Field, FixLocation::Field)
                | (Explorer::Return, FixLocation::Return)
        )
    }

    /// The classes whose counts must be re-checked for this fix.
    fn scope(&self, fix: &Fix, metadata: &Metadata) -> BTreeSet<String> {
        match self {
            Explorer::Parameter => {
                let mut scope = BTreeSet::new();
                scope.insert(fix.class_name.clone());
                scope
            }
            Explorer::Field => {
                let mut scope = metadata
                    .field_graph
                    .user_classes_of_field(&fix.target, &fix.class_name);
                scope.insert(fix.class_name.clone());
                scope
            }
            Explorer::Return => metadata
                .call_graph
                .user_classes_of_method(&fix.method, &fix.class_name),
        }
    }

    /// Measure the applied fix: fresh snapshot, scoped diff, decision.
    ///
    /// Deterministic for identical inputs: the scope set is ordered and the
    /// aggregate is a plain sum of per-class deltas against the root.
    pub fn effect(&self, fix: &Fix, bank: &Bank, metadata: &Metadata) -> ExploreResult<DiagnoseReport> {
        let scope = self.scope(fix, metadata);

        // A return fix without recorded callers has nothing to diff.
        // Absence of evidence is not evidence of harm: keep, but flag the
        // outcome as degenerate for downstream consumers.
        if scope.is_empty() {
            debug!("empty scope for {fix}, keeping by default");
            return Ok(DiagnoseReport {
                fix: fix.clone(),
                delta: 0,
                decision: Decision::Kept,
                degenerate: true,
                scope: Vec::new(),
            });
        }

        let fresh = bank.snapshot(GroupBy::Class)?;
        let delta: i64 = scope
            .iter()
            .map(|class_name| bank.delta_by_class(class_name, &fresh))
            .sum();

        let decision = if delta <= 0 {
            Decision::Kept
        } else {
            Decision::Reverted
        };
        debug!(
            "measured {fix}: delta {delta} over {} classes -> {decision:?}",
            scope.len()
        );

        Ok(DiagnoseReport {
            fix: fix.clone(),
            delta,
            decision,
            degenerate: false,
            scope: scope.into_iter().collect(),
        })
    }
}

/// Select the single applicable strategy and evaluate the fix.
pub fn dispatch(fix: &Fix, bank: &Bank, metadata: &Metadata) -> ExploreResult<DiagnoseReport> {
    let explorer = STRATEGY_ORDER
        .iter()
        .find(|explorer| explorer.is_applicable(fix))
        .ok_or_else(|| ExploreError::NoStrategy {
            fix: fix.to_string(),
        })?;
    explorer.effect(fix, bank, metadata)
}

// ============================================================================
// Tests
// ============================================================================
