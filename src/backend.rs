//! The boundary between the controller and the external nonlinear solver.
//!
//! Everything the controller knows about the physics lives behind
//! [`SolverBackend`]: a handful of reconfiguration calls, one blocking
//! `attempt_step`, and two scalar queries. Every call may be arbitrarily
//! expensive (an attempt performs a full nonlinear solve), so the controller
//! avoids redundant reconfiguration by tracking applied values in
//! [`RuntimeState`](crate::state::RuntimeState).

use crate::algorithms::AlgorithmVariant;
use crate::config::{AnalysisKind, ConvergenceTest};

/// Outcome of one primitive step attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    /// The solver converged for this increment.
    Converged,
    /// The solver failed to converge; the controller will escalate.
    Failed,
}

impl StepStatus {
    /// Convenience predicate for the success case.
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }
}

/// Capability the external incremental solver must supply.
///
/// Calls are strictly sequential: reconfiguration always precedes the attempt
/// that depends on it, and [`last_convergence_norm`](Self::last_convergence_norm)
/// must report the residual of the most recent
/// [`attempt_step`](Self::attempt_step) call, never a stale value.
pub trait SolverBackend {
    /// Selects transient or static analysis mode.
    fn select_analysis_mode(&mut self, kind: AnalysisKind);

    /// Switches the solution algorithm to the given variant.
    fn select_algorithm(&mut self, variant: &AlgorithmVariant);

    /// Replaces the convergence test with the given family, tolerance,
    /// iteration budget, and print flag.
    fn configure_convergence_test(
        &mut self,
        test: ConvergenceTest,
        tolerance: f64,
        max_iterations: u32,
        print_flag: i32,
    );

    /// Sets the displacement-control increment for `dof` of `node`.
    /// Static mode only.
    fn set_static_increment(&mut self, node: usize, dof: u32, amount: f64);

    /// Attempts exactly one primitive increment. `dt` is present only in
    /// transient mode; static increments were applied beforehand through
    /// [`set_static_increment`](Self::set_static_increment).
    fn attempt_step(&mut self, dt: Option<f64>) -> StepStatus;

    /// Residual norm of the most recent attempt.
    fn last_convergence_norm(&self) -> f64;

    /// Current analysis time. Used by callers to decide when to stop issuing
    /// increments; the controller itself never reads it.
    fn current_time(&self) -> f64;

    /// Current load factor, for the same caller-side purpose.
    fn current_load_factor(&self) -> f64;
}
