//! Mutable progress and telemetry threaded through one controller lifetime.

use std::time::Instant;

/// Runtime counters and the record of currently-applied solver settings.
///
/// The applied-value fields start as `None` so the first reconciliation always
/// pushes a configuration to the backend; afterwards they mirror whatever the
/// backend actually holds, including settings left behind by failed escalation
/// branches.
#[derive(Clone, Debug)]
pub struct RuntimeState {
    /// Ladder index currently selected on the backend.
    pub(crate) algo_index: Option<usize>,
    /// Iteration budget currently configured on the backend.
    pub(crate) test_iter_times: Option<u32>,
    /// Tolerance currently configured on the backend.
    pub(crate) test_tol: Option<f64>,
    /// Displacement increment currently configured on the backend (static).
    pub(crate) step: Option<f64>,
    /// Node carrying the displacement control target (static).
    pub(crate) node: Option<usize>,
    /// Controlled degree of freedom (static).
    pub(crate) dof: Option<u32>,
    /// Whether the analysis mode has been pushed to the backend yet.
    pub(crate) mode_selected: bool,
    /// Successful sub-steps since the last progress report.
    pub(crate) counter: u32,
    /// Completed top-level increments.
    pub(crate) progress: usize,
    /// Planned top-level increments, for percentage reporting only.
    pub(crate) segs: usize,
    /// Creation time of the owning controller.
    pub(crate) start_time: Instant,
}

impl RuntimeState {
    pub(crate) fn new() -> Self {
        Self {
            algo_index: None,
            test_iter_times: None,
            test_tol: None,
            step: None,
            node: None,
            dof: None,
            mode_selected: false,
            counter: 0,
            progress: 0,
            segs: 0,
            start_time: Instant::now(),
        }
    }

    /// Completed top-level increments.
    pub fn progress(&self) -> usize {
        self.progress
    }

    /// Planned top-level increments, zero until a protocol is planned.
    pub fn segs(&self) -> usize {
        self.segs
    }

    /// Ladder index last applied to the backend, if any.
    pub fn applied_algo_index(&self) -> Option<usize> {
        self.algo_index
    }

    /// Iteration budget last applied to the backend, if any.
    pub fn applied_iter_times(&self) -> Option<u32> {
        self.test_iter_times
    }

    /// Tolerance last applied to the backend, if any.
    pub fn applied_tol(&self) -> Option<f64> {
        self.test_tol
    }

    /// Seconds elapsed since the controller was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new()
    }
}
