//! High-level façade binding configuration, runtime state, and the backend.
//!
//! One [`Controller`] drives one analysis run: plan the protocol once, then
//! feed each planned increment through `transient_analyze` or
//! `static_analyze`. Escalation is fully absorbed inside each call; the only
//! runtime failure a caller ever sees is
//! [`ConvergenceFailure`](crate::error::SmartStepError::ConvergenceFailure).

use log::{error, info};

use crate::backend::SolverBackend;
use crate::config::{AnalysisKind, ControllerConfig};
use crate::error::{Result, SmartStepError};
use crate::sequence;
use crate::solver::{drive_increment, Attempt, AttemptParams};
use crate::state::RuntimeState;

/// Adaptive step/convergence controller for one incremental analysis run.
pub struct Controller<B: SolverBackend> {
    config: ControllerConfig,
    state: RuntimeState,
    backend: B,
}

impl<B: SolverBackend> Controller<B> {
    /// Binds a validated configuration to a solver backend.
    pub fn new(config: ControllerConfig, backend: B) -> Self {
        Self {
            config,
            state: RuntimeState::new(),
            backend,
        }
    }

    /// Accessor for the configuration.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Accessor for progress and telemetry counters.
    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    /// Accessor for the backend, e.g. to query `current_time` between
    /// increments.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable accessor for the backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Releases the backend when the run is finished.
    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Plans a transient protocol and records its length for progress
    /// reporting.
    pub fn plan_transient(&mut self, total_steps: usize) -> Result<Vec<usize>> {
        self.require_kind(AnalysisKind::Transient)?;
        let plan = sequence::plan_transient(total_steps)?;
        self.state.segs = plan.len();
        Ok(plan)
    }

    /// Plans a static displacement protocol and records its length for
    /// progress reporting. A missing `max_step` falls back to the configured
    /// `initial_step` before the first-section default applies.
    pub fn plan_static(&mut self, targets: &[f64], max_step: Option<f64>) -> Result<Vec<f64>> {
        self.require_kind(AnalysisKind::Static)?;
        let plan = sequence::plan_static(targets, max_step.or(self.config.initial_step()))?;
        self.state.segs = plan.len();
        Ok(plan)
    }

    /// Drives one transient increment of size `dt` to convergence.
    pub fn transient_analyze(&mut self, dt: f64) -> Result<()> {
        self.require_kind(AnalysisKind::Transient)?;
        self.select_mode_once();
        self.drive(dt)
    }

    /// Drives one static displacement increment on `dof` of `node` to
    /// convergence.
    pub fn static_analyze(&mut self, node: usize, dof: u32, increment: f64) -> Result<()> {
        self.require_kind(AnalysisKind::Static)?;
        self.select_mode_once();

        self.state.node = Some(node);
        self.state.dof = Some(dof);
        self.backend.set_static_increment(node, dof, increment);
        self.state.step = Some(increment);

        self.drive(increment)
    }

    fn drive(&mut self, step: f64) -> Result<()> {
        let params = AttemptParams::initial(step, &self.config);
        match drive_increment(&mut self.backend, &self.config, &mut self.state, params) {
            Attempt::Success => {
                self.state.progress += 1;
                if self.state.segs > 0 && self.state.progress == self.state.segs {
                    info!(
                        "analysis finished: {} increments in {:.2} s",
                        self.state.progress,
                        self.state.elapsed_secs()
                    );
                }
                Ok(())
            }
            Attempt::Fatal => {
                let elapsed_secs = self.state.elapsed_secs();
                error!(
                    "analysis failed at step {:e} after {:.2} s; escalation exhausted",
                    step, elapsed_secs
                );
                Err(SmartStepError::ConvergenceFailure {
                    last_step: step,
                    elapsed_secs,
                })
            }
        }
    }

    fn select_mode_once(&mut self) {
        if !self.state.mode_selected {
            self.backend.select_analysis_mode(self.config.analysis_kind());
            self.state.mode_selected = true;
        }
    }

    fn require_kind(&self, requested: AnalysisKind) -> Result<()> {
        if self.config.analysis_kind() != requested {
            return Err(SmartStepError::AnalysisKindMismatch {
                configured: self.config.analysis_kind(),
                requested,
            });
        }
        Ok(())
    }
}
