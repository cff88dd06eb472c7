//! Immutable controller configuration and its validating builder.
//!
//! `ControllerConfig` is built once per analysis run and never mutated
//! afterward; the currently-applied solver settings live in
//! [`RuntimeState`](crate::state::RuntimeState) instead. All value validation
//! happens in [`ControllerConfigBuilder::build`], and deserialization routes
//! through the same checks, so a controller can only be constructed from a
//! coherent set of options.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::algorithms::EscalationLadder;
use crate::error::{Result, SmartStepError};

/// Kind of incremental analysis a controller drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisKind {
    /// Time-stepping analysis; increments are time steps `dt`.
    Transient,
    /// Displacement-controlled analysis; increments move one nodal DOF.
    Static,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Static => write!(f, "static"),
        }
    }
}

/// Convergence-test family applied by the external solver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceTest {
    EnergyIncr,
    NormUnbalance,
    NormDispIncr,
    RelativeNormUnbalance,
    RelativeNormDispIncr,
    RelativeTotalNormDispIncr,
    RelativeEnergyIncr,
    FixedNumIter,
    NormDispAndUnbalance,
    NormDispOrUnbalance,
}

impl ConvergenceTest {
    /// Family name as the external solver spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Self::EnergyIncr => "EnergyIncr",
            Self::NormUnbalance => "NormUnbalance",
            Self::NormDispIncr => "NormDispIncr",
            Self::RelativeNormUnbalance => "RelativeNormUnbalance",
            Self::RelativeNormDispIncr => "RelativeNormDispIncr",
            Self::RelativeTotalNormDispIncr => "RelativeTotalNormDispIncr",
            Self::RelativeEnergyIncr => "RelativeEnergyIncr",
            Self::FixedNumIter => "FixedNumIter",
            Self::NormDispAndUnbalance => "NormDispAndUnbalance",
            Self::NormDispOrUnbalance => "NormDispOrUnbalance",
        }
    }
}

/// Immutable configuration for one [`Controller`](crate::controller::Controller).
///
/// Fields are only reachable through accessors; the sole ways to obtain a
/// value are [`ControllerConfigBuilder::build`] and deserialization, both of
/// which run the full option validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawControllerConfig")]
pub struct ControllerConfig {
    analysis_kind: AnalysisKind,
    test: ConvergenceTest,
    test_tol: f64,
    test_iter_times: u32,
    test_print_flag: i32,
    try_add_test_times: bool,
    norm_tol: f64,
    test_iter_times_more: u32,
    try_loose_test_tol: bool,
    loose_test_tol_to: f64,
    try_alter_algo_types: bool,
    ladder: EscalationLadder,
    initial_step: Option<f64>,
    relaxation: f64,
    min_step: f64,
    print_per: u32,
    debug_mode: bool,
}

impl ControllerConfig {
    /// Starts a builder for the given analysis kind with conventional defaults.
    pub fn builder(analysis_kind: AnalysisKind) -> ControllerConfigBuilder {
        ControllerConfigBuilder::new(analysis_kind)
    }

    /// Transient or static analysis.
    pub fn analysis_kind(&self) -> AnalysisKind {
        self.analysis_kind
    }

    /// Convergence-test family pushed to the solver.
    pub fn test(&self) -> ConvergenceTest {
        self.test
    }

    /// Convergence tolerance applied at the start of every top-level increment.
    pub fn test_tol(&self) -> f64 {
        self.test_tol
    }

    /// Iteration budget applied at the start of every top-level increment.
    pub fn test_iter_times(&self) -> u32 {
        self.test_iter_times
    }

    /// Print flag forwarded verbatim to the solver's convergence test.
    pub fn test_print_flag(&self) -> i32 {
        self.test_print_flag
    }

    /// Whether the iteration-budget escalation branch is enabled.
    pub fn try_add_test_times(&self) -> bool {
        self.try_add_test_times
    }

    /// Residual-norm ceiling below which a larger budget is considered worth
    /// trying.
    pub fn norm_tol(&self) -> f64 {
        self.norm_tol
    }

    /// Enlarged iteration budget used by the budget escalation branch.
    pub fn test_iter_times_more(&self) -> u32 {
        self.test_iter_times_more
    }

    /// Whether the loose-tolerance last resort is enabled.
    pub fn try_loose_test_tol(&self) -> bool {
        self.try_loose_test_tol
    }

    /// Tolerance applied by the loose-tolerance last resort.
    pub fn loose_test_tol_to(&self) -> f64 {
        self.loose_test_tol_to
    }

    /// Whether escalation across the algorithm ladder is enabled.
    pub fn try_alter_algo_types(&self) -> bool {
        self.try_alter_algo_types
    }

    /// Ordered fallback algorithm variants; rung 0 is the default.
    pub fn ladder(&self) -> &EscalationLadder {
        &self.ladder
    }

    /// Optional cap on planned static segments when
    /// [`plan_static`](crate::controller::Controller::plan_static) gets no
    /// explicit `max_step`.
    pub fn initial_step(&self) -> Option<f64> {
        self.initial_step
    }

    /// Bisection multiplier applied to a failed step, in `(0, 1)`.
    pub fn relaxation(&self) -> f64 {
        self.relaxation
    }

    /// Floor below which a step is never halved again.
    pub fn min_step(&self) -> f64 {
        self.min_step
    }

    /// Successful increments between progress reports.
    pub fn print_per(&self) -> u32 {
        self.print_per
    }

    /// Whether a debug trace of every attempt and escalation decision is
    /// emitted.
    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }
}

/// Mirror of [`ControllerConfig`] that deserialization passes through the
/// builder, so files can never smuggle in values `build` would reject.
/// Unknown option names are a configuration error.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawControllerConfig {
    analysis_kind: AnalysisKind,
    test: ConvergenceTest,
    test_tol: f64,
    test_iter_times: u32,
    test_print_flag: i32,
    try_add_test_times: bool,
    norm_tol: f64,
    test_iter_times_more: u32,
    try_loose_test_tol: bool,
    loose_test_tol_to: f64,
    try_alter_algo_types: bool,
    ladder: EscalationLadder,
    #[serde(default)]
    initial_step: Option<f64>,
    relaxation: f64,
    min_step: f64,
    print_per: u32,
    debug_mode: bool,
}

impl TryFrom<RawControllerConfig> for ControllerConfig {
    type Error = SmartStepError;

    fn try_from(raw: RawControllerConfig) -> Result<Self> {
        let mut builder = ControllerConfigBuilder::new(raw.analysis_kind)
            .test(raw.test)
            .test_tol(raw.test_tol)
            .test_iter_times(raw.test_iter_times)
            .test_print_flag(raw.test_print_flag)
            .try_add_test_times(raw.try_add_test_times)
            .norm_tol(raw.norm_tol)
            .test_iter_times_more(raw.test_iter_times_more)
            .try_loose_test_tol(raw.try_loose_test_tol)
            .loose_test_tol_to(raw.loose_test_tol_to)
            .try_alter_algo_types(raw.try_alter_algo_types)
            .ladder(raw.ladder)
            .relaxation(raw.relaxation)
            .min_step(raw.min_step)
            .print_per(raw.print_per)
            .debug_mode(raw.debug_mode);
        if let Some(step) = raw.initial_step {
            builder = builder.initial_step(step);
        }
        builder.build()
    }
}

/// Builder that validates every option before a [`ControllerConfig`] exists.
#[derive(Clone, Debug)]
pub struct ControllerConfigBuilder {
    analysis_kind: AnalysisKind,
    test: ConvergenceTest,
    test_tol: f64,
    test_iter_times: u32,
    test_print_flag: i32,
    try_add_test_times: bool,
    norm_tol: f64,
    test_iter_times_more: u32,
    try_loose_test_tol: bool,
    loose_test_tol_to: f64,
    try_alter_algo_types: bool,
    ladder: Option<EscalationLadder>,
    initial_step: Option<f64>,
    relaxation: f64,
    min_step: f64,
    print_per: u32,
    debug_mode: bool,
}

impl ControllerConfigBuilder {
    /// Conventional defaults for every option except the analysis kind.
    pub fn new(analysis_kind: AnalysisKind) -> Self {
        Self {
            analysis_kind,
            test: ConvergenceTest::EnergyIncr,
            test_tol: 1e-12,
            test_iter_times: 7,
            test_print_flag: 0,
            try_add_test_times: false,
            norm_tol: 1e3,
            test_iter_times_more: 50,
            try_loose_test_tol: false,
            loose_test_tol_to: 1.0,
            try_alter_algo_types: false,
            ladder: None,
            initial_step: None,
            relaxation: 0.5,
            min_step: 1e-6,
            print_per: 50,
            debug_mode: false,
        }
    }

    /// Sets the convergence-test family.
    pub fn test(mut self, test: ConvergenceTest) -> Self {
        self.test = test;
        self
    }

    /// Sets the baseline convergence tolerance.
    pub fn test_tol(mut self, tol: f64) -> Self {
        self.test_tol = tol;
        self
    }

    /// Sets the baseline iteration budget.
    pub fn test_iter_times(mut self, times: u32) -> Self {
        self.test_iter_times = times;
        self
    }

    /// Sets the print flag forwarded to the convergence test.
    pub fn test_print_flag(mut self, flag: i32) -> Self {
        self.test_print_flag = flag;
        self
    }

    /// Enables the iteration-budget escalation branch.
    pub fn try_add_test_times(mut self, enable: bool) -> Self {
        self.try_add_test_times = enable;
        self
    }

    /// Sets the norm ceiling gating the iteration-budget branch.
    pub fn norm_tol(mut self, tol: f64) -> Self {
        self.norm_tol = tol;
        self
    }

    /// Sets the enlarged iteration budget.
    pub fn test_iter_times_more(mut self, times: u32) -> Self {
        self.test_iter_times_more = times;
        self
    }

    /// Enables the loose-tolerance last resort.
    pub fn try_loose_test_tol(mut self, enable: bool) -> Self {
        self.try_loose_test_tol = enable;
        self
    }

    /// Sets the loosened tolerance value.
    pub fn loose_test_tol_to(mut self, tol: f64) -> Self {
        self.loose_test_tol_to = tol;
        self
    }

    /// Enables escalation across the algorithm ladder.
    pub fn try_alter_algo_types(mut self, enable: bool) -> Self {
        self.try_alter_algo_types = enable;
        self
    }

    /// Sets the escalation ladder from explicit variants.
    pub fn ladder(mut self, ladder: EscalationLadder) -> Self {
        self.ladder = Some(ladder);
        self
    }

    /// Sets the escalation ladder from numeric catalogue codes.
    pub fn algorithm_codes(mut self, codes: &[u32]) -> Result<Self> {
        self.ladder = Some(EscalationLadder::from_codes(codes)?);
        Ok(self)
    }

    /// Sets the default segment cap used by static planning.
    pub fn initial_step(mut self, step: f64) -> Self {
        self.initial_step = Some(step);
        self
    }

    /// Sets the bisection relaxation factor.
    pub fn relaxation(mut self, factor: f64) -> Self {
        self.relaxation = factor;
        self
    }

    /// Sets the minimum step size.
    pub fn min_step(mut self, step: f64) -> Self {
        self.min_step = step;
        self
    }

    /// Sets the progress-report cadence.
    pub fn print_per(mut self, per: u32) -> Self {
        self.print_per = per;
        self
    }

    /// Enables the per-attempt debug trace.
    pub fn debug_mode(mut self, enable: bool) -> Self {
        self.debug_mode = enable;
        self
    }

    /// Validates all options and freezes them into a [`ControllerConfig`].
    pub fn build(self) -> Result<ControllerConfig> {
        if !(self.test_tol > 0.0 && self.test_tol.is_finite()) {
            return Err(SmartStepError::invalid_option(
                "test_tol",
                format!("must be positive and finite, found {}", self.test_tol),
            ));
        }
        if self.test_iter_times < 1 {
            return Err(SmartStepError::invalid_option(
                "test_iter_times",
                "must be at least 1",
            ));
        }
        if self.try_add_test_times && self.test_iter_times_more < self.test_iter_times {
            return Err(SmartStepError::invalid_option(
                "test_iter_times_more",
                format!(
                    "must not be smaller than test_iter_times ({})",
                    self.test_iter_times
                ),
            ));
        }
        if self.try_add_test_times && !(self.norm_tol > 0.0) {
            return Err(SmartStepError::invalid_option(
                "norm_tol",
                format!("must be positive, found {}", self.norm_tol),
            ));
        }
        if self.try_loose_test_tol && !(self.loose_test_tol_to > 0.0) {
            return Err(SmartStepError::invalid_option(
                "loose_test_tol_to",
                format!("must be positive, found {}", self.loose_test_tol_to),
            ));
        }
        if !(self.relaxation > 0.0 && self.relaxation < 1.0) {
            return Err(SmartStepError::invalid_option(
                "relaxation",
                format!("must lie in (0, 1), found {}", self.relaxation),
            ));
        }
        if !(self.min_step > 0.0 && self.min_step.is_finite()) {
            return Err(SmartStepError::invalid_option(
                "min_step",
                format!("must be positive and finite, found {}", self.min_step),
            ));
        }
        if let Some(step) = self.initial_step {
            if !(step > 0.0 && step.is_finite()) {
                return Err(SmartStepError::invalid_option(
                    "initial_step",
                    format!("must be positive and finite when set, found {step}"),
                ));
            }
        }
        if self.print_per < 1 {
            return Err(SmartStepError::invalid_option(
                "print_per",
                "must be at least 1",
            ));
        }

        Ok(ControllerConfig {
            analysis_kind: self.analysis_kind,
            test: self.test,
            test_tol: self.test_tol,
            test_iter_times: self.test_iter_times,
            test_print_flag: self.test_print_flag,
            try_add_test_times: self.try_add_test_times,
            norm_tol: self.norm_tol,
            test_iter_times_more: self.test_iter_times_more,
            try_loose_test_tol: self.try_loose_test_tol,
            loose_test_tol_to: self.loose_test_tol_to,
            try_alter_algo_types: self.try_alter_algo_types,
            ladder: self.ladder.unwrap_or_default(),
            initial_step: self.initial_step,
            relaxation: self.relaxation,
            min_step: self.min_step,
            print_per: self.print_per,
            debug_mode: self.debug_mode,
        })
    }
}
