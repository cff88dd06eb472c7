//! Adaptive stepping and convergence-escalation control for incremental
//! nonlinear analysis.
//!
//! This crate drives an external incremental solver (a finite-element
//! time-stepping or displacement-controlled solver) toward convergence for
//! each requested increment, automatically recovering from local
//! non-convergence. It offers tools to
//!
//! - plan a loading protocol as primitive increments (`sequence` module),
//! - describe the ordered fallback catalogue of solver algorithms
//!   (`algorithms` module),
//! - configure and validate a controller run (`config` module), and
//! - escalate a failed increment across iteration budget, algorithm variant,
//!   tolerance relaxation, and step bisection (`controller` module).
//!
//! The physics stays entirely behind the [`SolverBackend`] trait: the
//! controller only sees a pass/fail signal and a residual norm, and decides
//! what to reconfigure and retry. Escalation is bounded — the search always
//! terminates in either success or a single surfaced
//! [`ConvergenceFailure`](error::SmartStepError::ConvergenceFailure).
//!
//! # Quick start
//!
//! ```no_run
//! use smartstep::{AnalysisKind, Controller, ControllerConfig, SolverBackend, StepStatus};
//! use smartstep::{AlgorithmVariant, ConvergenceTest};
//!
//! // A backend wraps the external solver; this one only sketches the shape.
//! struct MySolver;
//!
//! impl SolverBackend for MySolver {
//!     fn select_analysis_mode(&mut self, _kind: AnalysisKind) {}
//!     fn select_algorithm(&mut self, _variant: &AlgorithmVariant) {}
//!     fn configure_convergence_test(
//!         &mut self,
//!         _test: ConvergenceTest,
//!         _tolerance: f64,
//!         _max_iterations: u32,
//!         _print_flag: i32,
//!     ) {
//!     }
//!     fn set_static_increment(&mut self, _node: usize, _dof: u32, _amount: f64) {}
//!     fn attempt_step(&mut self, _dt: Option<f64>) -> StepStatus {
//!         StepStatus::Converged
//!     }
//!     fn last_convergence_norm(&self) -> f64 { 0.0 }
//!     fn current_time(&self) -> f64 { 0.0 }
//!     fn current_load_factor(&self) -> f64 { 0.0 }
//! }
//!
//! let config = ControllerConfig::builder(AnalysisKind::Transient)
//!     .try_alter_algo_types(true)
//!     .build()
//!     .expect("validated configuration");
//!
//! let mut controller = Controller::new(config, MySolver);
//! let plan = controller.plan_transient(100).expect("non-empty protocol");
//! for _ in plan {
//!     controller.transient_analyze(0.01).expect("increment converged");
//! }
//! ```
//!
//! Static runs work the same way through
//! [`plan_static`](Controller::plan_static) and
//! [`static_analyze`](Controller::static_analyze), with each planned segment
//! applied to one nodal degree of freedom.

pub mod algorithms;
pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod sequence;
mod solver;
pub mod state;

pub use algorithms::{AlgorithmVariant, EscalationLadder, LineSearch, StiffnessBasis};
pub use backend::{SolverBackend, StepStatus};
pub use config::{AnalysisKind, ControllerConfig, ControllerConfigBuilder, ConvergenceTest};
pub use controller::Controller;
pub use error::{Result, SmartStepError};
pub use sequence::{plan_static, plan_transient};
pub use state::RuntimeState;
