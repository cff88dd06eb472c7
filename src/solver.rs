//! The recursive step search: one primitive increment driven to convergence
//! through iteration-budget, algorithm, tolerance, and bisection escalation.
//!
//! The search is naturally recursive; here each conceptual call is a
//! node of `(step, algo_index, test_iter_times, test_tol)` processed
//! iteratively from an explicit LIFO stack, which bounds machine stack depth
//! deterministically. Budget, algorithm, and tolerance escalation rewrite the
//! current node in place (each rewrite models one recursion), while bisection
//! pushes the remainder sub-step and continues on the relaxed sub-step, so
//! sub-steps run strictly left to right.

use log::{debug, info};

use crate::backend::SolverBackend;
use crate::config::{AnalysisKind, ControllerConfig};
use crate::state::RuntimeState;

/// Parameters of one conceptual attempt call.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AttemptParams {
    pub step: f64,
    pub algo_index: usize,
    pub test_iter_times: u32,
    pub test_tol: f64,
}

impl AttemptParams {
    /// Parameters for a fresh top-level increment: ladder rung 0 and the
    /// configured baseline budget and tolerance.
    pub(crate) fn initial(step: f64, config: &ControllerConfig) -> Self {
        Self {
            step,
            algo_index: 0,
            test_iter_times: config.test_iter_times(),
            test_tol: config.test_tol(),
        }
    }
}

/// Outcome of driving one top-level increment through escalation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Attempt {
    /// The increment (possibly decomposed into sub-steps) converged.
    Success,
    /// Every escalation avenue was exhausted at the minimum step.
    Fatal,
}

/// Drives one top-level increment to `Success` or `Fatal`.
///
/// Escalation order on each failed attempt, per configuration flags:
/// enlarge the iteration budget (only while the last residual norm stays
/// below `norm_tol`), advance the algorithm ladder, and finally bisect the
/// step. At the step floor bisection gives way to a single loose-tolerance
/// retry before the search is abandoned. A `Fatal` from any sub-step aborts
/// every pending sub-step immediately.
pub(crate) fn drive_increment<B: SolverBackend>(
    backend: &mut B,
    config: &ControllerConfig,
    state: &mut RuntimeState,
    initial: AttemptParams,
) -> Attempt {
    let mut pending = vec![initial];

    while let Some(mut params) = pending.pop() {
        loop {
            reconcile(backend, config, state, &params);
            if config.debug_mode() {
                debug!(
                    "attempting step {:e} (ladder rung {}, budget {}, tol {:e})",
                    params.step, params.algo_index, params.test_iter_times, params.test_tol
                );
            }

            let dt = match config.analysis_kind() {
                AnalysisKind::Transient => Some(params.step),
                AnalysisKind::Static => None,
            };
            if backend.attempt_step(dt).is_converged() {
                state.counter += 1;
                if state.counter >= config.print_per() {
                    report_progress(state);
                    state.counter = 0;
                }
                break;
            }

            // Enlarged iteration budget, worth trying only while the residual
            // is already in striking distance of the tolerance.
            if config.try_add_test_times() && params.test_iter_times != config.test_iter_times_more() {
                let norm = backend.last_convergence_norm();
                if norm < config.norm_tol() {
                    if config.debug_mode() {
                        debug!(
                            "norm {:e} below {:e}; enlarging iteration budget to {}",
                            norm, config.norm_tol(), config.test_iter_times_more()
                        );
                    }
                    params.test_iter_times = config.test_iter_times_more();
                    continue;
                }
            }

            // Next rung of the algorithm ladder, budget and tolerance carried.
            if config.try_alter_algo_types() && params.algo_index + 1 < config.ladder().len() {
                params.algo_index += 1;
                if config.debug_mode() {
                    debug!("escalating to ladder rung {}", params.algo_index);
                }
                continue;
            }

            // At the floor the step cannot be halved again: one loose-tolerance
            // retry restarts the ladder, after that the search is exhausted.
            if params.step.abs() < 2.0 * config.min_step() {
                if config.try_loose_test_tol() && params.test_tol != config.loose_test_tol_to() {
                    if config.debug_mode() {
                        debug!(
                            "step {:e} at the floor; loosening tolerance to {:e}",
                            params.step, config.loose_test_tol_to()
                        );
                    }
                    params = AttemptParams {
                        step: params.step,
                        algo_index: 0,
                        test_iter_times: config.test_iter_times(),
                        test_tol: config.loose_test_tol_to(),
                    };
                    continue;
                }
                return Attempt::Fatal;
            }

            // Bisect: the relaxed sub-step first, the remainder only after it
            // succeeds. Both restart at ladder rung 0 with the budget and
            // tolerance in force when the bisection was decided.
            let mut step_new = params.step * config.relaxation();
            if step_new.abs() < config.min_step() {
                step_new = config.min_step().copysign(params.step);
            }
            let step_rest = params.step - step_new;
            if config.debug_mode() {
                debug!(
                    "bisecting step {:e} into {:e} and {:e}",
                    params.step, step_new, step_rest
                );
            }
            pending.push(AttemptParams {
                step: step_rest,
                algo_index: 0,
                ..params
            });
            params = AttemptParams {
                step: step_new,
                algo_index: 0,
                ..params
            };
        }
    }

    Attempt::Success
}

/// Pushes to the backend exactly the settings that differ from what it holds.
fn reconcile<B: SolverBackend>(
    backend: &mut B,
    config: &ControllerConfig,
    state: &mut RuntimeState,
    params: &AttemptParams,
) {
    if state.algo_index != Some(params.algo_index) {
        if let Some(variant) = config.ladder().get(params.algo_index) {
            backend.select_algorithm(variant);
        }
        state.algo_index = Some(params.algo_index);
    }

    if state.test_iter_times != Some(params.test_iter_times)
        || state.test_tol != Some(params.test_tol)
    {
        backend.configure_convergence_test(
            config.test(),
            params.test_tol,
            params.test_iter_times,
            config.test_print_flag(),
        );
        state.test_iter_times = Some(params.test_iter_times);
        state.test_tol = Some(params.test_tol);
    }

    if config.analysis_kind() == AnalysisKind::Static && state.step != Some(params.step) {
        if let (Some(node), Some(dof)) = (state.node, state.dof) {
            backend.set_static_increment(node, dof, params.step);
        }
        state.step = Some(params.step);
    }
}

fn report_progress(state: &RuntimeState) {
    if state.segs > 0 {
        info!(
            "analysis progress: {}/{} increments ({:.1}%)",
            state.progress,
            state.segs,
            100.0 * state.progress as f64 / state.segs as f64
        );
    } else {
        info!("analysis progress: {} increments completed", state.progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::AlgorithmVariant;
    use crate::backend::StepStatus;
    use crate::config::{AnalysisKind, ControllerConfig, ConvergenceTest};

    /// Backend whose convergence behavior is scripted through a predicate on
    /// the settings in force at each attempt.
    struct ScriptedBackend {
        converge: Box<dyn Fn(&Applied) -> bool>,
        applied: Applied,
        attempts: Vec<Applied>,
        norm: f64,
        algorithm_selections: usize,
        test_configurations: usize,
    }

    #[derive(Clone, Debug)]
    struct Applied {
        algo_code: Option<u32>,
        tolerance: f64,
        max_iterations: u32,
        dt: Option<f64>,
        static_increment: Option<f64>,
    }

    impl ScriptedBackend {
        fn new(converge: impl Fn(&Applied) -> bool + 'static) -> Self {
            Self {
                converge: Box::new(converge),
                applied: Applied {
                    algo_code: None,
                    tolerance: 0.0,
                    max_iterations: 0,
                    dt: None,
                    static_increment: None,
                },
                attempts: Vec::new(),
                norm: 1.0,
                algorithm_selections: 0,
                test_configurations: 0,
            }
        }

        fn with_norm(mut self, norm: f64) -> Self {
            self.norm = norm;
            self
        }
    }

    impl SolverBackend for ScriptedBackend {
        fn select_analysis_mode(&mut self, _kind: AnalysisKind) {}

        fn select_algorithm(&mut self, variant: &AlgorithmVariant) {
            self.algorithm_selections += 1;
            self.applied.algo_code = variant.code();
        }

        fn configure_convergence_test(
            &mut self,
            _test: ConvergenceTest,
            tolerance: f64,
            max_iterations: u32,
            _print_flag: i32,
        ) {
            self.test_configurations += 1;
            self.applied.tolerance = tolerance;
            self.applied.max_iterations = max_iterations;
        }

        fn set_static_increment(&mut self, _node: usize, _dof: u32, amount: f64) {
            self.applied.static_increment = Some(amount);
        }

        fn attempt_step(&mut self, dt: Option<f64>) -> StepStatus {
            self.applied.dt = dt;
            self.attempts.push(self.applied.clone());
            if (self.converge)(&self.applied) {
                StepStatus::Converged
            } else {
                StepStatus::Failed
            }
        }

        fn last_convergence_norm(&self) -> f64 {
            self.norm
        }

        fn current_time(&self) -> f64 {
            0.0
        }

        fn current_load_factor(&self) -> f64 {
            0.0
        }
    }

    fn transient_config() -> ControllerConfig {
        ControllerConfig::builder(AnalysisKind::Transient)
            .algorithm_codes(&[40, 10, 20])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn immediate_success_attempts_exactly_once() {
        let config = transient_config();
        let mut state = RuntimeState::new();
        let mut backend = ScriptedBackend::new(|_| true);

        let outcome = drive_increment(
            &mut backend,
            &config,
            &mut state,
            AttemptParams::initial(0.01, &config),
        );

        assert_eq!(outcome, Attempt::Success);
        assert_eq!(backend.attempts.len(), 1);
        assert_eq!(backend.algorithm_selections, 1);
        assert_eq!(backend.test_configurations, 1);
    }

    #[test]
    fn ladder_escalation_succeeds_without_bisection() {
        let config = ControllerConfig::builder(AnalysisKind::Transient)
            .algorithm_codes(&[40, 10, 20])
            .unwrap()
            .try_alter_algo_types(true)
            .build()
            .unwrap();
        let mut state = RuntimeState::new();
        // Rung 2 of the ladder carries code 20 (Newton with line search).
        let mut backend = ScriptedBackend::new(|applied| applied.algo_code == Some(20));

        let outcome = drive_increment(
            &mut backend,
            &config,
            &mut state,
            AttemptParams::initial(1.0, &config),
        );

        assert_eq!(outcome, Attempt::Success);
        assert_eq!(backend.attempts.len(), 3);
        for attempt in &backend.attempts {
            assert_eq!(attempt.dt, Some(1.0), "step must never be bisected");
        }
        assert_eq!(state.applied_algo_index(), Some(2));
    }

    #[test]
    fn small_norm_unlocks_the_enlarged_budget() {
        let config = ControllerConfig::builder(AnalysisKind::Transient)
            .try_add_test_times(true)
            .test_iter_times(7)
            .test_iter_times_more(50)
            .build()
            .unwrap();
        let mut state = RuntimeState::new();
        let mut backend =
            ScriptedBackend::new(|applied| applied.max_iterations == 50).with_norm(1.0);

        let outcome = drive_increment(
            &mut backend,
            &config,
            &mut state,
            AttemptParams::initial(0.02, &config),
        );

        assert_eq!(outcome, Attempt::Success);
        assert_eq!(backend.attempts.len(), 2);
        assert_eq!(backend.attempts[0].max_iterations, 7);
        assert_eq!(backend.attempts[1].max_iterations, 50);
        assert_eq!(backend.attempts[1].dt, Some(0.02));
    }

    #[test]
    fn large_norm_skips_the_budget_branch() {
        let config = ControllerConfig::builder(AnalysisKind::Transient)
            .try_add_test_times(true)
            .norm_tol(1e3)
            .min_step(0.6)
            .build()
            .unwrap();
        let mut state = RuntimeState::new();
        // Residual far above norm_tol: the budget branch must not fire, and
        // with a floor of 0.6 the 1.0 step cannot bisect either.
        let mut backend = ScriptedBackend::new(|_| false).with_norm(1e6);

        let outcome = drive_increment(
            &mut backend,
            &config,
            &mut state,
            AttemptParams::initial(1.0, &config),
        );

        assert_eq!(outcome, Attempt::Fatal);
        assert_eq!(backend.attempts.len(), 1);
        assert_eq!(backend.attempts[0].max_iterations, 7);
    }

    #[test]
    fn bisection_splits_conserve_the_step() {
        let config = ControllerConfig::builder(AnalysisKind::Transient)
            .relaxation(0.5)
            .build()
            .unwrap();
        let mut state = RuntimeState::new();
        // Fail anything bigger than 0.3, so 1.0 must split before advancing.
        let mut backend = ScriptedBackend::new(|applied| {
            applied.dt.map_or(false, |dt| dt.abs() <= 0.3)
        });

        let outcome = drive_increment(
            &mut backend,
            &config,
            &mut state,
            AttemptParams::initial(1.0, &config),
        );

        assert_eq!(outcome, Attempt::Success);
        let advanced: f64 = backend
            .attempts
            .iter()
            .filter(|attempt| attempt.dt.map_or(false, |dt| dt.abs() <= 0.3))
            .filter_map(|attempt| attempt.dt)
            .sum();
        approx::assert_relative_eq!(advanced, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn exhausted_escalation_terminates_with_fatal() {
        let config = ControllerConfig::builder(AnalysisKind::Transient)
            .algorithm_codes(&[40, 10, 20, 30])
            .unwrap()
            .try_add_test_times(true)
            .try_alter_algo_types(true)
            .try_loose_test_tol(true)
            .relaxation(0.5)
            .min_step(1e-6)
            .build()
            .unwrap();
        let mut state = RuntimeState::new();
        let mut backend = ScriptedBackend::new(|_| false).with_norm(1.0);

        let outcome = drive_increment(
            &mut backend,
            &config,
            &mut state,
            AttemptParams::initial(1.0, &config),
        );

        assert_eq!(outcome, Attempt::Fatal);
        // Halving from 1.0 to the 1e-6 floor takes about 20 levels; even with
        // every escalation branch enabled the attempt count stays small.
        assert!(
            backend.attempts.len() <= 400,
            "expected bounded search, saw {} attempts",
            backend.attempts.len()
        );
        for attempt in &backend.attempts {
            let dt = attempt.dt.expect("transient attempts carry dt");
            assert!(dt >= config.min_step() - 1e-15);
        }
    }

    #[test]
    fn loose_tolerance_is_the_last_resort_at_the_floor() {
        let config = ControllerConfig::builder(AnalysisKind::Transient)
            .try_loose_test_tol(true)
            .loose_test_tol_to(1e-3)
            .min_step(0.6)
            .build()
            .unwrap();
        let mut state = RuntimeState::new();
        // 1.0 is already under 2 * min_step, so no bisection: the only way
        // out is the loosened tolerance.
        let mut backend = ScriptedBackend::new(|applied| applied.tolerance == 1e-3);

        let outcome = drive_increment(
            &mut backend,
            &config,
            &mut state,
            AttemptParams::initial(1.0, &config),
        );

        assert_eq!(outcome, Attempt::Success);
        assert_eq!(backend.attempts.len(), 2);
        assert_eq!(backend.attempts[1].tolerance, 1e-3);
    }

    #[test]
    fn static_attempts_reapply_only_changed_increments() {
        let config = ControllerConfig::builder(AnalysisKind::Static)
            .relaxation(0.5)
            .build()
            .unwrap();
        let mut state = RuntimeState::new();
        state.node = Some(3);
        state.dof = Some(1);
        state.step = Some(0.4);
        // Converge only once the applied increment is at most 0.2.
        let mut backend = ScriptedBackend::new(|applied| {
            applied.static_increment.map_or(false, |amount| amount <= 0.2)
        });
        backend.applied.static_increment = Some(0.4);

        let outcome = drive_increment(
            &mut backend,
            &config,
            &mut state,
            AttemptParams::initial(0.4, &config),
        );

        assert_eq!(outcome, Attempt::Success);
        for attempt in &backend.attempts {
            assert_eq!(attempt.dt, None, "static attempts must not carry dt");
        }
        approx::assert_relative_eq!(state.step.unwrap(), 0.2, epsilon = 1e-12);
    }
}
