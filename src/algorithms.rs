//! Solver-algorithm catalogue and the ordered escalation ladder built from it.
//!
//! Configuration files traditionally name algorithm variants by numeric
//! code. Those codes remain available through [`AlgorithmVariant::from_code`]
//! for callers migrating existing configuration files, but internally every
//! variant is a value of a closed enum, so an invalid code is rejected when
//! the ladder is built rather than when escalation first reaches it.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SmartStepError};

/// Which stiffness matrix an iterative algorithm forms its updates with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StiffnessBasis {
    /// Tangent stiffness reassembled every iteration.
    Current,
    /// Initial (elastic) stiffness held for all iterations.
    Initial,
    /// Initial stiffness on the first iteration, current thereafter.
    InitialThenCurrent,
}

/// Sub-strategy for Newton iteration with line search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineSearch {
    /// Interpolated line search on the energy slope.
    Interpolated,
    /// Bisection on the line-search interval.
    Bisection,
    /// Secant update of the step length.
    Secant,
    /// Regula-falsi update of the step length.
    RegulaFalsi,
}

/// One named solver-algorithm configuration.
///
/// Each variant corresponds to a concrete "select algorithm" reconfiguration
/// on the [`SolverBackend`](crate::backend::SolverBackend). The set is closed:
/// escalation can only move between variants that exist here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlgorithmVariant {
    /// Single linear solve per step, no equilibrium iteration.
    Linear {
        /// Stiffness used for the solve.
        basis: StiffnessBasis,
        /// Reuse the factorization across steps.
        factor_once: bool,
    },
    /// Full Newton-Raphson iteration.
    Newton { basis: StiffnessBasis },
    /// Newton-Raphson with a line search on each correction.
    NewtonLineSearch { search: LineSearch },
    /// Newton with the stiffness held fixed within a step.
    ModifiedNewton { basis: StiffnessBasis },
    /// Newton accelerated by a Krylov subspace built from prior corrections.
    KrylovNewton {
        /// Stiffness used while iterating.
        iterate: StiffnessBasis,
        /// Stiffness used when forming increments.
        increment: StiffnessBasis,
        /// Optional cap on the subspace dimension.
        max_dim: Option<u32>,
    },
    /// Two-term secant acceleration of modified Newton.
    SecantNewton {
        iterate: StiffnessBasis,
        increment: StiffnessBasis,
    },
    /// BFGS quasi-Newton update.
    Bfgs,
    /// Broyden rank-one quasi-Newton update.
    Broyden,
}

impl AlgorithmVariant {
    /// Resolves a numeric algorithm code from the catalogue.
    ///
    /// Returns `None` for codes outside the catalogue; configuration builders
    /// turn that into [`SmartStepError::UnknownAlgorithmCode`].
    pub fn from_code(code: u32) -> Option<Self> {
        use StiffnessBasis::{Current, Initial, InitialThenCurrent};
        let variant = match code {
            0 => Self::Linear {
                basis: Current,
                factor_once: false,
            },
            1 => Self::Linear {
                basis: Initial,
                factor_once: false,
            },
            2 => Self::Linear {
                basis: Current,
                factor_once: true,
            },
            10 => Self::Newton { basis: Current },
            11 => Self::Newton { basis: Initial },
            12 => Self::Newton {
                basis: InitialThenCurrent,
            },
            20 => Self::NewtonLineSearch {
                search: LineSearch::Interpolated,
            },
            21 => Self::NewtonLineSearch {
                search: LineSearch::Bisection,
            },
            22 => Self::NewtonLineSearch {
                search: LineSearch::Secant,
            },
            23 => Self::NewtonLineSearch {
                search: LineSearch::RegulaFalsi,
            },
            30 => Self::ModifiedNewton { basis: Current },
            31 => Self::ModifiedNewton { basis: Initial },
            40 => Self::KrylovNewton {
                iterate: Current,
                increment: Current,
                max_dim: None,
            },
            41 => Self::KrylovNewton {
                iterate: Initial,
                increment: Current,
                max_dim: None,
            },
            42 => Self::KrylovNewton {
                iterate: Current,
                increment: Initial,
                max_dim: None,
            },
            43 => Self::KrylovNewton {
                iterate: Initial,
                increment: Initial,
                max_dim: None,
            },
            44 => Self::KrylovNewton {
                iterate: Current,
                increment: Current,
                max_dim: Some(50),
            },
            45 => Self::KrylovNewton {
                iterate: Initial,
                increment: Initial,
                max_dim: Some(50),
            },
            50 => Self::SecantNewton {
                iterate: Current,
                increment: Current,
            },
            51 => Self::SecantNewton {
                iterate: Initial,
                increment: Current,
            },
            52 => Self::SecantNewton {
                iterate: Current,
                increment: Initial,
            },
            53 => Self::SecantNewton {
                iterate: Initial,
                increment: Initial,
            },
            60 => Self::Bfgs,
            70 => Self::Broyden,
            _ => return None,
        };
        Some(variant)
    }

    /// Returns the catalogue code for this variant, or `None` for a
    /// hand-built combination the catalogue has no code for.
    pub fn code(&self) -> Option<u32> {
        use StiffnessBasis::{Current, Initial, InitialThenCurrent};
        let code = match *self {
            Self::Linear {
                basis: Current,
                factor_once: false,
            } => 0,
            Self::Linear {
                basis: Initial,
                factor_once: false,
            } => 1,
            Self::Linear {
                basis: Current,
                factor_once: true,
            } => 2,
            Self::Newton { basis: Current } => 10,
            Self::Newton { basis: Initial } => 11,
            Self::Newton {
                basis: InitialThenCurrent,
            } => 12,
            Self::NewtonLineSearch { search } => match search {
                LineSearch::Interpolated => 20,
                LineSearch::Bisection => 21,
                LineSearch::Secant => 22,
                LineSearch::RegulaFalsi => 23,
            },
            Self::ModifiedNewton { basis: Current } => 30,
            Self::ModifiedNewton { basis: Initial } => 31,
            Self::KrylovNewton {
                iterate,
                increment,
                max_dim,
            } => match (iterate, increment, max_dim) {
                (Current, Current, None) => 40,
                (Initial, Current, None) => 41,
                (Current, Initial, None) => 42,
                (Initial, Initial, None) => 43,
                (Current, Current, Some(50)) => 44,
                (Initial, Initial, Some(50)) => 45,
                _ => return None,
            },
            Self::SecantNewton { iterate, increment } => match (iterate, increment) {
                (Current, Current) => 50,
                (Initial, Current) => 51,
                (Current, Initial) => 52,
                (Initial, Initial) => 53,
                _ => return None,
            },
            Self::Bfgs => 60,
            Self::Broyden => 70,
            _ => return None,
        };
        Some(code)
    }
}

/// Ordered, non-empty sequence of fallback algorithm variants.
///
/// Index 0 is the default variant a fresh (or bisected) step starts from;
/// escalation walks the ladder upward one rung at a time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EscalationLadder {
    variants: Vec<AlgorithmVariant>,
}

// Deserialization funnels through `new` so a serialized ladder can never be
// empty, mirroring the construction-time check.
impl<'de> Deserialize<'de> for EscalationLadder {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            variants: Vec<AlgorithmVariant>,
        }
        let raw = Raw::deserialize(deserializer)?;
        Self::new(raw.variants).map_err(serde::de::Error::custom)
    }
}

impl EscalationLadder {
    /// Builds a ladder from explicit variants.
    pub fn new(variants: Vec<AlgorithmVariant>) -> Result<Self> {
        if variants.is_empty() {
            return Err(SmartStepError::EmptyLadder);
        }
        Ok(Self { variants })
    }

    /// Builds a ladder from catalogue codes, rejecting unknown codes.
    pub fn from_codes(codes: &[u32]) -> Result<Self> {
        let variants = codes
            .iter()
            .map(|&code| {
                AlgorithmVariant::from_code(code)
                    .ok_or(SmartStepError::UnknownAlgorithmCode { code })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(variants)
    }

    /// Returns the variant at `index`, if the ladder is that tall.
    pub fn get(&self, index: usize) -> Option<&AlgorithmVariant> {
        self.variants.get(index)
    }

    /// Number of rungs.
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// A ladder is never empty by construction, but the predicate is
    /// conventional to provide alongside `len`.
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Iterates over the rungs in escalation order.
    pub fn iter(&self) -> impl Iterator<Item = &AlgorithmVariant> {
        self.variants.iter()
    }
}

impl Default for EscalationLadder {
    /// Krylov-Newton, then plain Newton, then Newton with line search, then
    /// modified Newton.
    fn default() -> Self {
        Self::from_codes(&[40, 10, 20, 30]).expect("default ladder codes are in the catalogue")
    }
}
