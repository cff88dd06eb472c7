use thiserror::Error;

use crate::config::AnalysisKind;

/// Unified error type for `smartstep` operations.
#[derive(Debug, Error)]
pub enum SmartStepError {
    /// Raised when a recognized configuration option carries an invalid value.
    #[error("configuration option `{option}` is invalid: {reason}")]
    InvalidOption {
        /// Name of the rejected option.
        option: &'static str,
        /// Human-readable explanation of the rejection.
        reason: String,
    },

    /// Raised when a numeric algorithm code has no entry in the catalogue.
    #[error("algorithm code {code} does not name a known solver algorithm")]
    UnknownAlgorithmCode { code: u32 },

    /// Raised when the escalation ladder would contain no algorithm variants.
    #[error("the escalation ladder must contain at least one algorithm variant")]
    EmptyLadder,

    /// Raised when a loading protocol cannot be turned into increments.
    #[error("invalid loading protocol: {reason}")]
    InvalidProtocol { reason: String },

    /// Raised when an analyze call does not match the configured analysis kind.
    #[error("controller is configured for {configured} analysis but a {requested} increment was requested")]
    AnalysisKindMismatch {
        /// Kind the controller was built with.
        configured: AnalysisKind,
        /// Kind implied by the offending call.
        requested: AnalysisKind,
    },

    /// Raised when every escalation avenue is exhausted at the minimum step.
    #[error(
        "analysis failed to converge: escalation exhausted at step {last_step:e} after {elapsed_secs:.2} s"
    )]
    ConvergenceFailure {
        /// Magnitude of the step that could not be driven to convergence.
        last_step: f64,
        /// Wall-clock seconds since the controller was created.
        elapsed_secs: f64,
    },
}

impl SmartStepError {
    /// Helper to format an [`InvalidOption`](SmartStepError::InvalidOption) error.
    pub fn invalid_option(option: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option,
            reason: reason.into(),
        }
    }

    /// Helper to reject a malformed loading protocol.
    pub fn invalid_protocol(reason: impl Into<String>) -> Self {
        Self::InvalidProtocol {
            reason: reason.into(),
        }
    }
}

/// Type alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, SmartStepError>;
