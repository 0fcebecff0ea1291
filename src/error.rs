//! Errors reported by machine construction and configuration.

use crate::core::MatchMode;
use thiserror::Error;

/// Errors that can occur while building states, transitions, and machines.
///
/// Unmatched inputs and expired timed events are *not* errors; the dispatch
/// loop discards them silently.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("states must have non-empty names")]
    EmptyStateName,

    #[error("state `{0}` already has an entry action")]
    ActionAlreadySet(String),

    #[error(
        "defining an epsilon transition from state `{state}` \
         alongside other transitions from that state"
    )]
    EpsilonConflict { state: String },

    #[error("a transition from state `{state}` for trigger `{trigger}` is already defined")]
    DuplicateTransition { state: String, trigger: String },

    #[error("transition trigger mode {found:?} does not match the machine's {expected:?} mode")]
    ModeMismatch { expected: MatchMode, found: MatchMode },

    #[error("machines must have non-empty names")]
    MissingName,

    #[error("no start state was specified")]
    MissingStartState,

    #[error("timeouts can only be scheduled on machines constructed with a scheduler")]
    NoScheduler,

    #[error("the probabilities ({probabilities}) and states ({states}) arrays differ in length")]
    ProbabilityLengthMismatch { probabilities: usize, states: usize },

    #[error("probability {index} is out of range [0, 1]: {value}")]
    ProbabilityOutOfRange { index: usize, value: f64 },

    #[error("probabilities sum to {sum}, which is more than epsilon away from 1.0")]
    ProbabilitySum { sum: f64 },
}
