//! The state machine data model.
//!
//! This module contains the graph vocabulary the engine dispatches over:
//! - Events and their matching relations via the [`Event`] trait
//! - Named [`State`]s with optional entry [`Action`]s
//! - [`Transition`]s with epsilon, wildcard, and stochastic variants
//! - [`TransitionTrace`] records of the path a machine took

mod event;
mod state;
mod stochastic;
mod trace;
mod transition;

pub use event::{Event, NamedEvent, TimeoutEvent, Wildcard, TIMEOUT_NAME, WILDCARD_NAME};
pub use state::{Action, State};
pub use stochastic::{StochasticChoice, PROBABILITY_EPSILON};
pub use trace::{TransitionRecord, TransitionTrace};
pub use transition::{
    Destination, MatchMode, Transition, TransitionAction, TransitionFiring, Trigger,
};
