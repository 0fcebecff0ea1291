//! An event-driven finite state machine engine.
//!
//! A [`StateMachine`] is a graph of named [`State`]s connected by
//! [`Transition`]s. Feeding the machine an [`Event`] selects the matching
//! outgoing transition of the current state (by value, name, or type,
//! per the machine's [`MatchMode`]), runs the transition's action, and
//! enters the destination state, which may run an entry [`Action`] of its
//! own and cascade through epsilon transitions.
//!
//! Further capabilities:
//! - wildcard (default) transitions, taken when nothing else matches
//! - stochastic transitions whose destination is drawn from a
//!   probability distribution ([`StochasticChoice`])
//! - timeouts that go stale once the machine moves on
//!   ([`StateMachine::schedule_timeout`])
//! - terminal-state callbacks ([`Tracker`]) and transition tracing
//!   ([`TransitionTrace`])
//!
//! # Example
//!
//! ```rust
//! use waypoint::{MatchMode, NamedEvent, State, StateMachine, Transition};
//!
//! let idle = State::new("Idle")?;
//! let busy = State::new("Busy")?;
//!
//! let machine = StateMachine::new("worker", MatchMode::StringEquals);
//! machine.set_start_state(idle.clone());
//! machine.add_transition(Transition::on_name(idle.clone(), "job", busy.clone()))?;
//! machine.add_transition(Transition::on_name(busy.clone(), "done", idle))?;
//!
//! machine.begin();
//! machine.receive(NamedEvent::new("job"));
//! assert_eq!(machine.current_state(), Some(busy));
//! # Ok::<(), waypoint::MachineError>(())
//! ```

pub mod builder;
pub mod core;
pub mod error;
pub mod machine;
pub mod sched;

pub use crate::builder::StateMachineBuilder;
pub use crate::core::{
    Action, Destination, Event, MatchMode, NamedEvent, State, StochasticChoice, TimeoutEvent,
    Transition, TransitionFiring, TransitionRecord, TransitionTrace, Trigger, Wildcard,
    TIMEOUT_NAME, WILDCARD_NAME,
};
pub use crate::error::MachineError;
pub use crate::machine::{StateMachine, Tracker};
pub use crate::sched::{EventProcessor, Scheduler, ThreadScheduler};
