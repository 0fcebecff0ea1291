//! Fluent construction of state machines.
//!
//! The builder collects states, transitions, and callbacks, and validates
//! the whole definition at [`build`](StateMachineBuilder::build) time, so a
//! misconfigured machine is an error value rather than a runtime surprise.
//!
//! # Example
//!
//! ```rust
//! use waypoint::builder::StateMachineBuilder;
//! use waypoint::core::{MatchMode, NamedEvent, State, Transition};
//!
//! let idle = State::new("Idle")?;
//! let busy = State::new("Busy")?;
//!
//! let machine = StateMachineBuilder::new("worker")
//!     .mode(MatchMode::StringEquals)
//!     .start_state(idle.clone())
//!     .transition(Transition::on_name(idle.clone(), "job", busy.clone()))
//!     .transition(Transition::on_name(busy.clone(), "done", idle))
//!     .build()?;
//!
//! machine.begin();
//! machine.receive(NamedEvent::new("job"));
//! assert_eq!(machine.current_state(), Some(busy));
//! # Ok::<(), waypoint::MachineError>(())
//! ```

use std::sync::Arc;

use crate::core::{MatchMode, State, Transition};
use crate::error::MachineError;
use crate::machine::{StateMachine, Tracker};
use crate::sched::Scheduler;

/// Builder for [`StateMachine`].
///
/// Defaults: [`MatchMode::StringEquals`], no scheduler (synchronous
/// dispatch), tracing off.
pub struct StateMachineBuilder {
    name: String,
    mode: MatchMode,
    scheduler: Option<Arc<dyn Scheduler>>,
    start: Option<State>,
    transitions: Vec<Transition>,
    trackers: Vec<Arc<dyn Tracker>>,
    trace_enabled: bool,
}

impl StateMachineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: MatchMode::StringEquals,
            scheduler: None,
            start: None,
            transitions: Vec::new(),
            trackers: Vec::new(),
            trace_enabled: false,
        }
    }

    /// Set how incoming events are matched against triggers.
    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Route inputs and timeouts through a scheduler.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// The state the machine starts in. Required.
    pub fn start_state(mut self, state: State) -> Self {
        self.start = Some(state);
        self
    }

    /// Add one transition.
    pub fn transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add a batch of transitions.
    pub fn transitions(mut self, transitions: impl IntoIterator<Item = Transition>) -> Self {
        self.transitions.extend(transitions);
        self
    }

    /// Register a terminal-state callback.
    pub fn tracker(mut self, tracker: Arc<dyn Tracker>) -> Self {
        self.trackers.push(tracker);
        self
    }

    /// Register a terminal-state callback from a closure.
    pub fn on_end<F>(self, tracker: F) -> Self
    where
        F: Fn(&StateMachine) + Send + Sync + 'static,
    {
        self.tracker(Arc::new(tracker))
    }

    /// Record performed transitions for later inspection.
    pub fn trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// Validate the definition and assemble the machine.
    ///
    /// Fails when the name is empty, no start state was given, or any
    /// transition is invalid for the configured mode (see
    /// [`StateMachine::add_transition`]).
    pub fn build(self) -> Result<Arc<StateMachine>, MachineError> {
        if self.name.is_empty() {
            return Err(MachineError::MissingName);
        }
        let start = self.start.ok_or(MachineError::MissingStartState)?;

        let machine = match self.scheduler {
            Some(scheduler) => StateMachine::with_scheduler(self.name, self.mode, scheduler),
            None => StateMachine::new(self.name, self.mode),
        };
        machine.set_start_state(start);
        for transition in self.transitions {
            machine.add_transition(transition)?;
        }
        for tracker in self.trackers {
            machine.register_tracker(tracker);
        }
        machine.set_trace_enabled(self.trace_enabled);
        Ok(machine)
    }
}
