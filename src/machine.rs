//! The state machine engine: transition table, dispatch, timeouts.

use std::any::TypeId;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, trace};

use crate::core::{
    Action, Event, MatchMode, State, TimeoutEvent, Transition, TransitionAction, TransitionFiring,
    TransitionRecord, TransitionTrace, Trigger, Wildcard, TIMEOUT_NAME, WILDCARD_NAME,
};
use crate::error::MachineError;
use crate::sched::{EventProcessor, Scheduler};

/// Notified exactly once when a machine enters a terminal state (a state
/// with no outgoing transitions).
pub trait Tracker: Send + Sync {
    fn state_machine_ended(&self, machine: &StateMachine);
}

impl<F> Tracker for F
where
    F: Fn(&StateMachine) + Send + Sync,
{
    fn state_machine_ended(&self, machine: &StateMachine) {
        self(machine)
    }
}

/// Lookup key for a triggered transition, derived from the trigger (at
/// insertion) or from an incoming event (at dispatch) according to the
/// machine's matching mode.
enum TriggerKey {
    Name(String),
    Type(TypeId),
    Value(ValueKey),
}

/// Key wrapper for `Equals` mode: equality delegates to the events' own
/// value-equality relation, hashing to their matching-consistent hash.
struct ValueKey {
    event: Arc<dyn Event>,
    hash: u64,
}

impl PartialEq for TriggerKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Name(a), Self::Name(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a == b,
            // Both sides must agree, so that an event with a looser
            // matching relation (e.g. name-only) cannot bridge two keys
            // that do not consider each other equal. This keeps `Eq`
            // transitive, which `HashMap` lookup relies on.
            (Self::Value(a), Self::Value(b)) => {
                a.event.matches(b.event.as_ref()) && b.event.matches(a.event.as_ref())
            }
            _ => false,
        }
    }
}

impl Eq for TriggerKey {}

impl Hash for TriggerKey {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        match self {
            Self::Name(name) => {
                0u8.hash(hasher);
                name.hash(hasher);
            }
            Self::Type(type_id) => {
                1u8.hash(hasher);
                type_id.hash(hasher);
            }
            Self::Value(key) => {
                2u8.hash(hasher);
                hasher.write_u64(key.hash);
            }
        }
    }
}

/// The outgoing edges of one state. An epsilon transition is exclusive:
/// it never coexists with triggered transitions.
#[derive(Default)]
struct TransitionSet {
    epsilon: Option<Transition>,
    triggered: HashMap<TriggerKey, Transition>,
}

impl TransitionSet {
    fn is_empty(&self) -> bool {
        self.epsilon.is_none() && self.triggered.is_empty()
    }
}

enum DispatchItem {
    Begin,
    Input(Arc<dyn Event>),
}

struct Inner {
    start: Option<State>,
    current: Option<State>,
    table: HashMap<State, TransitionSet>,
    transition_count: u64,
    trackers: Vec<Arc<dyn Tracker>>,
    ended: bool,
    queue: VecDeque<DispatchItem>,
    dispatching: bool,
    trace_enabled: bool,
    trace: TransitionTrace,
}

/// An event-driven finite state machine.
///
/// The machine owns its transition table, current state, and transition
/// count, and dispatches incoming events to the matching transition under
/// its configured [`MatchMode`]. Dispatch is a critical section: all
/// mutable state sits behind one mutex, and re-entrant or concurrent
/// `receive` calls are deferred onto an internal queue drained by the
/// thread that owns the dispatch loop, so entry actions may freely send
/// events back into the machine.
///
/// Machines are handed out as `Arc<StateMachine>` so a [`Scheduler`] can
/// hold delivery targets for delayed events.
pub struct StateMachine {
    name: String,
    mode: MatchMode,
    scheduler: Option<Arc<dyn Scheduler>>,
    self_ref: Weak<StateMachine>,
    inner: Mutex<Inner>,
}

impl StateMachine {
    /// Create a machine that dispatches synchronously on the calling
    /// thread.
    pub fn new(name: impl Into<String>, mode: MatchMode) -> Arc<Self> {
        Self::assemble(name.into(), mode, None)
    }

    /// Create a machine whose inputs and timeouts flow through `scheduler`.
    pub fn with_scheduler(
        name: impl Into<String>,
        mode: MatchMode,
        scheduler: Arc<dyn Scheduler>,
    ) -> Arc<Self> {
        Self::assemble(name.into(), mode, Some(scheduler))
    }

    fn assemble(name: String, mode: MatchMode, scheduler: Option<Arc<dyn Scheduler>>) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            name,
            mode,
            scheduler,
            self_ref: weak.clone(),
            inner: Mutex::new(Inner {
                start: None,
                current: None,
                table: HashMap::new(),
                transition_count: 0,
                trackers: Vec::new(),
                ended: false,
                queue: VecDeque::new(),
                dispatching: false,
                trace_enabled: false,
                trace: TransitionTrace::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn handle(&self) -> Option<Arc<dyn EventProcessor>> {
        self.self_ref
            .upgrade()
            .map(|machine| machine as Arc<dyn EventProcessor>)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn current_state(&self) -> Option<State> {
        self.lock().current.clone()
    }

    /// The number of transitions performed so far. Epsilon, wildcard, and
    /// self-transitions all count; discarded inputs do not.
    pub fn transition_count(&self) -> u64 {
        self.lock().transition_count
    }

    /// Whether the machine has reached a terminal state.
    pub fn is_ended(&self) -> bool {
        self.lock().ended
    }

    /// Set (or change) the start state. Has no effect once the machine has
    /// started.
    pub fn set_start_state(&self, state: State) {
        let mut inner = self.lock();
        if inner.current.is_none() {
            inner.start = Some(state);
        }
    }

    /// Record performed transitions in an inspectable [`TransitionTrace`].
    pub fn set_trace_enabled(&self, enabled: bool) {
        self.lock().trace_enabled = enabled;
    }

    /// A snapshot of the recorded transitions.
    pub fn transition_trace(&self) -> TransitionTrace {
        self.lock().trace.clone()
    }

    /// Register a terminal-state callback.
    pub fn register_tracker(&self, tracker: Arc<dyn Tracker>) {
        self.lock().trackers.push(tracker);
    }

    /// Register a terminal-state callback from a closure.
    pub fn on_end<F>(&self, tracker: F)
    where
        F: Fn(&StateMachine) + Send + Sync + 'static,
    {
        self.register_tracker(Arc::new(tracker));
    }

    /// Add a transition. Permitted at any point, even mid-execution.
    ///
    /// Fails when the trigger's matching mode disagrees with the machine's,
    /// when an epsilon transition would coexist with any other transition
    /// from the same state, or when the `(from, trigger)` pair is already
    /// defined.
    pub fn add_transition(&self, transition: Transition) -> Result<(), MachineError> {
        if let Some(mode) = transition.trigger().mode() {
            if mode != self.mode {
                return Err(MachineError::ModeMismatch {
                    expected: self.mode,
                    found: mode,
                });
            }
        }
        let key = self.key_for_trigger(transition.trigger());
        let state_name = transition.from_state().name().to_string();

        let mut inner = self.lock();
        let existing = inner.table.get(transition.from_state());
        match &key {
            None => {
                if existing.is_some_and(|set| !set.is_empty()) {
                    return Err(MachineError::EpsilonConflict { state: state_name });
                }
            }
            Some(key) => {
                if let Some(set) = existing {
                    if set.epsilon.is_some() {
                        return Err(MachineError::EpsilonConflict { state: state_name });
                    }
                    if set.triggered.contains_key(key) {
                        return Err(MachineError::DuplicateTransition {
                            state: state_name,
                            trigger: transition.trigger().to_string(),
                        });
                    }
                }
            }
        }
        let set = inner
            .table
            .entry(transition.from_state().clone())
            .or_default();
        match key {
            None => set.epsilon = Some(transition),
            Some(key) => {
                set.triggered.insert(key, transition);
            }
        }
        Ok(())
    }

    /// Enter the start state. If this is never called, the machine enters
    /// its start state when the first input arrives; calling it explicitly
    /// is only necessary when the machine itself initiates processing.
    /// Idempotent.
    pub fn begin(&self) {
        self.run(DispatchItem::Begin);
    }

    /// Feed an input to the machine: through the scheduler when one is
    /// bound, else dispatched synchronously.
    pub fn receive<E: Event>(&self, event: E) {
        self.receive_arc(Arc::new(event));
    }

    /// [`receive`](StateMachine::receive) for an already-shared event.
    pub fn receive_arc(&self, event: Arc<dyn Event>) {
        match (&self.scheduler, self.handle()) {
            (Some(scheduler), Some(target)) => scheduler.schedule_event(target, event),
            _ => self.run(DispatchItem::Input(event)),
        }
    }

    /// A timeout event named `"TIMEOUT"` that expires after the next
    /// transition.
    pub fn timeout_event(&self) -> TimeoutEvent {
        self.timeout_event_named(TIMEOUT_NAME)
    }

    /// A timeout event with a specific name that expires (becomes inert)
    /// after the next transition: its deadline is `transition_count + 1`,
    /// captured now.
    pub fn timeout_event_named(&self, name: &str) -> TimeoutEvent {
        let deadline = self.lock().transition_count + 1;
        TimeoutEvent::new(name, deadline)
    }

    /// Schedule delivery of a fresh [`timeout_event`](Self::timeout_event)
    /// after `delay`.
    pub fn schedule_timeout(&self, delay: Duration) -> Result<(), MachineError> {
        self.schedule_timeout_named(TIMEOUT_NAME, delay)
    }

    /// Schedule delivery of a named timeout event after `delay`.
    pub fn schedule_timeout_named(&self, name: &str, delay: Duration) -> Result<(), MachineError> {
        let scheduler = self.scheduler.as_ref().ok_or(MachineError::NoScheduler)?;
        let Some(target) = self.handle() else {
            // Only reachable while the machine is being dropped.
            return Ok(());
        };
        let timeout = self.timeout_event_named(name);
        scheduler.schedule_event_relative(target, Arc::new(timeout), delay);
        Ok(())
    }

    /// Push an item onto the dispatch queue and drain it, unless another
    /// call frame already owns the dispatch loop.
    fn run(&self, item: DispatchItem) {
        {
            let mut inner = self.lock();
            inner.queue.push_back(item);
            if inner.dispatching {
                // Re-entrant or concurrent call; the owning loop drains it.
                return;
            }
            inner.dispatching = true;
        }
        loop {
            let next = {
                let mut inner = self.lock();
                match inner.queue.pop_front() {
                    Some(item) => item,
                    None => {
                        inner.dispatching = false;
                        return;
                    }
                }
            };
            match next {
                DispatchItem::Begin => self.enter_start(),
                DispatchItem::Input(event) => self.dispatch(event),
            }
        }
    }

    fn enter_start(&self) {
        let start = {
            let inner = self.lock();
            if inner.current.is_some() {
                return;
            }
            inner.start.clone()
        };
        match start {
            Some(state) => self.enter_chain(state, None),
            None => error!(machine = %self.name, "begin() called without a start state"),
        }
    }

    /// Resolve one input to a transition and perform it.
    fn dispatch(&self, event: Arc<dyn Event>) {
        if self.lock().current.is_none() {
            trace!(machine = %self.name, "entering start state before the first input");
            self.enter_start();
        }
        let fired = {
            let inner = self.lock();
            if let Some(deadline) = event.deadline() {
                if inner.transition_count >= deadline {
                    trace!(
                        machine = %self.name,
                        event = %event.name(),
                        deadline,
                        count = inner.transition_count,
                        "ignoring timed event whose deadline has expired"
                    );
                    return;
                }
            }
            let Some(current) = inner.current.clone() else {
                return;
            };
            let Some(set) = inner.table.get(&current).filter(|set| !set.is_empty()) else {
                trace!(machine = %self.name, state = %current, "terminal state; input absorbed");
                return;
            };
            let transition = match set.triggered.get(&self.key_for_event(&event)) {
                Some(transition) => transition,
                None => match set.triggered.get(&self.wildcard_key()) {
                    Some(transition) => {
                        trace!(
                            machine = %self.name,
                            state = %current,
                            event = %event.name(),
                            "invoking the wildcard transition"
                        );
                        transition
                    }
                    None => {
                        trace!(
                            machine = %self.name,
                            state = %current,
                            event = %event.name(),
                            "no transition for input; discarding"
                        );
                        return;
                    }
                },
            };
            (
                current,
                transition.destination().resolve(),
                transition.action(),
            )
        };
        let (from, to, action) = fired;
        self.perform_transition(from, to, action, Some(event));
    }

    /// Follow one edge: run the edge's action with the actual event,
    /// advance the transition count, then enter the destination.
    fn perform_transition(
        &self,
        from: State,
        to: State,
        action: Option<TransitionAction>,
        event: Option<Arc<dyn Event>>,
    ) {
        if let Some(action) = action {
            let firing = TransitionFiring {
                from: &from,
                to: &to,
                event: event.as_deref(),
            };
            action(&firing);
        }
        self.note_transition(&from, &to, event.as_deref());
        self.enter_chain(to, event);
    }

    fn note_transition(&self, from: &State, to: &State, event: Option<&dyn Event>) {
        let mut inner = self.lock();
        inner.transition_count += 1;
        if inner.trace_enabled {
            let record = TransitionRecord {
                from: from.name().to_string(),
                to: to.name().to_string(),
                trigger: event.map(|e| e.name().into_owned()),
                count: inner.transition_count,
                timestamp: Utc::now(),
            };
            inner.trace.push(record);
        }
    }

    /// Enter a state and cascade through epsilon transitions until the
    /// machine needs external input or reaches a terminal state. Iterative,
    /// so long epsilon chains do not grow the call stack.
    fn enter_chain(&self, state: State, event: Option<Arc<dyn Event>>) {
        enum Step {
            Wait,
            Finished(Vec<Arc<dyn Tracker>>),
            Hop(State, Option<TransitionAction>),
        }

        let mut state = state;
        let mut event = event;
        loop {
            self.lock().current = Some(state.clone());
            trace!(machine = %self.name, state = %state, "entering state");

            if let Some(action) = state.action() {
                self.invoke_action(action, &state, event.as_deref());
            }

            let step = {
                let mut inner = self.lock();
                let outgoing = match inner.table.get(&state) {
                    Some(set) if !set.is_empty() => {
                        Some(set.epsilon.as_ref().map(|eps| {
                            (eps.destination().resolve(), eps.action())
                        }))
                    }
                    _ => None,
                };
                match outgoing {
                    None => {
                        if inner.ended {
                            // A second terminal entry is a bug in the
                            // machine definition or a dispatch race.
                            error!(
                                machine = %self.name,
                                state = %state,
                                "terminal trackers were already invoked; suppressing a second invocation"
                            );
                            Step::Wait
                        } else {
                            inner.ended = true;
                            Step::Finished(inner.trackers.clone())
                        }
                    }
                    Some(None) => Step::Wait,
                    Some(Some((to, action))) => Step::Hop(to, action),
                }
            };

            match step {
                Step::Wait => return,
                Step::Finished(trackers) => {
                    debug!(machine = %self.name, state = %state, "reached a terminal state");
                    for tracker in trackers {
                        tracker.state_machine_ended(self);
                    }
                    return;
                }
                Step::Hop(to, action) => {
                    trace!(machine = %self.name, from = %state, to = %to, "following epsilon transition");
                    if let Some(action) = action {
                        let firing = TransitionFiring {
                            from: &state,
                            to: &to,
                            event: None,
                        };
                        action(&firing);
                    }
                    self.note_transition(&state, &to, None);
                    state = to;
                    event = None;
                }
            }
        }
    }

    fn invoke_action(&self, action: Arc<dyn Action>, state: &State, event: Option<&dyn Event>) {
        // The lock is not held here: actions may add transitions, inspect
        // the machine, and re-enter receive().
        action.act(self, state, event);
    }

    fn key_for_trigger(&self, trigger: &Trigger) -> Option<TriggerKey> {
        match trigger {
            Trigger::Epsilon => None,
            Trigger::Event(event) => Some(TriggerKey::Value(ValueKey {
                hash: event.trigger_hash(),
                event: Arc::clone(event),
            })),
            Trigger::Name(name) => Some(TriggerKey::Name(name.clone())),
            Trigger::Type(type_id, _) => Some(TriggerKey::Type(*type_id)),
        }
    }

    fn key_for_event(&self, event: &Arc<dyn Event>) -> TriggerKey {
        match self.mode {
            MatchMode::Equals => TriggerKey::Value(ValueKey {
                hash: event.trigger_hash(),
                event: Arc::clone(event),
            }),
            MatchMode::StringEquals => TriggerKey::Name(event.name().into_owned()),
            MatchMode::ClassEquals => TriggerKey::Type(event.as_any().type_id()),
        }
    }

    fn wildcard_key(&self) -> TriggerKey {
        match self.mode {
            MatchMode::Equals => TriggerKey::Value(ValueKey {
                hash: Wildcard.trigger_hash(),
                event: Arc::new(Wildcard),
            }),
            MatchMode::StringEquals => TriggerKey::Name(WILDCARD_NAME.to_string()),
            MatchMode::ClassEquals => TriggerKey::Type(TypeId::of::<Wildcard>()),
        }
    }
}

impl EventProcessor for StateMachine {
    fn process(&self, event: Arc<dyn Event>) {
        self.run(DispatchItem::Input(event));
    }
}

impl fmt::Display for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.lock().current.as_ref() {
            Some(state) => write!(f, "{}[current = {}]", self.name, state),
            None => write!(f, "{}[not started]", self.name),
        }
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("current", &inner.current)
            .field("transition_count", &inner.transition_count)
            .field("ended", &inner.ended)
            .finish()
    }
}
