//! Events: the inputs that drive state transitions.
//!
//! An event is an opaque identity used for transition matching. It carries a
//! string name (used by [`MatchMode::StringEquals`](crate::core::MatchMode)
//! matching and for display), an optional payload retrievable by downcast,
//! and optionally a transition-count deadline that makes it a timed event.

use std::any::Any;
use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The reserved name of the wildcard event.
///
/// A transition triggered by the wildcard is a state's default: it is
/// selected when no other trigger matches the incoming event. If one thinks
/// of a `match` over the received event, the wildcard transition is the `_`
/// arm.
pub const WILDCARD_NAME: &str = "*";

/// The default name for timeout events.
pub const TIMEOUT_NAME: &str = "TIMEOUT";

/// An input to a state machine.
///
/// Implementations decide their own notion of identity; the engine only
/// requires a name, access to the concrete value for downcasting, and a
/// value-equality relation for [`MatchMode::Equals`](crate::core::MatchMode)
/// machines.
pub trait Event: Any + Send + Sync {
    /// The string identity of the event.
    fn name(&self) -> Cow<'_, str>;

    /// The concrete value, for payload retrieval and type-based matching.
    fn as_any(&self) -> &dyn Any;

    /// Value equality, used by machines in `Equals` mode.
    ///
    /// The default considers two events equal when they have the same
    /// dynamic type and the same name. Implementations may refine this
    /// (e.g. to compare payloads), but must keep it consistent with
    /// [`trigger_hash`](Event::trigger_hash): events that match must hash
    /// alike.
    ///
    /// `Equals`-mode lookup treats two events as the same trigger only when
    /// `matches` holds in *both* directions, so a one-sided relation (such
    /// as [`TimeoutEvent`]'s name-only matching) never bridges triggers
    /// that do not consider each other equal. Within a single event type,
    /// `matches` should still be an equivalence relation; a relation that
    /// is not transitive makes trigger identity ill-defined.
    fn matches(&self, other: &dyn Event) -> bool {
        self.as_any().type_id() == other.as_any().type_id() && self.name() == other.name()
    }

    /// Hash consistent with [`matches`](Event::matches).
    ///
    /// The default hashes the event's name, which is compatible with any
    /// `matches` implementation that requires name equality.
    fn trigger_hash(&self) -> u64 {
        hash_name(self.name().as_ref())
    }

    /// The transition-count deadline, for timed events.
    ///
    /// A timed event delivered once the machine's transition count has
    /// reached the deadline is silently discarded. Ordinary events return
    /// `None`.
    fn deadline(&self) -> Option<u64> {
        None
    }
}

fn hash_name(name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

impl fmt::Display for dyn Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl fmt::Debug for dyn Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Event({})", self.name())
    }
}

/// An event wrapping an arbitrary payload.
///
/// The name is either given explicitly or taken from the payload's
/// `Display` output. Two `NamedEvent`s match when both name and payload are
/// equal.
///
/// # Example
///
/// ```rust
/// use waypoint::core::{Event, NamedEvent};
///
/// let plain = NamedEvent::new("go");
/// assert_eq!(plain.name(), "go");
///
/// let with_payload = NamedEvent::with_name(42u32, "answer");
/// assert_eq!(with_payload.name(), "answer");
/// assert_eq!(*with_payload.payload(), 42);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct NamedEvent<T> {
    payload: T,
    name: Option<String>,
}

impl<T> NamedEvent<T> {
    /// Wrap a payload; the event's name is the payload's `Display` output.
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            name: None,
        }
    }

    /// Wrap a payload under an explicit name.
    pub fn with_name(payload: T, name: impl Into<String>) -> Self {
        Self {
            payload,
            name: Some(name.into()),
        }
    }

    /// The payload carried by this event.
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Consume the event, yielding its payload.
    pub fn into_payload(self) -> T {
        self.payload
    }
}

impl<T> Event for NamedEvent<T>
where
    T: fmt::Display + PartialEq + Send + Sync + 'static,
{
    fn name(&self) -> Cow<'_, str> {
        match &self.name {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(self.payload.to_string()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn matches(&self, other: &dyn Event) -> bool {
        match other.as_any().downcast_ref::<Self>() {
            Some(other) => self.payload == other.payload && self.name() == other.name(),
            None => false,
        }
    }
}

/// A timeout event bound to a transition-count deadline.
///
/// Timed events are produced by
/// [`StateMachine::timeout_event`](crate::machine::StateMachine::timeout_event),
/// which stamps them with `transition_count + 1` at call time: the timeout
/// is valid only until the next transition completes. Matching is by name
/// alone, so a transition declared against one timeout event fires for any
/// later timeout with the same name.
#[derive(Debug, Clone)]
pub struct TimeoutEvent {
    name: String,
    deadline: u64,
}

impl TimeoutEvent {
    pub fn new(name: impl Into<String>, deadline: u64) -> Self {
        Self {
            name: name.into(),
            deadline,
        }
    }
}

impl Event for TimeoutEvent {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    // Deadlines are delivery metadata, not identity.
    fn matches(&self, other: &dyn Event) -> bool {
        self.name == other.name()
    }

    fn deadline(&self) -> Option<u64> {
        Some(self.deadline)
    }
}

/// The wildcard event, reserved for default transitions.
///
/// Use it (or [`WILDCARD_NAME`], or its type, depending on the machine's
/// matching mode) as the trigger of a state's catch-all transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Wildcard;

impl Event for Wildcard {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(WILDCARD_NAME)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
