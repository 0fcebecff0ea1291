//! Transitions: the edges of the state graph.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::event::{Event, Wildcard, WILDCARD_NAME};
use crate::core::state::State;
use crate::core::stochastic::StochasticChoice;

/// How a machine compares incoming events against transition triggers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchMode {
    /// Value equality, via [`Event::matches`].
    Equals,
    /// Name equality, via [`Event::name`].
    StringEquals,
    /// Dynamic-type equality.
    ClassEquals,
}

/// What fires a transition.
///
/// Each variant implies a [`MatchMode`]; a machine only accepts transitions
/// whose trigger agrees with its configured mode. `Epsilon` is compatible
/// with every mode: it fires on state entry, without an input.
#[derive(Clone)]
pub enum Trigger {
    /// Fires automatically when the from-state is entered.
    Epsilon,
    /// Fires on an event value-equal to the stored one (`Equals` mode).
    Event(Arc<dyn Event>),
    /// Fires on an event with this name (`StringEquals` mode).
    Name(String),
    /// Fires on an event of this dynamic type (`ClassEquals` mode).
    Type(TypeId, &'static str),
}

impl Trigger {
    pub fn event(event: impl Event) -> Self {
        Self::Event(Arc::new(event))
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn of_type<E: Event>() -> Self {
        Self::Type(TypeId::of::<E>(), type_name::<E>())
    }

    /// The matching mode this trigger requires; `None` for epsilon.
    pub fn mode(&self) -> Option<MatchMode> {
        match self {
            Self::Epsilon => None,
            Self::Event(_) => Some(MatchMode::Equals),
            Self::Name(_) => Some(MatchMode::StringEquals),
            Self::Type(..) => Some(MatchMode::ClassEquals),
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epsilon => f.write_str("<epsilon>"),
            Self::Event(event) => write!(f, "{}", event.name()),
            Self::Name(name) => f.write_str(name),
            Self::Type(_, name) => f.write_str(name),
        }
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trigger({self})")
    }
}

/// Where a transition leads: a fixed state, or a distribution over states
/// sampled fresh on every firing.
pub enum Destination {
    Fixed(State),
    Stochastic(StochasticChoice),
}

impl Destination {
    pub fn resolve(&self) -> State {
        match self {
            Self::Fixed(state) => state.clone(),
            Self::Stochastic(choice) => choice.draw(),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(state) => write!(f, "{state}"),
            Self::Stochastic(choice) => {
                f.write_str("{")?;
                for (i, state) in choice.states().iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{state}")?;
                }
                f.write_str("}")
            }
        }
    }
}

/// The context handed to a transition action when its edge fires.
///
/// Unlike the trigger stored in the transition definition, `event` is the
/// event instance actually received, so payload data specific to this
/// occurrence is accessible.
pub struct TransitionFiring<'a> {
    pub from: &'a State,
    pub to: &'a State,
    pub event: Option<&'a dyn Event>,
}

/// Mealy-style side effect attached to a transition edge.
pub type TransitionAction = Arc<dyn Fn(&TransitionFiring<'_>) + Send + Sync>;

/// An edge of the state graph: `(from, trigger, action?, destination)`.
pub struct Transition {
    from: State,
    trigger: Trigger,
    action: Option<TransitionAction>,
    destination: Destination,
}

impl Transition {
    pub fn new(from: State, trigger: Trigger, to: State) -> Self {
        Self {
            from,
            trigger,
            action: None,
            destination: Destination::Fixed(to),
        }
    }

    /// A transition whose destination is sampled on every firing.
    pub fn stochastic(from: State, trigger: Trigger, choice: StochasticChoice) -> Self {
        Self {
            from,
            trigger,
            action: None,
            destination: Destination::Stochastic(choice),
        }
    }

    /// An epsilon transition: fires as soon as `from` is entered.
    pub fn epsilon(from: State, to: State) -> Self {
        Self::new(from, Trigger::Epsilon, to)
    }

    /// Triggered by an event value-equal to `event` (`Equals` mode).
    pub fn on_event(from: State, event: impl Event, to: State) -> Self {
        Self::new(from, Trigger::event(event), to)
    }

    /// Triggered by any event named `name` (`StringEquals` mode).
    pub fn on_name(from: State, name: impl Into<String>, to: State) -> Self {
        Self::new(from, Trigger::named(name), to)
    }

    /// Triggered by any event of type `E` (`ClassEquals` mode).
    pub fn on_type<E: Event>(from: State, to: State) -> Self {
        Self::new(from, Trigger::of_type::<E>(), to)
    }

    /// The default transition for `from`, taken when nothing else matches.
    pub fn wildcard(from: State, to: State, mode: MatchMode) -> Self {
        match mode {
            MatchMode::Equals => Self::on_event(from, Wildcard, to),
            MatchMode::StringEquals => Self::on_name(from, WILDCARD_NAME, to),
            MatchMode::ClassEquals => Self::on_type::<Wildcard>(from, to),
        }
    }

    /// Attach a side effect to the edge itself.
    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&TransitionFiring<'_>) + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    pub fn from_state(&self) -> &State {
        &self.from
    }

    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    pub(crate) fn action(&self) -> Option<TransitionAction> {
        self.action.clone()
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) => {}", self.from, self.trigger, self.destination)
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transition[{self}]")
    }
}
