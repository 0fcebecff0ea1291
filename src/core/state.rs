//! States and their entry actions.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::core::event::Event;
use crate::error::MachineError;
use crate::machine::StateMachine;

/// The side effect executed every time a state is entered.
///
/// Actions receive the machine (for re-entrant sends and timeout
/// scheduling), the entered state, and the event that triggered the
/// transition (`None` when the state was entered by `begin()` or through an
/// epsilon transition). There is no return value; everything an action does
/// is a side effect.
pub trait Action: Send + Sync {
    fn act(&self, machine: &StateMachine, state: &State, event: Option<&dyn Event>);
}

impl<F> Action for F
where
    F: Fn(&StateMachine, &State, Option<&dyn Event>) + Send + Sync,
{
    fn act(&self, machine: &StateMachine, state: &State, event: Option<&dyn Event>) {
        self(machine, state, event)
    }
}

/// A named node in a state machine.
///
/// Identity is the name: two `State` values with the same name are equal
/// and interchangeable as transition endpoints, so a state can be referred
/// to by name across construction sites. The handle is cheap to clone.
///
/// # Example
///
/// ```rust
/// use waypoint::core::State;
///
/// let a = State::new("Waiting")?;
/// let b = State::new("Waiting")?;
/// assert_eq!(a, b);
///
/// assert!(State::new("").is_err());
/// # Ok::<(), waypoint::MachineError>(())
/// ```
#[derive(Clone)]
pub struct State {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    action: OnceLock<Arc<dyn Action>>,
}

impl State {
    /// Create a state with no entry action.
    pub fn new(name: impl Into<String>) -> Result<Self, MachineError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MachineError::EmptyStateName);
        }
        Ok(Self {
            inner: Arc::new(Inner {
                name,
                action: OnceLock::new(),
            }),
        })
    }

    /// Create a state with an entry action.
    pub fn with_action(
        name: impl Into<String>,
        action: impl Action + 'static,
    ) -> Result<Self, MachineError> {
        let state = Self::new(name)?;
        let _ = state.inner.action.set(Arc::new(action));
        Ok(state)
    }

    /// Bind the entry action. May be called once, during machine assembly.
    pub fn set_action(&self, action: impl Action + 'static) -> Result<(), MachineError> {
        self.inner
            .action
            .set(Arc::new(action))
            .map_err(|_| MachineError::ActionAlreadySet(self.inner.name.clone()))
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub(crate) fn action(&self) -> Option<Arc<dyn Action>> {
        self.inner.action.get().cloned()
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.inner.name == other.inner.name
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, hasher: &mut H) {
        self.inner.name.hash(hasher);
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("name", &self.inner.name)
            .field("has_action", &self.inner.action.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_name_is_rejected() {
        assert!(matches!(State::new(""), Err(MachineError::EmptyStateName)));
    }

    #[test]
    fn equality_and_hashing_are_name_based() {
        let a = State::new("alpha").unwrap();
        let b = State::new("alpha").unwrap();
        let c = State::new("beta").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut map = HashMap::new();
        map.insert(a, 1);
        assert_eq!(map.get(&b), Some(&1));
        assert_eq!(map.get(&c), None);
    }

    #[test]
    fn action_can_be_set_once() {
        let state = State::new("alpha").unwrap();
        assert!(state.action().is_none());

        state
            .set_action(|_: &StateMachine, _: &State, _: Option<&dyn Event>| {})
            .unwrap();
        assert!(state.action().is_some());

        let second = state.set_action(|_: &StateMachine, _: &State, _: Option<&dyn Event>| {});
        assert!(matches!(second, Err(MachineError::ActionAlreadySet(name)) if name == "alpha"));
    }

    #[test]
    fn action_is_shared_across_clones() {
        let state = State::new("alpha").unwrap();
        let clone = state.clone();
        state
            .set_action(|_: &StateMachine, _: &State, _: Option<&dyn Event>| {})
            .unwrap();
        assert!(clone.action().is_some());
    }

    #[test]
    fn displays_as_its_name() {
        let state = State::new("alpha").unwrap();
        assert_eq!(state.to_string(), "alpha");
    }
}
