//! Probabilistic transition destinations.

use std::fmt;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::state::State;
use crate::error::MachineError;

/// Tolerance when validating that probabilities sum to 1.0.
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// A probability distribution over candidate next-states.
///
/// Attached to a transition, the choice is sampled fresh on every firing:
/// a uniform draw in `[0, 1)` is walked through the cumulative partition of
/// the probabilities to select the destination.
///
/// # Example
///
/// ```rust
/// use waypoint::core::{State, StochasticChoice};
///
/// let stay = State::new("Stay")?;
/// let leave = State::new("Leave")?;
///
/// let choice = StochasticChoice::new(vec![0.6, 0.4], vec![stay, leave])?;
/// let next = choice.draw();
/// assert!(choice.states().contains(&next));
/// # Ok::<(), waypoint::MachineError>(())
/// ```
pub struct StochasticChoice {
    probabilities: Vec<f64>,
    states: Vec<State>,
    rng: Mutex<StdRng>,
}

impl StochasticChoice {
    /// Build a choice over parallel probability/state vectors.
    ///
    /// Fails when the vectors differ in length, any probability falls
    /// outside `[0, 1]`, or the sum strays from 1.0 by more than
    /// [`PROBABILITY_EPSILON`]. A sub-epsilon shortfall is corrected by
    /// nudging the last non-zero entry.
    pub fn new(probabilities: Vec<f64>, states: Vec<State>) -> Result<Self, MachineError> {
        Self::with_rng(probabilities, states, StdRng::from_entropy())
    }

    /// Like [`new`](StochasticChoice::new), with a caller-supplied RNG for
    /// deterministic sampling.
    pub fn with_rng(
        mut probabilities: Vec<f64>,
        states: Vec<State>,
        rng: StdRng,
    ) -> Result<Self, MachineError> {
        if probabilities.len() != states.len() {
            return Err(MachineError::ProbabilityLengthMismatch {
                probabilities: probabilities.len(),
                states: states.len(),
            });
        }
        let mut total = 0.0;
        let mut last_non_zero = None;
        for (index, &value) in probabilities.iter().enumerate() {
            if !(0.0..=1.0).contains(&value) {
                return Err(MachineError::ProbabilityOutOfRange { index, value });
            }
            if value > 0.0 {
                last_non_zero = Some(index);
            }
            total += value;
        }
        if (1.0 - total).abs() > PROBABILITY_EPSILON {
            return Err(MachineError::ProbabilitySum { sum: total });
        }
        if total < 1.0 {
            if let Some(index) = last_non_zero {
                probabilities[index] += PROBABILITY_EPSILON;
            }
        }
        Ok(Self {
            probabilities,
            states,
            rng: Mutex::new(rng),
        })
    }

    /// Sample a destination from the distribution.
    pub fn draw(&self) -> State {
        let roll: f64 = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            rng.gen()
        };
        let mut accumulated = 0.0;
        for (probability, state) in self.probabilities.iter().zip(&self.states) {
            accumulated += probability;
            if accumulated > roll {
                return state.clone();
            }
        }
        // Rounding can leave a sliver of [0, 1) above the last cumulative
        // boundary; it belongs to the last non-zero entry.
        for (probability, state) in self.probabilities.iter().zip(&self.states).rev() {
            if *probability > 0.0 {
                return state.clone();
            }
        }
        self.states[self.states.len() - 1].clone()
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probabilities
    }
}

impl fmt::Debug for StochasticChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StochasticChoice")
            .field("probabilities", &self.probabilities)
            .field("states", &self.states)
            .finish()
    }
}
