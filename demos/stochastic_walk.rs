//! A Markov chain driven by clock ticks.
//!
//! Four states, each with a stochastic transition on "tick": the next state
//! is drawn from a per-state probability distribution. The walk runs a
//! fixed number of ticks and then prints the empirical occupancy of each
//! state alongside the path taken.
//!
//! Run with `cargo run --example stochastic_walk`.

use std::collections::HashMap;

use waypoint::builder::StateMachineBuilder;
use waypoint::{NamedEvent, State, StochasticChoice, Transition, Trigger};

const TICKS: usize = 1_000;

fn main() -> Result<(), waypoint::MachineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let names = ["Sunny", "Cloudy", "Rainy", "Stormy"];
    let states: Vec<State> = names
        .iter()
        .map(|name| State::new(*name))
        .collect::<Result<_, _>>()?;

    // Row i: the distribution over next states when leaving state i.
    let rows = [
        [0.6, 0.3, 0.1, 0.0],
        [0.3, 0.3, 0.3, 0.1],
        [0.1, 0.4, 0.3, 0.2],
        [0.0, 0.2, 0.5, 0.3],
    ];

    let mut builder = StateMachineBuilder::new("weather")
        .start_state(states[0].clone())
        .trace();
    for (from, row) in states.iter().zip(rows) {
        let choice = StochasticChoice::new(row.to_vec(), states.clone())?;
        builder = builder.transition(Transition::stochastic(
            from.clone(),
            Trigger::named("tick"),
            choice,
        ));
    }
    let machine = builder.build()?;

    machine.begin();
    for _ in 0..TICKS {
        machine.receive(NamedEvent::new("tick"));
    }

    let trace = machine.transition_trace();
    let mut occupancy: HashMap<&str, usize> = HashMap::new();
    for record in trace.records() {
        *occupancy.entry(record.to.as_str()).or_default() += 1;
    }

    println!("first ten steps: {:?}", &trace.path()[..10.min(trace.len() + 1)]);
    for name in names {
        let hits = occupancy.get(name).copied().unwrap_or(0);
        println!(
            "{name:>6}: {hits:5} ticks ({:.1}%)",
            100.0 * hits as f64 / TICKS as f64
        );
    }
    Ok(())
}
