//! A request/response client with retry on timeout.
//!
//! The machine sends a request on entering `Sending`, arms a timeout, and
//! waits. A response moves it to `Done`; a timeout loops back through
//! `Sending` to retry, up to the terminal `GaveUp` state after three
//! attempts. The simulated server only answers the second request, so the
//! run shows one timeout-driven retry, a success, and a stale timeout being
//! discarded.
//!
//! Run with `cargo run --example request_response`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use waypoint::builder::StateMachineBuilder;
use waypoint::{Event, NamedEvent, State, StateMachine, ThreadScheduler, Transition};

const MAX_ATTEMPTS: usize = 3;
const REPLY_TIMEOUT: Duration = Duration::from_millis(150);

fn main() -> Result<(), waypoint::MachineError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,waypoint=debug".into()),
        )
        .init();

    let attempts = Arc::new(AtomicUsize::new(0));

    let sender = attempts.clone();
    let sending = State::with_action(
        "Sending",
        move |m: &StateMachine, _s: &State, _e: Option<&dyn Event>| {
            let attempt = sender.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt > MAX_ATTEMPTS {
                m.receive(NamedEvent::new("exhausted"));
                return;
            }
            tracing::info!(attempt, "sending request");
            // Pretend to put a request on the wire, then wait for a reply.
            if let Err(err) = m.schedule_timeout(REPLY_TIMEOUT) {
                tracing::error!(%err, "could not arm the reply timeout");
            }
        },
    )?;

    let machine = StateMachineBuilder::new("request-client")
        .scheduler(Arc::new(ThreadScheduler::new()))
        .start_state(sending.clone())
        .transitions([
            Transition::on_name(sending.clone(), "response", State::new("Done")?),
            Transition::on_name(sending.clone(), "TIMEOUT", sending.clone())
                .with_action(|_firing| tracing::warn!("no reply; retrying")),
            Transition::on_name(sending, "exhausted", State::new("GaveUp")?),
        ])
        .on_end(|m: &StateMachine| {
            tracing::info!(machine = %m, "finished");
        })
        .trace()
        .build()?;

    // The "server": ignores the first request, answers the second.
    let requests = attempts.clone();
    let client = machine.clone();
    let server = thread::spawn(move || loop {
        thread::sleep(Duration::from_millis(50));
        if requests.load(Ordering::SeqCst) >= 2 {
            client.receive(NamedEvent::new("response"));
            return;
        }
    });

    machine.begin();
    let _ = server.join();

    while !machine.is_ended() {
        thread::sleep(Duration::from_millis(20));
    }

    let trace = machine.transition_trace();
    println!("path taken: {:?}", trace.path());
    if let Some(elapsed) = trace.duration() {
        println!("elapsed: {elapsed:?}");
    }
    Ok(())
}
