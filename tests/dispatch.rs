//! End-to-end dispatch scenarios: cascades, wildcards, timeouts through a
//! scheduler, and terminal callbacks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use waypoint::builder::StateMachineBuilder;
use waypoint::{
    Event, MatchMode, NamedEvent, State, StateMachine, Transition, ThreadScheduler,
};

fn state(name: &str) -> State {
    State::new(name).unwrap()
}

fn wait_until(probe: impl Fn() -> bool, what: &str) {
    let started = Instant::now();
    while !probe() {
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "timed out waiting for {what}"
        );
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn epsilon_cascade_runs_entry_actions_on_every_hop() {
    let visits = Arc::new(Mutex::new(Vec::new()));
    let log = |visits: &Arc<Mutex<Vec<String>>>| {
        let visits = visits.clone();
        move |_m: &StateMachine, s: &State, _e: Option<&dyn Event>| {
            visits.lock().unwrap().push(s.name().to_string());
        }
    };
    let a = State::with_action("a", log(&visits)).unwrap();
    let b = State::with_action("b", log(&visits)).unwrap();
    let c = State::with_action("c", log(&visits)).unwrap();
    let d = State::with_action("d", log(&visits)).unwrap();

    let machine = StateMachineBuilder::new("cascade")
        .start_state(a.clone())
        .transitions([
            Transition::on_name(a, "go", b.clone()),
            Transition::epsilon(b, c.clone()),
            Transition::epsilon(c, d.clone()),
        ])
        .build()
        .unwrap();

    machine.begin();
    machine.receive(NamedEvent::new("go"));

    assert_eq!(machine.current_state(), Some(d));
    assert_eq!(machine.transition_count(), 3);
    assert_eq!(
        *visits.lock().unwrap(),
        vec!["a".to_string(), "b".into(), "c".into(), "d".into()]
    );
}

#[test]
fn wildcard_is_a_fallback_not_an_override() {
    let machine = StateMachineBuilder::new("guarded")
        .start_state(state("gate"))
        .transitions([
            Transition::on_name(state("gate"), "open", state("open")),
            Transition::wildcard(state("gate"), state("alarm"), MatchMode::StringEquals),
            Transition::on_name(state("alarm"), "reset", state("gate")),
            Transition::on_name(state("open"), "close", state("gate")),
        ])
        .build()
        .unwrap();
    machine.begin();

    machine.receive(NamedEvent::new("knock"));
    assert_eq!(machine.current_state(), Some(state("alarm")));

    machine.receive(NamedEvent::new("reset"));
    machine.receive(NamedEvent::new("open"));
    assert_eq!(machine.current_state(), Some(state("open")));
}

#[test]
fn the_three_match_modes_agree_on_their_own_triggers() {
    // The same two-state shape, driven through each matching mode.
    let by_name = StateMachineBuilder::new("by-name")
        .mode(MatchMode::StringEquals)
        .start_state(state("a"))
        .transition(Transition::on_name(state("a"), "go", state("b")))
        .transition(Transition::on_name(state("b"), "back", state("a")))
        .build()
        .unwrap();
    by_name.receive(NamedEvent::with_name(1u32, "go"));
    assert_eq!(by_name.current_state(), Some(state("b")));

    let by_type = StateMachineBuilder::new("by-type")
        .mode(MatchMode::ClassEquals)
        .start_state(state("a"))
        .transition(Transition::on_type::<NamedEvent<u32>>(state("a"), state("b")))
        .transition(Transition::on_type::<NamedEvent<bool>>(state("b"), state("a")))
        .build()
        .unwrap();
    by_type.receive(NamedEvent::new("ignored"));
    assert_eq!(by_type.current_state(), Some(state("a")));
    by_type.receive(NamedEvent::with_name(1u32, "anything"));
    assert_eq!(by_type.current_state(), Some(state("b")));

    let by_value = StateMachineBuilder::new("by-value")
        .mode(MatchMode::Equals)
        .start_state(state("a"))
        .transition(Transition::on_event(
            state("a"),
            NamedEvent::with_name(1u32, "go"),
            state("b"),
        ))
        .transition(Transition::on_event(
            state("b"),
            NamedEvent::with_name(2u32, "go"),
            state("a"),
        ))
        .build()
        .unwrap();
    by_value.receive(NamedEvent::with_name(2u32, "go"));
    assert_eq!(by_value.current_state(), Some(state("a")));
    by_value.receive(NamedEvent::with_name(1u32, "go"));
    assert_eq!(by_value.current_state(), Some(state("b")));
}

#[test]
fn terminal_trackers_fire_once_and_absorb_later_input() {
    let fired = Arc::new(AtomicUsize::new(0));
    let probe = fired.clone();
    let machine = StateMachineBuilder::new("finite")
        .start_state(state("work"))
        .transitions([
            Transition::on_name(state("work"), "more", state("work")),
            Transition::on_name(state("work"), "done", state("end")),
        ])
        .on_end(move |_m: &StateMachine| {
            probe.fetch_add(1, Ordering::SeqCst);
        })
        .build()
        .unwrap();
    machine.begin();

    machine.receive(NamedEvent::new("more"));
    machine.receive(NamedEvent::new("done"));
    machine.receive(NamedEvent::new("more"));
    machine.receive(NamedEvent::new("done"));

    assert!(machine.is_ended());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(machine.current_state(), Some(state("end")));
    assert_eq!(machine.transition_count(), 2);
}

#[test]
fn a_timeout_that_loses_the_race_is_discarded() {
    // Waiting state schedules a timeout; the response arrives first, so the
    // timeout must be dropped when it is finally delivered.
    let waiting = State::with_action(
        "waiting",
        |m: &StateMachine, _s: &State, _e: Option<&dyn Event>| {
            if let Err(err) = m.schedule_timeout(Duration::from_millis(100)) {
                panic!("scheduling failed: {err}");
            }
        },
    )
    .unwrap();

    let machine = StateMachineBuilder::new("client")
        .scheduler(Arc::new(ThreadScheduler::new()))
        .start_state(waiting.clone())
        .transitions([
            Transition::on_name(waiting.clone(), "response", state("done")),
            Transition::on_name(waiting, "TIMEOUT", state("failed")),
        ])
        .build()
        .unwrap();

    machine.begin();
    machine.receive(NamedEvent::new("response"));
    assert_eq!(machine.current_state(), Some(state("done")));

    // Outlive the timer comfortably; the machine must not move to "failed".
    thread::sleep(Duration::from_millis(300));
    assert_eq!(machine.current_state(), Some(state("done")));
    assert_eq!(machine.transition_count(), 1);
}

#[test]
fn a_timeout_that_wins_the_race_fires() {
    let waiting = State::with_action(
        "waiting",
        |m: &StateMachine, _s: &State, _e: Option<&dyn Event>| {
            if let Err(err) = m.schedule_timeout(Duration::from_millis(20)) {
                panic!("scheduling failed: {err}");
            }
        },
    )
    .unwrap();

    let machine = StateMachineBuilder::new("client")
        .scheduler(Arc::new(ThreadScheduler::new()))
        .start_state(waiting.clone())
        .transitions([
            Transition::on_name(waiting.clone(), "response", state("done")),
            Transition::on_name(waiting, "TIMEOUT", state("failed")),
        ])
        .build()
        .unwrap();

    machine.begin();
    let probe = machine.clone();
    wait_until(
        || probe.current_state() == Some(state("failed")),
        "the timeout transition",
    );
    assert_eq!(machine.transition_count(), 1);
}

#[test]
fn named_timeouts_are_independent() {
    // Two outstanding timers with distinct names; only the matching
    // transition fires for each.
    let machine = StateMachineBuilder::new("timers")
        .scheduler(Arc::new(ThreadScheduler::new()))
        .start_state(state("a"))
        .transitions([
            Transition::on_name(state("a"), "SHORT", state("b")),
            Transition::on_name(state("a"), "LONG", state("x")),
            Transition::on_name(state("b"), "LONG", state("c")),
            Transition::on_name(state("c"), "again", state("a")),
            Transition::on_name(state("x"), "again", state("a")),
        ])
        .build()
        .unwrap();
    machine.begin();

    // Both deadlines are count + 1, so the first delivery invalidates the
    // second; schedule the long one from the state the short one reaches.
    machine
        .schedule_timeout_named("SHORT", Duration::from_millis(20))
        .unwrap();
    let probe = machine.clone();
    wait_until(
        || probe.current_state() == Some(state("b")),
        "the short timer",
    );

    machine
        .schedule_timeout_named("LONG", Duration::from_millis(20))
        .unwrap();
    let probe = machine.clone();
    wait_until(
        || probe.current_state() == Some(state("c")),
        "the long timer",
    );
}

#[test]
fn self_transitions_refresh_the_timeout_window() {
    // A keep-alive loop: each "ping" bumps the transition count, so a
    // previously scheduled timeout goes stale.
    let machine = StateMachineBuilder::new("keepalive")
        .scheduler(Arc::new(ThreadScheduler::new()))
        .start_state(state("alive"))
        .transitions([
            Transition::on_name(state("alive"), "ping", state("alive")),
            Transition::on_name(state("alive"), "TIMEOUT", state("dead")),
        ])
        .build()
        .unwrap();
    machine.begin();

    machine.schedule_timeout(Duration::from_millis(50)).unwrap();
    machine.receive(NamedEvent::new("ping"));

    thread::sleep(Duration::from_millis(200));
    assert_eq!(machine.current_state(), Some(state("alive")));

    // With no further pings the next timeout lands.
    machine.schedule_timeout(Duration::from_millis(20)).unwrap();
    let probe = machine.clone();
    wait_until(
        || probe.current_state() == Some(state("dead")),
        "the fatal timeout",
    );
}

#[test]
fn concurrent_senders_are_serialized() {
    // Many threads hammer a two-state toggle; every accepted event is one
    // transition, and the machine never observes a torn state.
    let machine = StateMachineBuilder::new("toggle")
        .start_state(state("a"))
        .transitions([
            Transition::on_name(state("a"), "flip", state("b")),
            Transition::on_name(state("b"), "flip", state("a")),
        ])
        .build()
        .unwrap();
    machine.begin();

    let threads: Vec<_> = (0..8)
        .map(|_| {
            let machine = machine.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    machine.receive(NamedEvent::new("flip"));
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    assert_eq!(machine.transition_count(), 800);
    let expected = if machine.transition_count() % 2 == 0 {
        state("a")
    } else {
        state("b")
    };
    assert_eq!(machine.current_state(), Some(expected));
}
