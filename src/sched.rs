//! The scheduler boundary.
//!
//! Event delivery is decoupled from the engine: a [`Scheduler`] queues
//! events and hands them back to an [`EventProcessor`] (the state machine),
//! either immediately or after a relative delay. Timeout delivery timing is
//! entirely the scheduler's business; the machine only stamps timeout
//! events with their transition-count deadline.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::core::Event;

/// A consumer of scheduled events. Implemented by
/// [`StateMachine`](crate::machine::StateMachine).
pub trait EventProcessor: Send + Sync {
    fn process(&self, event: Arc<dyn Event>);
}

/// Queues events for later delivery to a processor.
pub trait Scheduler: Send + Sync {
    /// Enqueue `event` for delivery to `target` as soon as possible.
    fn schedule_event(&self, target: Arc<dyn EventProcessor>, event: Arc<dyn Event>);

    /// Enqueue `event` for delivery to `target` after `delay`.
    fn schedule_event_relative(
        &self,
        target: Arc<dyn EventProcessor>,
        event: Arc<dyn Event>,
        delay: Duration,
    );
}

/// A minimal scheduler: immediate events are delivered inline on the
/// calling thread; delayed events are delivered from a spawned timer
/// thread. Good enough for demos and tests; makes no precision guarantee.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_event(&self, target: Arc<dyn EventProcessor>, event: Arc<dyn Event>) {
        target.process(event);
    }

    fn schedule_event_relative(
        &self,
        target: Arc<dyn EventProcessor>,
        event: Arc<dyn Event>,
        delay: Duration,
    ) {
        thread::spawn(move || {
            thread::sleep(delay);
            target.process(event);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NamedEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct Recorder {
        seen: AtomicUsize,
    }

    impl EventProcessor for Recorder {
        fn process(&self, _event: Arc<dyn Event>) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn immediate_events_are_delivered_inline() {
        let recorder = Arc::new(Recorder::default());
        ThreadScheduler::new().schedule_event(recorder.clone(), Arc::new(NamedEvent::new("x")));
        assert_eq!(recorder.seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delayed_events_arrive_after_the_delay() {
        let recorder = Arc::new(Recorder::default());
        let started = Instant::now();
        ThreadScheduler::new().schedule_event_relative(
            recorder.clone(),
            Arc::new(NamedEvent::new("x")),
            Duration::from_millis(20),
        );

        assert_eq!(recorder.seen.load(Ordering::SeqCst), 0);
        while recorder.seen.load(Ordering::SeqCst) == 0 {
            assert!(started.elapsed() < Duration::from_secs(5), "delivery never happened");
            thread::sleep(Duration::from_millis(5));
        }
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
