//! Deferred values: host data that is still being computed.
//!
//! Resolution blocks the rendering thread until the value arrives. There is
//! no timeout: a producer that never completes stalls that render forever.
//! A producer that is dropped without completing resolves to nothing.
//!
//! Waiting is a plain condition-variable wait, so it is also safe from a
//! thread that is driving an async runtime (the worker is parked, not
//! panicked).

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::value::Value;

/// A value that may complete later. Clones share the same slot.
#[derive(Clone)]
pub struct Deferred {
    slot: Arc<Slot>,
}

struct Slot {
    state: Mutex<State>,
    settled: Condvar,
}

enum State {
    Pending,
    Ready(Value),
    Dropped,
}

impl Slot {
    fn new(state: State) -> Arc<Slot> {
        Arc::new(Slot {
            state: Mutex::new(state),
            settled: Condvar::new(),
        })
    }

    fn settle(&self, next: State) {
        let mut state = self.state.lock();
        if matches!(*state, State::Pending) {
            *state = next;
            self.settled.notify_all();
        }
    }
}

/// Producer half of a [`Deferred`]. Dropping it without completing settles
/// the value as missing.
pub struct Completer(Arc<Slot>);

impl Completer {
    pub fn complete(self, value: impl Into<Value>) {
        self.0.settle(State::Ready(value.into()));
    }
}

impl Drop for Completer {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        if matches!(*state, State::Pending) {
            tracing::warn!("deferred value dropped before completion");
            *state = State::Dropped;
            self.0.settled.notify_all();
        }
    }
}

impl fmt::Debug for Completer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Completer")
    }
}

impl Deferred {
    /// A pending value and the handle that completes it.
    pub fn channel() -> (Completer, Deferred) {
        let slot = Slot::new(State::Pending);
        (Completer(Arc::clone(&slot)), Deferred { slot })
    }

    /// An already-completed value.
    pub fn ready(value: impl Into<Value>) -> Self {
        Deferred {
            slot: Slot::new(State::Ready(value.into())),
        }
    }

    /// Compute the value on a background thread.
    pub fn spawn<F, V>(produce: F) -> Self
    where
        F: FnOnce() -> V + Send + 'static,
        V: Into<Value>,
    {
        let (completer, deferred) = Deferred::channel();
        std::thread::spawn(move || completer.complete(produce()));
        deferred
    }

    /// Block until the value is available. `None` if the producer was dropped.
    pub fn wait(&self) -> Option<Value> {
        let mut state = self.slot.state.lock();
        while matches!(*state, State::Pending) {
            self.slot.settled.wait(&mut state);
        }
        match &*state {
            State::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.slot.state.lock(), State::Ready(_))
    }

    /// Whether both handles share one slot.
    pub fn same(&self, other: &Deferred) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.slot.state.try_lock().as_deref() {
            Some(State::Pending) => "pending",
            Some(State::Ready(_)) => "ready",
            Some(State::Dropped) => "dropped",
            None => "waiting",
        };
        write!(f, "Deferred({state})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn ready_value_is_returned_immediately() {
        let deferred = Deferred::ready(5);
        assert!(deferred.is_ready());
        assert_eq!(deferred.wait(), Some(Value::Int(5)));
    }

    #[test]
    fn wait_blocks_until_completion() {
        let (completer, deferred) = Deferred::channel();
        let (started_tx, started_rx) = mpsc::channel();
        let waiter = {
            let deferred = deferred.clone();
            std::thread::spawn(move || {
                started_tx.send(()).unwrap();
                deferred.wait()
            })
        };
        started_rx.recv().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        completer.complete("late");
        assert_eq!(waiter.join().unwrap(), Some(Value::Str("late".into())));
        assert!(deferred.is_ready(), "result is memoized for other handles");
    }

    #[test]
    fn spawn_runs_producer() {
        let deferred = Deferred::spawn(|| vec![1, 2, 3]);
        assert_eq!(deferred.wait(), Some(Value::from(vec![1, 2, 3])));
    }

    #[test]
    fn dropped_producer_resolves_to_none() {
        let (completer, deferred) = Deferred::channel();
        drop(completer);
        assert_eq!(deferred.wait(), None);
        assert_eq!(deferred.wait(), None);
    }

    #[test]
    fn debug_shows_state() {
        let (_completer, deferred) = Deferred::channel();
        assert_eq!(format!("{deferred:?}"), "Deferred(pending)");
        assert_eq!(format!("{:?}", Deferred::ready(1)), "Deferred(ready)");
    }
}
