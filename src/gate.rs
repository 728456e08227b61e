//! Readiness gate.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Callback registered through `Store::when_ready`.
pub type ReadyCallback = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct GateState {
    open: bool,
    waiters: Vec<ReadyCallback>,
}

/// Broadcast latch: each opening releases every waiter queued while closed,
/// exactly once. Closing re-arms it for the next opening.
#[derive(Default)]
pub(crate) struct ReadyGate {
    state: Mutex<GateState>,
    opened: Condvar,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Open the gate and hand back the waiters to run. Returns `None` if it was
    /// already open.
    ///
    /// The caller decides where the callbacks run; none of them run under the
    /// gate lock.
    pub fn open(&self) -> Option<Vec<ReadyCallback>> {
        let waiters = {
            let mut state = self.state.lock();
            if state.open {
                return None;
            }
            state.open = true;
            std::mem::take(&mut state.waiters)
        };
        self.opened.notify_all();
        Some(waiters)
    }

    /// Close the gate again. Waiters queued from now on wait for the next
    /// opening; nothing pending is dropped.
    pub fn close(&self) {
        self.state.lock().open = false;
    }

    /// Run `callback` once the gate is open. Runs inline if it already is.
    pub fn when_ready(&self, callback: ReadyCallback) {
        {
            let mut state = self.state.lock();
            if !state.open {
                state.waiters.push(callback);
                return;
            }
        }
        callback();
    }

    /// Block until the gate opens or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while !state.open {
            if self.opened.wait_until(&mut state, deadline).timed_out() {
                return state.open;
            }
        }
        true
    }

    pub fn pending(&self) -> usize {
        self.state.lock().waiters.len()
    }
}
