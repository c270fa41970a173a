//! Counting permit pool gating job dispatch.

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
struct State {
    available: usize,
    in_flight: usize,
    peak: usize,
}

#[derive(Debug)]
pub struct Permits {
    state: Mutex<State>,
    freed: Condvar,
}

/// One in-flight slot; released on drop.
#[derive(Debug)]
pub struct Permit<'a> {
    pool: &'a Permits,
}

impl Permits {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                available: capacity.max(1),
                in_flight: 0,
                peak: 0,
            }),
            freed: Condvar::new(),
        }
    }

    /// Block until a slot is free.
    pub fn acquire(&self) -> Permit<'_> {
        let mut state = self.state.lock();
        while state.available == 0 {
            self.freed.wait(&mut state);
        }
        state.available -= 1;
        state.in_flight += 1;
        state.peak = state.peak.max(state.in_flight);
        Permit { pool: self }
    }

    /// Highest number of permits held at once so far.
    pub fn peak(&self) -> usize {
        self.state.lock().peak
    }

    #[cfg(test)]
    fn in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.available += 1;
        state.in_flight -= 1;
        drop(state);
        self.freed.notify_one();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.pool.release();
    }
}
