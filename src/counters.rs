/*!
Quiescence accounting for the two worker classes. Each class keeps a count
of active workers behind a mutex with a condition variable that is signalled
when the count returns to zero. The synth side additionally keeps a count
per track slot, under the same mutex, because deletion needs the slot count
and the signal discipline to agree.

The scheduler participates in the synth count as one virtual worker while
its timer is armed, so waiting on synth quiescence also waits for the live
queue to drain.
!*/

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

pub(crate) struct SynthCounters {
    state: Mutex<SynthState>,
    idle: Condvar,
}

struct SynthState {
    total: i64,
    per_slot: Vec<i64>,
}

impl SynthCounters {
    /// `slots` is the number of 1-based track ids tracked individually.
    pub(crate) fn new(slots: usize) -> Self {
        Self {
            state: Mutex::new(SynthState {
                total: 0,
                per_slot: vec![0; slots + 1],
            }),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SynthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A playback worker for track `id` has started.
    pub(crate) fn enter_slot(&self, id: usize) {
        let mut state = self.lock();
        state.total += 1;
        state.per_slot[id] += 1;
    }

    /// A playback worker for track `id` has finished.
    pub(crate) fn exit_slot(&self, id: usize) {
        let mut state = self.lock();
        state.total -= 1;
        state.per_slot[id] -= 1;
        debug_assert!(state.total >= 0 && state.per_slot[id] >= 0);
        if state.total == 0 {
            self.idle.notify_all();
        }
    }

    /// The scheduler timer went active.
    pub(crate) fn enter_scheduler(&self) {
        self.lock().total += 1;
    }

    /// The scheduler queue drained, or was flushed.
    pub(crate) fn exit_scheduler(&self) {
        let mut state = self.lock();
        state.total -= 1;
        debug_assert!(state.total >= 0);
        if state.total == 0 {
            self.idle.notify_all();
        }
    }

    /// True when no worker is currently playing track `id`.
    pub(crate) fn slot_idle(&self, id: usize) -> bool {
        self.lock().per_slot[id] == 0
    }

    /// Block until every synth worker (and the armed scheduler, if any) has
    /// finished. Returns at once when the class is already quiet.
    pub(crate) fn wait_idle(&self) {
        let mut state = self.lock();
        while state.total > 0 {
            state = self
                .idle
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    #[cfg(test)]
    pub(crate) fn total(&self) -> i64 {
        self.lock().total
    }
}

pub(crate) struct WaveCounter {
    count: Mutex<i64>,
    idle: Condvar,
}

impl WaveCounter {
    pub(crate) fn new() -> Self {
        Self {
            count: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, i64> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn enter(&self) {
        *self.lock() += 1;
    }

    pub(crate) fn exit(&self) {
        let mut count = self.lock();
        *count -= 1;
        debug_assert!(*count >= 0);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    pub(crate) fn wait_idle(&self) {
        let mut count = self.lock();
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    #[cfg(test)]
    pub(crate) fn current(&self) -> i64 {
        *self.lock()
    }
}
