/*!
The scheduler thread. It owns the consuming side of the pending-event
queue: producers insert and nudge, this loop alone pops. The one-shot
high-resolution timer is a bounded wait on the command channel; a `Nudge`
re-evaluates the head deadline, expiry drains, and dropping the sender (or
an explicit `Shutdown`) ends the thread.

While its timer is armed the scheduler counts as one virtual synth worker,
so synth quiescence includes the live queue.
!*/

use crate::clock;
use crate::exec;
use crate::sequencer::Inner;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, trace};
use std::sync::Arc;
use std::time::Duration;

pub(crate) enum TimerCmd {
    /// The queue head may have changed, recompute the deadline.
    Nudge,
    Shutdown,
}

pub(crate) fn run(inner: Arc<Inner>, commands: Receiver<TimerCmd>) {
    debug!("scheduler thread running");
    loop {
        match deadline(&inner) {
            None => match commands.recv() {
                Ok(TimerCmd::Nudge) => continue,
                Ok(TimerCmd::Shutdown) | Err(_) => break,
            },
            Some(wait) => match commands.recv_timeout(wait) {
                Ok(TimerCmd::Nudge) => continue,
                Ok(TimerCmd::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => drain_due(&inner),
            },
        }
    }
    debug!("scheduler thread exiting");
}

/// Time until the head event is due, or `None` when there is nothing to
/// wait for.
fn deadline(inner: &Arc<Inner>) -> Option<Duration> {
    let epoch = inner.output_epoch()?;
    let head = inner.sched_lock().queue.head_time()?;
    Some(clock::ticks_duration(head - clock::elapsed_ticks(epoch)))
}

/// The timer expired: execute everything past due, in queue order, then let
/// the loop re-arm for the new head. Draining all of it at once keeps
/// controller state consistent after a stall, at the price of a burst of
/// notes.
fn drain_due(inner: &Arc<Inner>) {
    let epoch = match inner.output_epoch() {
        Some(epoch) => epoch,
        None => return, // stopped between expiry and here, queue is flushed
    };
    let mut sched = inner.sched_lock();
    let now = clock::elapsed_ticks(epoch);
    let mut executed = 0usize;
    while let Some(event) = sched.queue.pop_due(now) {
        if let Err(e) = exec::execute(inner, &event) {
            // there is no caller to surface this to
            error!("fatal, the scheduler could not execute an event: {}", e);
            panic!("sequencer scheduler failure: {}", e);
        }
        executed += 1;
    }
    trace!("scheduler drained {} due event(s)", executed);
    if sched.queue.is_empty() && sched.timer_armed {
        sched.timer_armed = false;
        drop(sched);
        inner.synth_active.exit_scheduler();
    }
}
