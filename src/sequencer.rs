/*!
The sequencer itself: epoch state, entry guards, the immediate-or-queued
disposition of every submission, the synth/wave track caches, the playback
workers, and the public API. Everything the engine shares across threads
lives in one [`Inner`] value behind an `Arc`; the [`Sequencer`] handle owns
the scheduler thread and shuts it down on drop. Playback workers are
detached and hold their own `Arc`, so dropping the handle never interrupts
running playback.
!*/

use crate::backend::{Backend, MidiSink};
use crate::clock::{self, Ticks};
use crate::constants::{MAX_PORTS, MAX_SYNTH_TRACKS, MAX_WAVE_TRACKS};
use crate::counters::{SynthCounters, WaveCounter};
use crate::error::{LibResult, Result};
use crate::event::{EventKind, SeqEvent};
use crate::exec;
use crate::queue::EventQueue;
use crate::sched::{self, TimerCmd};
use crate::{smf, wave};
use crossbeam_channel::Sender;
use log::{debug, error};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// A flow-through MIDI/PCM event sequencer.
///
/// Events carry an absolute `time` in 100 microsecond ticks measured from
/// the [`start_time`](Sequencer::start_time) epoch. A time of `0`, or any
/// time already past, executes on the calling thread immediately; future
/// times are queued and executed by the scheduler thread when due.
/// [`play_synth`](Sequencer::play_synth) and
/// [`play_wave`](Sequencer::play_wave) kick off detached playback workers
/// that stream a loaded track on their own.
pub struct Sequencer {
    inner: Arc<Inner>,
    scheduler: Option<thread::JoinHandle<()>>,
}

impl Sequencer {
    /// Create a sequencer over the given device backend and start its
    /// scheduler thread. The sequencer begins in the stopped state.
    pub fn new(backend: Box<dyn Backend>) -> Result<Self> {
        let (timer_tx, timer_rx) = crossbeam_channel::unbounded();
        let inner = Arc::new(Inner {
            backend,
            epochs: Mutex::new(Epochs::default()),
            sched: Mutex::new(SchedState {
                queue: EventQueue::new(),
                timer_armed: false,
            }),
            timer_tx,
            midi_out: Mutex::new(vec![None; MAX_PORTS]),
            wave_out: Mutex::new(vec![false; MAX_PORTS]),
            midi_in: Mutex::new(vec![false; MAX_PORTS]),
            wave_in: Mutex::new(vec![false; MAX_PORTS]),
            synth_tracks: Mutex::new(vec![None; MAX_SYNTH_TRACKS]),
            wave_tracks: Mutex::new(vec![None; MAX_WAVE_TRACKS]),
            synth_active: SynthCounters::new(MAX_SYNTH_TRACKS),
            wave_active: WaveCounter::new(),
        });
        let scheduler = thread::Builder::new()
            .name("sequencer-scheduler".into())
            .spawn({
                let inner = Arc::clone(&inner);
                move || sched::run(inner, timer_rx)
            })
            .map_err(|e| {
                crate::error::ResourceExhaustedSnafu {
                    site: site!(),
                    description: e.to_string(),
                }
                .build()
            })?;
        Ok(Self {
            inner,
            scheduler: Some(scheduler),
        })
    }

    // ------------------------------------------------------------------
    // lifecycle
    // ------------------------------------------------------------------

    /// Record the output epoch and enter the Running state. All sequenced
    /// times are measured from this moment. Calling it while already
    /// running re-bases the epoch.
    pub fn start_time(&self) {
        self.inner.epochs_lock().output = Some(Instant::now());
        debug!("sequencer running");
    }

    /// Leave the Running state: cancel the pending timer and drop every
    /// queued event. Running playback workers are unaffected.
    pub fn stop_time(&self) {
        self.inner.epochs_lock().output = None;
        let mut sched = self.inner.sched_lock();
        let dropped = sched.queue.len();
        sched.queue.drain();
        let was_armed = std::mem::replace(&mut sched.timer_armed, false);
        drop(sched);
        if was_armed {
            self.inner.synth_active.exit_scheduler();
        }
        let _ = self.inner.timer_tx.send(TimerCmd::Nudge);
        debug!("sequencer stopped, {} pending event(s) dropped", dropped);
    }

    /// Ticks elapsed since the output epoch.
    pub fn current_time(&self) -> Result<Ticks> {
        match self.inner.output_epoch() {
            Some(epoch) => Ok(clock::elapsed_ticks(epoch)),
            None => Err(crate::error::NotRunningSnafu { site: site!() }.build().into()),
        }
    }

    /// Record the input epoch. While marking, incoming MIDI is stamped
    /// with its arrival time instead of `0`.
    pub fn start_time_in(&self) {
        self.inner.epochs_lock().input = Some(Instant::now());
    }

    /// Stop marking input time.
    pub fn stop_time_in(&self) {
        self.inner.epochs_lock().input = None;
    }

    /// Ticks elapsed since the input epoch.
    pub fn current_time_in(&self) -> Result<Ticks> {
        match self.inner.epochs_lock().input {
            Some(epoch) => Ok(clock::elapsed_ticks(epoch)),
            None => Err(crate::error::NotRunningSnafu { site: site!() }.build().into()),
        }
    }

    // ------------------------------------------------------------------
    // devices
    // ------------------------------------------------------------------

    /// The number of logical synthesizer output ports.
    pub fn synth_out_ports(&self) -> usize {
        self.inner.backend().midi_out_ports().min(MAX_PORTS)
    }

    /// The number of logical synthesizer input ports.
    pub fn synth_in_ports(&self) -> usize {
        self.inner.backend().midi_in_ports().min(MAX_PORTS)
    }

    /// The number of logical wave output ports.
    pub fn wave_out_ports(&self) -> usize {
        self.inner.backend().wave_out_ports().min(MAX_PORTS)
    }

    /// The number of logical wave input ports.
    pub fn wave_in_ports(&self) -> usize {
        self.inner.backend().wave_in_ports().min(MAX_PORTS)
    }

    /// Open a synthesizer output port. Opening a port that is already open
    /// is an error; close it first.
    pub fn open_synth_out(&self, port: usize) -> Result<()> {
        Ok(self.inner.open_synth_out(port)?)
    }

    pub fn close_synth_out(&self, port: usize) -> Result<()> {
        Ok(self.inner.close_synth_out(port)?)
    }

    pub fn open_synth_in(&self, port: usize) -> Result<()> {
        Ok(self.inner.open_synth_in(port)?)
    }

    pub fn close_synth_in(&self, port: usize) -> Result<()> {
        Ok(self.inner.close_synth_in(port)?)
    }

    /// Open a wave output port. The driver stream itself is opened by each
    /// playback worker with the parameters of the file it plays.
    pub fn open_wave_out(&self, port: usize) -> Result<()> {
        Ok(self.inner.open_wave_out(port)?)
    }

    pub fn close_wave_out(&self, port: usize) -> Result<()> {
        Ok(self.inner.close_wave_out(port)?)
    }

    pub fn open_wave_in(&self, port: usize) -> Result<()> {
        Ok(self.inner.open_wave_in(port)?)
    }

    pub fn close_wave_in(&self, port: usize) -> Result<()> {
        Ok(self.inner.close_wave_in(port)?)
    }

    // ------------------------------------------------------------------
    // live events
    // ------------------------------------------------------------------

    /// Turn a note on. `note` is 1 to 128, `velocity` is `0..=i32::MAX`.
    pub fn note_on(
        &self,
        port: usize,
        time: Ticks,
        channel: i32,
        note: i32,
        velocity: i32,
    ) -> Result<()> {
        self.live(port, time, EventKind::NoteOn { channel, note, velocity })
    }

    /// Turn a note off.
    pub fn note_off(
        &self,
        port: usize,
        time: Ticks,
        channel: i32,
        note: i32,
        velocity: i32,
    ) -> Result<()> {
        self.live(port, time, EventKind::NoteOff { channel, note, velocity })
    }

    /// Polyphonic key pressure.
    pub fn aftertouch(
        &self,
        port: usize,
        time: Ticks,
        channel: i32,
        note: i32,
        velocity: i32,
    ) -> Result<()> {
        self.live(port, time, EventKind::Aftertouch { channel, note, velocity })
    }

    /// Change the instrument (program) on a channel, `instrument` is 1 to
    /// 128.
    pub fn instrument_change(
        &self,
        port: usize,
        time: Ticks,
        channel: i32,
        instrument: i32,
    ) -> Result<()> {
        self.live(port, time, EventKind::InstChange { channel, instrument })
    }

    /// Channel pressure.
    pub fn pressure(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Pressure { channel, value })
    }

    /// Pitch wheel. `value` is signed, `0` is center.
    pub fn pitch(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Pitch { channel, value })
    }

    /// Pitch wheel sensitivity.
    pub fn pitch_range(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::PitchRange { channel, value })
    }

    pub fn attack(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Attack { channel, value })
    }

    pub fn release(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Release { channel, value })
    }

    pub fn vibrato(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Vibrato { channel, value })
    }

    /// Per-channel synthesizer volume.
    pub fn vol_synth_chan(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::VolSynthChan { channel, value })
    }

    /// Portamento time.
    pub fn port_time(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::PortTime { channel, value })
    }

    /// Left/right balance, signed, `0` is center.
    pub fn balance(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Balance { channel, value })
    }

    /// Left/right pan position, signed, `0` is center.
    pub fn pan(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Pan { channel, value })
    }

    pub fn timbre(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Timbre { channel, value })
    }

    pub fn brightness(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Brightness { channel, value })
    }

    pub fn reverb(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Reverb { channel, value })
    }

    pub fn tremulo(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Tremulo { channel, value })
    }

    pub fn chorus(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Chorus { channel, value })
    }

    pub fn celeste(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Celeste { channel, value })
    }

    pub fn phaser(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Phaser { channel, value })
    }

    pub fn legato(&self, port: usize, time: Ticks, channel: i32, on: bool) -> Result<()> {
        self.live(port, time, EventKind::Legato { channel, on })
    }

    pub fn portamento(&self, port: usize, time: Ticks, channel: i32, on: bool) -> Result<()> {
        self.live(port, time, EventKind::Portamento { channel, on })
    }

    /// Mono operation. `value` is the number of channels to apply, 0 to 16.
    pub fn mono(&self, port: usize, time: Ticks, channel: i32, value: i32) -> Result<()> {
        self.live(port, time, EventKind::Mono { channel, value })
    }

    /// Return a channel to polyphonic operation.
    pub fn poly(&self, port: usize, time: Ticks, channel: i32) -> Result<()> {
        self.live(port, time, EventKind::Poly { channel })
    }

    // ------------------------------------------------------------------
    // loaded content
    // ------------------------------------------------------------------

    /// Decode an SMF (or RMID) file into the track cache under `id`.
    pub fn load_synth<P: AsRef<Path>>(&self, id: usize, path: P) -> Result<()> {
        Ok(self.inner.load_synth(id, path.as_ref())?)
    }

    /// Remove the synth track under `id`. Blocks until no worker is
    /// playing it.
    pub fn delete_synth(&self, id: usize) -> Result<()> {
        Ok(self.inner.delete_synth(id)?)
    }

    /// Play the loaded synth track `id` on `port`, immediately or at the
    /// sequenced `time`. Does not block; playback runs on its own worker.
    pub fn play_synth(&self, port: usize, time: Ticks, id: usize) -> Result<()> {
        self.live(port, time, EventKind::PlaySynth { id })
    }

    /// Remember the wave file under `id`. The file is opened at play time.
    pub fn load_wave<P: AsRef<Path>>(&self, id: usize, path: P) -> Result<()> {
        Ok(self.inner.load_wave(id, path.as_ref())?)
    }

    /// Remove the wave file under `id`. Never blocks; a running worker
    /// keeps its own reference.
    pub fn delete_wave(&self, id: usize) -> Result<()> {
        Ok(self.inner.delete_wave(id)?)
    }

    /// Play the loaded wave file `id` on `port`, immediately or at the
    /// sequenced `time`. Does not block.
    pub fn play_wave(&self, port: usize, time: Ticks, id: usize) -> Result<()> {
        self.live(port, time, EventKind::PlayWave { id })
    }

    /// Wave playback volume. Accepted and currently ignored.
    pub fn vol_wave(&self, port: usize, time: Ticks, value: i32) -> Result<()> {
        self.live(port, time, EventKind::VolWave { value })
    }

    // ------------------------------------------------------------------
    // quiescence
    // ------------------------------------------------------------------

    /// Block until every synth worker has finished and the live queue has
    /// drained. Returns at once when already quiet.
    pub fn wait_synth(&self, port: usize) -> Result<()> {
        self.inner.check_synth_out(port)?;
        self.inner.synth_active.wait_idle();
        Ok(())
    }

    /// Block until every wave worker has finished. Returns at once when
    /// already quiet.
    pub fn wait_wave(&self, port: usize) -> Result<()> {
        self.inner.check_wave_out(port)?;
        self.inner.wave_active.wait_idle();
        Ok(())
    }

    fn live(&self, port: usize, time: Ticks, kind: EventKind) -> Result<()> {
        validate(&self.inner, port, &kind)?;
        Ok(submit(&self.inner, SeqEvent { port, time, kind })?)
    }
}

impl Drop for Sequencer {
    fn drop(&mut self) {
        let _ = self.inner.timer_tx.send(TimerCmd::Shutdown);
        if let Some(handle) = self.scheduler.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Default)]
struct Epochs {
    output: Option<Instant>,
    input: Option<Instant>,
}

pub(crate) struct SchedState {
    pub(crate) queue: EventQueue,
    /// Mirrors "the scheduler timer is pending", and with it the
    /// scheduler's presence in the synth counter.
    pub(crate) timer_armed: bool,
}

/// All shared state. The scheduler thread and every playback worker hold an
/// `Arc` of this.
pub(crate) struct Inner {
    backend: Box<dyn Backend>,
    epochs: Mutex<Epochs>,
    pub(crate) sched: Mutex<SchedState>,
    pub(crate) timer_tx: Sender<TimerCmd>,
    midi_out: Mutex<Vec<Option<Arc<dyn MidiSink>>>>,
    wave_out: Mutex<Vec<bool>>,
    midi_in: Mutex<Vec<bool>>,
    wave_in: Mutex<Vec<bool>>,
    synth_tracks: Mutex<Vec<Option<Arc<Vec<SeqEvent>>>>>,
    wave_tracks: Mutex<Vec<Option<Arc<String>>>>,
    pub(crate) synth_active: SynthCounters,
    pub(crate) wave_active: WaveCounter,
}

fn relock<'a, T>(
    result: std::result::Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub(crate) fn sched_lock(&self) -> MutexGuard<'_, SchedState> {
        relock(self.sched.lock())
    }

    fn epochs_lock(&self) -> MutexGuard<'_, Epochs> {
        relock(self.epochs.lock())
    }

    pub(crate) fn output_epoch(&self) -> Option<Instant> {
        self.epochs_lock().output
    }

    /// The sink for an open synth output port, cloned out so that nothing
    /// is locked while bytes are written.
    pub(crate) fn midi_sink(&self, port: usize) -> LibResult<Arc<dyn MidiSink>> {
        let table = relock(self.midi_out.lock());
        match port.checked_sub(1).and_then(|i| table.get(i)) {
            Some(Some(sink)) => Ok(Arc::clone(sink)),
            _ => Err(bad_arg_e!("synth port {} is not open", port)),
        }
    }

    fn synth_list(&self, id: usize) -> Option<Arc<Vec<SeqEvent>>> {
        relock(self.synth_tracks.lock())[id - 1].clone()
    }

    fn wave_file(&self, id: usize) -> Option<Arc<String>> {
        relock(self.wave_tracks.lock())[id - 1].clone()
    }

    // --- device tables -------------------------------------------------

    fn check_synth_range(&self, port: usize) -> LibResult<()> {
        if port < 1 || port > MAX_PORTS {
            bad_arg!("synth port {} is out of range", port);
        }
        if port > self.backend.midi_out_ports() {
            bad_arg!("no synthesizer is configured for port {}", port);
        }
        Ok(())
    }

    fn check_wave_range(&self, port: usize) -> LibResult<()> {
        if port < 1 || port > MAX_PORTS {
            bad_arg!("wave port {} is out of range", port);
        }
        if port > self.backend.wave_out_ports() {
            bad_arg!("no wave device is configured for port {}", port);
        }
        Ok(())
    }

    pub(crate) fn check_synth_out(&self, port: usize) -> LibResult<()> {
        self.check_synth_range(port)?;
        if relock(self.midi_out.lock())[port - 1].is_none() {
            bad_arg!("synth port {} is not open", port);
        }
        Ok(())
    }

    pub(crate) fn check_wave_out(&self, port: usize) -> LibResult<()> {
        self.check_wave_range(port)?;
        if !relock(self.wave_out.lock())[port - 1] {
            bad_arg!("wave port {} is not open", port);
        }
        Ok(())
    }

    fn open_synth_out(&self, port: usize) -> LibResult<()> {
        self.check_synth_range(port)?;
        let mut table = relock(self.midi_out.lock());
        if table[port - 1].is_some() {
            bad_arg!("synth port {} is already open", port);
        }
        let sink = self.backend.open_midi_out(port).map_err(|e| {
            crate::error::OutputDeviceSnafu {
                site: site!(),
                description: e.to_string(),
            }
            .build()
        })?;
        table[port - 1] = Some(sink);
        debug!("synth port {} open", port);
        Ok(())
    }

    fn close_synth_out(&self, port: usize) -> LibResult<()> {
        self.check_synth_range(port)?;
        if relock(self.midi_out.lock())[port - 1].take().is_none() {
            bad_arg!("synth port {} is not open", port);
        }
        debug!("synth port {} closed", port);
        Ok(())
    }

    fn open_wave_out(&self, port: usize) -> LibResult<()> {
        self.check_wave_range(port)?;
        let mut table = relock(self.wave_out.lock());
        if table[port - 1] {
            bad_arg!("wave port {} is already open", port);
        }
        table[port - 1] = true;
        debug!("wave port {} open", port);
        Ok(())
    }

    fn close_wave_out(&self, port: usize) -> LibResult<()> {
        self.check_wave_range(port)?;
        let mut table = relock(self.wave_out.lock());
        if !table[port - 1] {
            bad_arg!("wave port {} is not open", port);
        }
        table[port - 1] = false;
        debug!("wave port {} closed", port);
        Ok(())
    }

    fn open_synth_in(&self, port: usize) -> LibResult<()> {
        if port < 1 || port > MAX_PORTS {
            bad_arg!("synth port {} is out of range", port);
        }
        if port > self.backend.midi_in_ports() {
            bad_arg!("no synthesizer input is configured for port {}", port);
        }
        let mut table = relock(self.midi_in.lock());
        if table[port - 1] {
            bad_arg!("synth input port {} is already open", port);
        }
        table[port - 1] = true;
        Ok(())
    }

    fn close_synth_in(&self, port: usize) -> LibResult<()> {
        let mut table = relock(self.midi_in.lock());
        match port.checked_sub(1).and_then(|i| table.get_mut(i)) {
            Some(open) if *open => {
                *open = false;
                Ok(())
            }
            _ => Err(bad_arg_e!("synth input port {} is not open", port)),
        }
    }

    fn open_wave_in(&self, port: usize) -> LibResult<()> {
        if port < 1 || port > MAX_PORTS {
            bad_arg!("wave port {} is out of range", port);
        }
        if port > self.backend.wave_in_ports() {
            bad_arg!("no wave input is configured for port {}", port);
        }
        let mut table = relock(self.wave_in.lock());
        if table[port - 1] {
            bad_arg!("wave input port {} is already open", port);
        }
        table[port - 1] = true;
        Ok(())
    }

    fn close_wave_in(&self, port: usize) -> LibResult<()> {
        let mut table = relock(self.wave_in.lock());
        match port.checked_sub(1).and_then(|i| table.get_mut(i)) {
            Some(open) if *open => {
                *open = false;
                Ok(())
            }
            _ => Err(bad_arg_e!("wave input port {} is not open", port)),
        }
    }

    // --- track caches --------------------------------------------------

    fn load_synth(&self, id: usize, path: &Path) -> LibResult<()> {
        check_synth_id(id)?;
        // decode outside the table lock
        let events = smf::load_file(path)?;
        let mut tracks = relock(self.synth_tracks.lock());
        if tracks[id - 1].is_some() {
            return crate::error::SlotInUseSnafu { site: site!(), id }.fail();
        }
        debug!("synth track {} loaded with {} event(s)", id, events.len());
        tracks[id - 1] = Some(Arc::new(events));
        Ok(())
    }

    fn delete_synth(&self, id: usize) -> LibResult<()> {
        check_synth_id(id)?;
        loop {
            {
                let mut tracks = relock(self.synth_tracks.lock());
                if self.synth_active.slot_idle(id) {
                    return match tracks[id - 1].take() {
                        Some(_) => {
                            debug!("synth track {} deleted", id);
                            Ok(())
                        }
                        None => crate::error::NoSlotSnafu { site: site!(), id }.fail(),
                    };
                }
            }
            // a worker is still playing this slot, try again shortly
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn load_wave(&self, id: usize, path: &Path) -> LibResult<()> {
        check_wave_id(id)?;
        let mut tracks = relock(self.wave_tracks.lock());
        if tracks[id - 1].is_some() {
            return crate::error::SlotInUseSnafu { site: site!(), id }.fail();
        }
        debug!("wave track {} loaded from '{}'", id, path.display());
        tracks[id - 1] = Some(Arc::new(path.to_string_lossy().into_owned()));
        Ok(())
    }

    fn delete_wave(&self, id: usize) -> LibResult<()> {
        check_wave_id(id)?;
        match relock(self.wave_tracks.lock())[id - 1].take() {
            Some(_) => {
                debug!("wave track {} deleted", id);
                Ok(())
            }
            None => crate::error::NoSlotSnafu { site: site!(), id }.fail(),
        }
    }
}

/// Entry guards, one place for the whole API surface.
fn validate(inner: &Inner, port: usize, kind: &EventKind) -> LibResult<()> {
    match *kind {
        EventKind::NoteOn { channel, note, .. }
        | EventKind::NoteOff { channel, note, .. }
        | EventKind::Aftertouch { channel, note, .. } => {
            inner.check_synth_out(port)?;
            check_channel(channel)?;
            check_note(note)
        }
        EventKind::InstChange {
            channel,
            instrument,
        } => {
            inner.check_synth_out(port)?;
            check_channel(channel)?;
            check_instrument(instrument)
        }
        EventKind::Mono { channel, value } => {
            inner.check_synth_out(port)?;
            check_channel(channel)?;
            if !(0..=16).contains(&value) {
                bad_arg!("mono channel count {} is out of range", value);
            }
            Ok(())
        }
        EventKind::Pressure { channel, .. }
        | EventKind::Pitch { channel, .. }
        | EventKind::PitchRange { channel, .. }
        | EventKind::Attack { channel, .. }
        | EventKind::Release { channel, .. }
        | EventKind::Vibrato { channel, .. }
        | EventKind::VolSynthChan { channel, .. }
        | EventKind::PortTime { channel, .. }
        | EventKind::Balance { channel, .. }
        | EventKind::Pan { channel, .. }
        | EventKind::Timbre { channel, .. }
        | EventKind::Brightness { channel, .. }
        | EventKind::Reverb { channel, .. }
        | EventKind::Tremulo { channel, .. }
        | EventKind::Chorus { channel, .. }
        | EventKind::Celeste { channel, .. }
        | EventKind::Phaser { channel, .. }
        | EventKind::Legato { channel, .. }
        | EventKind::Portamento { channel, .. }
        | EventKind::Poly { channel } => {
            inner.check_synth_out(port)?;
            check_channel(channel)
        }
        EventKind::PlaySynth { id } => {
            inner.check_synth_out(port)?;
            check_synth_id(id)
        }
        EventKind::PlayWave { id } => {
            inner.check_wave_out(port)?;
            check_wave_id(id)?;
            if inner.wave_file(id).is_none() {
                return crate::error::NoSlotSnafu { site: site!(), id }.fail();
            }
            Ok(())
        }
        EventKind::VolWave { .. } => inner.check_wave_out(port),
    }
}

/// Decide the disposition of a validated event: execute inline when the
/// time is `0` or already past while running, otherwise queue it and make
/// sure the scheduler is armed for it.
pub(crate) fn submit(inner: &Arc<Inner>, event: SeqEvent) -> LibResult<()> {
    let epoch = inner.output_epoch();
    let due_now = match epoch.map(clock::elapsed_ticks) {
        _ if event.time == 0 => true,
        Some(elapsed) => event.time <= elapsed,
        None => false,
    };
    if due_now {
        return exec::execute(inner, &event);
    }
    if epoch.is_none() {
        return crate::error::NotRunningSnafu { site: site!() }.fail();
    }
    let mut sched = inner.sched_lock();
    // stop_time clears the epoch before it takes this lock, re-check so an
    // event cannot be stranded in a flushed queue
    if inner.output_epoch().is_none() {
        return crate::error::NotRunningSnafu { site: site!() }.fail();
    }
    let new_head = sched.queue.head_time().map_or(true, |head| event.time < head);
    if !sched.timer_armed {
        sched.timer_armed = true;
        inner.synth_active.enter_scheduler();
    }
    sched.queue.insert(event);
    drop(sched);
    if new_head && inner.timer_tx.send(TimerCmd::Nudge).is_err() {
        return crate::error::TimerFaultSnafu { site: site!() }.fail();
    }
    Ok(())
}

/// Spawn the detached worker that streams a loaded synth track. Called by
/// the executor for `PlaySynth`.
pub(crate) fn kickoff_synth(inner: &Arc<Inner>, port: usize, id: usize) -> LibResult<()> {
    let inner = Arc::clone(inner);
    spawn_worker(format!("synth-play-{}", id), move || {
        synth_worker(inner, port, id)
    })
}

/// Spawn the detached worker that streams a loaded wave file. Called by
/// the executor for `PlayWave`.
pub(crate) fn kickoff_wave(inner: &Arc<Inner>, port: usize, id: usize) -> LibResult<()> {
    let inner = Arc::clone(inner);
    spawn_worker(format!("wave-play-{}", id), move || {
        wave_worker(inner, port, id)
    })
}

fn spawn_worker<F>(name: String, work: F) -> LibResult<()>
where
    F: FnOnce() + Send + 'static,
{
    match thread::Builder::new().name(name).spawn(work) {
        Ok(_) => Ok(()),
        Err(e) => crate::error::ResourceExhaustedSnafu {
            site: site!(),
            description: e.to_string(),
        }
        .fail(),
    }
}

fn synth_worker(inner: Arc<Inner>, port: usize, id: usize) {
    let list = match inner.synth_list(id) {
        Some(list) => list,
        None => return, // nothing loaded, not an error here
    };
    inner.synth_active.enter_slot(id);
    debug!("synth worker playing track {} on port {}", id, port);
    let epoch = Instant::now();
    for record in list.iter() {
        let wait = record.time - clock::elapsed_ticks(epoch);
        if wait > 0 {
            thread::sleep(clock::ticks_duration(wait));
        }
        // the cached list is shared with other workers, the port is
        // stamped on a stack copy
        let mut event = *record;
        event.port = port;
        if let Err(e) = exec::execute(&inner, &event) {
            error!("synth worker for track {} stopped: {}", id, e);
            break;
        }
    }
    inner.synth_active.exit_slot(id);
}

fn wave_worker(inner: Arc<Inner>, port: usize, id: usize) {
    let file = match inner.wave_file(id) {
        Some(file) => file,
        None => return,
    };
    inner.wave_active.enter();
    debug!("wave worker playing clip {} on port {}", id, port);
    if let Err(e) = wave::play(inner.backend(), port, &file) {
        error!("wave worker for clip {} stopped: {}", id, e);
    }
    inner.wave_active.exit();
}

fn check_channel(channel: i32) -> LibResult<()> {
    if !(1..=16).contains(&channel) {
        bad_arg!("channel {} is out of range", channel);
    }
    Ok(())
}

fn check_note(note: i32) -> LibResult<()> {
    if !(1..=128).contains(&note) {
        bad_arg!("note {} is out of range", note);
    }
    Ok(())
}

fn check_instrument(instrument: i32) -> LibResult<()> {
    if !(1..=128).contains(&instrument) {
        bad_arg!("instrument {} is out of range", instrument);
    }
    Ok(())
}

fn check_synth_id(id: usize) -> LibResult<()> {
    if id < 1 || id > MAX_SYNTH_TRACKS {
        bad_arg!("synth track id {} is out of range", id);
    }
    Ok(())
}

fn check_wave_id(id: usize) -> LibResult<()> {
    if id < 1 || id > MAX_WAVE_TRACKS {
        bad_arg!("wave track id {} is out of range", id);
    }
    Ok(())
}
