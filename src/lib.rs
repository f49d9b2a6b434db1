/*!
A flow-through sequencer for MIDI events and PCM clips.

Synthesizer control events are submitted with an absolute timestamp in 100
microsecond ticks. Events whose time is `0` (or already past while the
sequencer is running) execute on the calling thread; future events go onto
a time-ordered queue drained by a dedicated scheduler thread. Loaded
Standard MIDI Files and WAV clips play on detached workers, and the two
worker classes can each be awaited for quiescence.

Device drivers stay outside the crate: a [`Backend`] supplies the ports,
wire MIDI goes through [`MidiSink`] and PCM frames through [`WaveSink`].
The bundled [`CaptureBackend`] records everything in memory.

```
use sound_sequencer::{CaptureBackend, Sequencer};
use std::sync::Arc;

let backend = Arc::new(CaptureBackend::new(1, 0));
let seq = Sequencer::new(Box::new(Arc::clone(&backend)))?;
seq.open_synth_out(1)?;
seq.start_time();
seq.note_on(1, 0, 1, 60, i32::MAX)?;
seq.note_off(1, 0, 1, 60, 0)?;
assert_eq!(
    backend.midi_bytes(1),
    vec![0x90, 0x3b, 0x7f, 0x80, 0x3b, 0x00]
);
# Ok::<(), sound_sequencer::Error>(())
```
!*/

#[macro_use]
mod error;

mod backend;
mod byte_iter;
pub mod capture;
mod clock;
mod constants;
mod counters;
mod event;
mod exec;
mod queue;
mod sched;
mod sequencer;
mod smf;
mod vlq;
mod wave;

pub use backend::{Backend, MidiSink, WaveSink, WaveSpec};
pub use capture::{CaptureBackend, CapturedMessage};
pub use clock::Ticks;
pub use constants::{MAX_PORTS, MAX_SYNTH_TRACKS, MAX_WAVE_TRACKS};
pub use error::{Error, ErrorKind, Result};
pub use event::{EventKind, SeqEvent};
pub use sequencer::Sequencer;
