/*!
The seam between the sequencer and the device drivers. The engine never
talks to hardware directly: a [`Backend`] enumerates the logical ports and
opens them, wire MIDI goes through a [`MidiSink`], and PCM frames go through
a [`WaveSink`]. Driver failures travel back as `std::io::Error` and surface
from the API as [`crate::ErrorKind::OutputDevice`].
!*/

use std::io;
use std::sync::Arc;

/// The PCM parameters of a wave file, as handed to the driver when a
/// playback worker opens its device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaveSpec {
    pub channels: u16,
    /// Sample frames per second.
    pub sample_rate: u32,
    /// Bits per sample, one of 8, 16, 24 or 32.
    pub bits: u16,
    /// Bytes per frame, covering all channels.
    pub block_align: u16,
}

/// A MIDI output port.
///
/// `send` delivers one complete wire message (status byte plus data bytes)
/// and is expected to be bounded-cost. The sequencer writes from multiple
/// threads and relies on the implementation to serialize the byte stream;
/// it does not promise that the coarse/fine message pairs of a semantic
/// event arrive without other messages interleaved.
pub trait MidiSink: Send + Sync {
    fn send(&self, message: &[u8]) -> io::Result<()>;
}

/// An open PCM playback stream.
///
/// `write_frames` receives whole interleaved frames, never a partial frame.
/// When a write fails, the worker calls `recover` once and retries; a second
/// failure terminates the playback.
pub trait WaveSink: Send {
    fn write_frames(&mut self, frames: &[u8]) -> io::Result<()>;

    /// Attempt to bring the stream back after an underrun or overrun.
    fn recover(&mut self) -> io::Result<()>;
}

/// The device driver collaborator handed to [`crate::Sequencer::new`].
///
/// Port numbers are 1-based everywhere. The counts are fixed for the life of
/// the backend; enumeration and capability negotiation happen before the
/// sequencer is constructed.
pub trait Backend: Send + Sync {
    /// The number of MIDI output ports configured.
    fn midi_out_ports(&self) -> usize;

    /// The number of MIDI input ports configured.
    fn midi_in_ports(&self) -> usize {
        0
    }

    /// The number of PCM output ports configured.
    fn wave_out_ports(&self) -> usize;

    /// The number of PCM input ports configured.
    fn wave_in_ports(&self) -> usize {
        0
    }

    /// Open a MIDI output port. The returned sink is shared by every thread
    /// that writes to the port until it is closed.
    fn open_midi_out(&self, port: usize) -> io::Result<Arc<dyn MidiSink>>;

    /// Open a PCM playback stream on `port` with the given parameters. Each
    /// playback worker opens its own stream.
    fn open_wave_out(&self, port: usize, spec: &WaveSpec) -> io::Result<Box<dyn WaveSink>>;
}

// a backend can be shared, e.g. handed to the sequencer while the caller
// keeps a handle for inspection
impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn midi_out_ports(&self) -> usize {
        (**self).midi_out_ports()
    }

    fn midi_in_ports(&self) -> usize {
        (**self).midi_in_ports()
    }

    fn wave_out_ports(&self) -> usize {
        (**self).wave_out_ports()
    }

    fn wave_in_ports(&self) -> usize {
        (**self).wave_in_ports()
    }

    fn open_midi_out(&self, port: usize) -> io::Result<Arc<dyn MidiSink>> {
        (**self).open_midi_out(port)
    }

    fn open_wave_out(&self, port: usize, spec: &WaveSpec) -> io::Result<Box<dyn WaveSink>> {
        (**self).open_wave_out(port, spec)
    }
}
