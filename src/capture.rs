/*!
An in-memory [`Backend`] that records everything written to it. Useful for
tests and for observing exactly which wire messages and PCM frames the
sequencer produces without any audio hardware.
!*/

use crate::backend::{Backend, MidiSink, WaveSink, WaveSpec};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// One recorded MIDI message with its arrival time.
#[derive(Clone, Debug)]
pub struct CapturedMessage {
    pub at: Instant,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
struct WaveCapture {
    specs: Vec<WaveSpec>,
    frames: Vec<u8>,
}

/// A backend that stores MIDI bytes and PCM frames per port.
pub struct CaptureBackend {
    midi: Vec<Arc<CapturePort>>,
    wave: Vec<Arc<Mutex<WaveCapture>>>,
    /// Number of upcoming wave writes that should fail, for exercising the
    /// recovery path.
    wave_failures: Arc<AtomicUsize>,
}

impl CaptureBackend {
    pub fn new(midi_ports: usize, wave_ports: usize) -> Self {
        Self {
            midi: (0..midi_ports).map(|_| Arc::new(CapturePort::default())).collect(),
            wave: (0..wave_ports).map(|_| Arc::new(Mutex::new(WaveCapture::default()))).collect(),
            wave_failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// All messages recorded on a 1-based MIDI port, oldest first.
    pub fn midi_messages(&self, port: usize) -> Vec<CapturedMessage> {
        self.midi[port - 1].messages()
    }

    /// The concatenated wire bytes of a 1-based MIDI port.
    pub fn midi_bytes(&self, port: usize) -> Vec<u8> {
        self.midi_messages(port)
            .into_iter()
            .flat_map(|m| m.bytes)
            .collect()
    }

    /// All PCM frame bytes written to a 1-based wave port.
    pub fn wave_frames(&self, port: usize) -> Vec<u8> {
        lock(&self.wave[port - 1]).frames.clone()
    }

    /// The parameters of each stream opened on a 1-based wave port.
    pub fn wave_specs(&self, port: usize) -> Vec<WaveSpec> {
        lock(&self.wave[port - 1]).specs.clone()
    }

    /// Make the next `count` wave writes fail, as an underrun would.
    pub fn fail_wave_writes(&self, count: usize) {
        self.wave_failures.store(count, Ordering::SeqCst);
    }
}

impl Backend for CaptureBackend {
    fn midi_out_ports(&self) -> usize {
        self.midi.len()
    }

    fn wave_out_ports(&self) -> usize {
        self.wave.len()
    }

    fn open_midi_out(&self, port: usize) -> io::Result<Arc<dyn MidiSink>> {
        match port.checked_sub(1).and_then(|i| self.midi.get(i)) {
            Some(captured) => Ok(Arc::clone(captured) as Arc<dyn MidiSink>),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no MIDI port {}", port),
            )),
        }
    }

    fn open_wave_out(&self, port: usize, spec: &WaveSpec) -> io::Result<Box<dyn WaveSink>> {
        match port.checked_sub(1).and_then(|i| self.wave.get(i)) {
            Some(captured) => {
                lock(captured).specs.push(*spec);
                Ok(Box::new(CaptureStream {
                    capture: Arc::clone(captured),
                    failures: Arc::clone(&self.wave_failures),
                }))
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no wave port {}", port),
            )),
        }
    }
}

#[derive(Default)]
pub struct CapturePort {
    messages: Mutex<Vec<CapturedMessage>>,
}

impl CapturePort {
    fn messages(&self) -> Vec<CapturedMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MidiSink for CapturePort {
    fn send(&self, message: &[u8]) -> io::Result<()> {
        let mut messages = self
            .messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        messages.push(CapturedMessage {
            at: Instant::now(),
            bytes: message.to_vec(),
        });
        Ok(())
    }
}

struct CaptureStream {
    capture: Arc<Mutex<WaveCapture>>,
    failures: Arc<AtomicUsize>,
}

impl WaveSink for CaptureStream {
    fn write_frames(&mut self, frames: &[u8]) -> io::Result<()> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(io::Error::new(io::ErrorKind::WouldBlock, "underrun"));
        }
        lock(&self.capture).frames.extend_from_slice(frames);
        Ok(())
    }

    fn recover(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn lock(capture: &Mutex<WaveCapture>) -> MutexGuard<'_, WaveCapture> {
    capture.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_midi_per_port() {
        let backend = CaptureBackend::new(2, 0);
        let a = backend.open_midi_out(1).unwrap();
        let b = backend.open_midi_out(2).unwrap();
        a.send(&[0x90, 0x3b, 0x7f]).unwrap();
        b.send(&[0xc0, 0x05]).unwrap();
        a.send(&[0x80, 0x3b, 0x00]).unwrap();
        assert_eq!(
            vec![0x90, 0x3b, 0x7f, 0x80, 0x3b, 0x00],
            backend.midi_bytes(1)
        );
        assert_eq!(vec![0xc0, 0x05], backend.midi_bytes(2));
        assert!(backend.open_midi_out(3).is_err());
    }

    #[test]
    fn records_wave_frames_and_specs() {
        let backend = CaptureBackend::new(0, 1);
        let spec = WaveSpec {
            channels: 2,
            sample_rate: 44_100,
            bits: 16,
            block_align: 4,
        };
        let mut stream = backend.open_wave_out(1, &spec).unwrap();
        stream.write_frames(&[1, 2, 3, 4]).unwrap();
        stream.write_frames(&[5, 6, 7, 8]).unwrap();
        assert_eq!(vec![1, 2, 3, 4, 5, 6, 7, 8], backend.wave_frames(1));
        assert_eq!(vec![spec], backend.wave_specs(1));
    }

    #[test]
    fn injected_failures_then_recover() {
        let backend = CaptureBackend::new(0, 1);
        let spec = WaveSpec {
            channels: 1,
            sample_rate: 8_000,
            bits: 8,
            block_align: 1,
        };
        let mut stream = backend.open_wave_out(1, &spec).unwrap();
        backend.fail_wave_writes(1);
        assert!(stream.write_frames(&[1]).is_err());
        stream.recover().unwrap();
        assert!(stream.write_frames(&[1]).is_ok());
        assert_eq!(vec![1], backend.wave_frames(1));
    }
}
