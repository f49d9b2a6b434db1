/*!
The scheduling unit shared by the live API, the pending-event queue, the SMF
decoder and the playback workers. A [`SeqEvent`] is a small `Copy` record: a
1-based output port, an absolute time in 100 microsecond ticks (`0` means
"execute now, not sequenced"), and a payload-carrying [`EventKind`].
!*/

use crate::clock::Ticks;

/// One schedulable operation with its payload.
///
/// Channels, notes and instruments are 1-based here and 0-based on the wire.
/// `value` fields cover the full `0..=i32::MAX` range (or the symmetric
/// signed range where noted) and are reduced to 7 or 14 wire bits by the
/// executor.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    NoteOn { channel: i32, note: i32, velocity: i32 },
    NoteOff { channel: i32, note: i32, velocity: i32 },
    Aftertouch { channel: i32, note: i32, velocity: i32 },
    InstChange { channel: i32, instrument: i32 },
    /// Channel pressure.
    Pressure { channel: i32, value: i32 },
    /// Pitch wheel, signed, `0` is center.
    Pitch { channel: i32, value: i32 },
    /// Pitch wheel sensitivity (registered parameter 0,0).
    PitchRange { channel: i32, value: i32 },
    Attack { channel: i32, value: i32 },
    Release { channel: i32, value: i32 },
    Vibrato { channel: i32, value: i32 },
    /// Per-channel synthesizer volume.
    VolSynthChan { channel: i32, value: i32 },
    /// Portamento time.
    PortTime { channel: i32, value: i32 },
    /// Signed, `-i32::MAX` is all left, `0` is center, `i32::MAX` all right.
    Balance { channel: i32, value: i32 },
    /// Signed, like [`EventKind::Balance`].
    Pan { channel: i32, value: i32 },
    Timbre { channel: i32, value: i32 },
    Brightness { channel: i32, value: i32 },
    Reverb { channel: i32, value: i32 },
    Tremulo { channel: i32, value: i32 },
    Chorus { channel: i32, value: i32 },
    Celeste { channel: i32, value: i32 },
    Phaser { channel: i32, value: i32 },
    Legato { channel: i32, on: bool },
    Portamento { channel: i32, on: bool },
    /// Mono operation with the number of channels to apply, `0..=16`.
    Mono { channel: i32, value: i32 },
    Poly { channel: i32 },
    /// Start a playback worker for the loaded synth track `id`.
    PlaySynth { id: usize },
    /// Start a playback worker for the loaded wave track `id`.
    PlayWave { id: usize },
    /// Wave output volume. Accepted and currently ignored.
    VolWave { value: i32 },
}

/// A sequencer event record.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SeqEvent {
    /// 1-based logical output port.
    pub port: usize,
    /// Absolute time in 100 microsecond ticks since the sequencer epoch, or
    /// `0` for immediate execution.
    pub time: Ticks,
    pub kind: EventKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_small() {
        // the queue recycles these through a pool, keep them copyable
        assert!(std::mem::size_of::<SeqEvent>() <= 40);
        let e = SeqEvent {
            port: 2,
            time: 0,
            kind: EventKind::NoteOn {
                channel: 1,
                note: 61,
                velocity: i32::MAX,
            },
        };
        let f = e;
        assert_eq!(e, f);
        assert_eq!(0, f.time);
    }
}
