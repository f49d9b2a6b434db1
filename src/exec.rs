/*!
The event executor: the one place that turns a [`SeqEvent`] into side
effects. Wire-MIDI kinds become 2 or 3 byte messages on the port's sink,
`PlaySynth`/`PlayWave` kick off detached playback workers and return at
once, and `VolWave` is accepted and dropped.

Value scaling: API values span `0..=i32::MAX` and reduce to the 7-bit wire
range by integer division; the fine (low) 7 bits of 14-bit controls come
from a smaller divisor; signed balance/pan/pitch values reduce to 14 bits
biased around `0x2000`.

The executor never touches the pending-event queue or its lock.
!*/

use crate::constants::*;
use crate::error::LibResult;
use crate::event::{EventKind, SeqEvent};
use crate::sequencer::{self, Inner};
use log::debug;
use std::sync::Arc;

pub(crate) fn execute(inner: &Arc<Inner>, event: &SeqEvent) -> LibResult<()> {
    let port = event.port;
    match event.kind {
        EventKind::NoteOn {
            channel,
            note,
            velocity,
        } => send3(
            inner,
            port,
            MESS_NOTE_ON | chan(channel),
            data7(note - 1),
            scale7(velocity),
        ),
        EventKind::NoteOff {
            channel,
            note,
            velocity,
        } => send3(
            inner,
            port,
            MESS_NOTE_OFF | chan(channel),
            data7(note - 1),
            scale7(velocity),
        ),
        EventKind::Aftertouch {
            channel,
            note,
            velocity,
        } => send3(
            inner,
            port,
            MESS_AFTERTOUCH | chan(channel),
            data7(note - 1),
            scale7(velocity),
        ),
        EventKind::InstChange {
            channel,
            instrument,
        } => send2(
            inner,
            port,
            MESS_PGM_CHG | chan(channel),
            data7(instrument - 1),
        ),
        EventKind::Pressure { channel, value } => send2(
            inner,
            port,
            MESS_CHN_PRES | chan(channel),
            scale7(value),
        ),
        EventKind::Pitch { channel, value } => {
            // reduce to 14 bits, positive only, low byte first on the wire
            let bent = bias14(value);
            send3(
                inner,
                port,
                MESS_PTCH_WHL | chan(channel),
                (bent & 0x7f) as u8,
                (bent / 0x80) as u8,
            )
        }
        EventKind::PitchRange { channel, value } => {
            control(inner, port, channel, CTLR_REGISTERED_PARAMETER_COARSE, 0)?;
            control(inner, port, channel, CTLR_REGISTERED_PARAMETER_FINE, 0)?;
            control(inner, port, channel, CTLR_DATA_ENTRY_COARSE, scale7(value))?;
            control(inner, port, channel, CTLR_DATA_ENTRY_FINE, fine7(value))
        }
        EventKind::Attack { channel, value } => {
            control(inner, port, channel, CTLR_SOUND_ATTACK_TIME, scale7(value))
        }
        EventKind::Release { channel, value } => {
            control(inner, port, channel, CTLR_SOUND_RELEASE_TIME, scale7(value))
        }
        EventKind::Vibrato { channel, value } => {
            control(inner, port, channel, CTLR_MODULATION_WHEEL_COARSE, scale7(value))?;
            control(inner, port, channel, CTLR_MODULATION_WHEEL_FINE, fine7(value))
        }
        EventKind::VolSynthChan { channel, value } => {
            control(inner, port, channel, CTLR_VOLUME_COARSE, scale7(value))?;
            control(inner, port, channel, CTLR_VOLUME_FINE, fine7(value))
        }
        EventKind::PortTime { channel, value } => {
            control(inner, port, channel, CTLR_PORTAMENTO_TIME_COARSE, scale7(value))?;
            control(inner, port, channel, CTLR_PORTAMENTO_TIME_FINE, fine7(value))
        }
        EventKind::Balance { channel, value } => {
            let b = bias14(value);
            control(inner, port, channel, CTLR_BALANCE_COARSE, (b / 0x80) as u8)?;
            control(inner, port, channel, CTLR_BALANCE_FINE, (b & 0x7f) as u8)
        }
        EventKind::Pan { channel, value } => {
            let b = bias14(value);
            control(inner, port, channel, CTLR_PAN_POSITION_COARSE, (b / 0x80) as u8)?;
            control(inner, port, channel, CTLR_PAN_POSITION_FINE, (b & 0x7f) as u8)
        }
        EventKind::Timbre { channel, value } => {
            control(inner, port, channel, CTLR_SOUND_TIMBRE, scale7(value))
        }
        EventKind::Brightness { channel, value } => {
            control(inner, port, channel, CTLR_SOUND_BRIGHTNESS, scale7(value))
        }
        EventKind::Reverb { channel, value } => {
            control(inner, port, channel, CTLR_EFFECTS_LEVEL, scale7(value))
        }
        EventKind::Tremulo { channel, value } => {
            control(inner, port, channel, CTLR_TREMULO_LEVEL, scale7(value))
        }
        EventKind::Chorus { channel, value } => {
            control(inner, port, channel, CTLR_CHORUS_LEVEL, scale7(value))
        }
        EventKind::Celeste { channel, value } => {
            control(inner, port, channel, CTLR_CELESTE_LEVEL, scale7(value))
        }
        EventKind::Phaser { channel, value } => {
            control(inner, port, channel, CTLR_PHASER_LEVEL, scale7(value))
        }
        EventKind::Legato { channel, on } => {
            control(inner, port, channel, CTLR_LEGATO_PEDAL, on_off(on))
        }
        EventKind::Portamento { channel, on } => {
            control(inner, port, channel, CTLR_PORTAMENTO, on_off(on))
        }
        EventKind::Mono { channel, value } => {
            // the wire value is the channel count itself, not a scaled level
            control(inner, port, channel, CTLR_MONO_OPERATION, data7(value))
        }
        EventKind::Poly { channel } => control(inner, port, channel, CTLR_POLY_OPERATION, 0),
        EventKind::PlaySynth { id } => sequencer::kickoff_synth(inner, port, id),
        EventKind::PlayWave { id } => sequencer::kickoff_wave(inner, port, id),
        EventKind::VolWave { value } => {
            debug!("wave volume {} accepted and ignored", value);
            Ok(())
        }
    }
}

/// Reduce a full-range value to the 7-bit wire range.
fn scale7(value: i32) -> u8 {
    (value / 0x0100_0000).clamp(0, 127) as u8
}

/// The low 7 bits of a full-range value reduced to 14 bits.
fn fine7(value: i32) -> u8 {
    ((value / 0x0002_0000) & 0x7f) as u8
}

/// Reduce a signed full-range value to 14 bits, positive only.
fn bias14(value: i32) -> i32 {
    value / 0x0004_0000 + 0x2000
}

fn chan(channel: i32) -> u8 {
    ((channel - 1) & 0x0f) as u8
}

fn data7(value: i32) -> u8 {
    (value & 0x7f) as u8
}

fn on_off(on: bool) -> u8 {
    if on {
        127
    } else {
        0
    }
}

fn control(inner: &Arc<Inner>, port: usize, channel: i32, controller: u8, value: u8) -> LibResult<()> {
    send3(inner, port, MESS_CTRL_CHG | chan(channel), controller, value)
}

fn send2(inner: &Arc<Inner>, port: usize, status: u8, data1: u8) -> LibResult<()> {
    deliver(inner, port, &[status, data1])
}

fn send3(inner: &Arc<Inner>, port: usize, status: u8, data1: u8, data2: u8) -> LibResult<()> {
    deliver(inner, port, &[status, data1, data2])
}

fn deliver(inner: &Arc<Inner>, port: usize, message: &[u8]) -> LibResult<()> {
    let sink = inner.midi_sink(port)?;
    sink.send(message).map_err(|e| {
        crate::error::OutputDeviceSnafu {
            site: site!(),
            description: e.to_string(),
        }
        .build()
    })
}
