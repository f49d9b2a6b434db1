/*!
Decoding of Standard MIDI Files (and RIFF-wrapped `RMID` files) into the
time-sorted event list a synth track slot caches. Only the messages the
sequencer can replay are kept; the rest are consumed and dropped. Times are
converted from delta ticks to absolute 100 microsecond ticks while reading,
using the division from the header and the running tempo, so the cached
list needs no further timing context at play time.

References:
<https://www.music.mcgill.ca/~gary/306/week9/smf.html>
<http://www.somascape.org/midi/tech/mfile.html>
!*/

use crate::byte_iter::{ByteError, ByteIter};
use crate::clock::Ticks;
use crate::constants::*;
use crate::error::{LibError, LibResult};
use crate::event::{EventKind, SeqEvent};
use log::{debug, trace, warn};
use snafu::IntoError;
use std::io::Read;
use std::path::Path;

/// Decode a file into a single list sorted by ascending time. The `port`
/// on every record is a placeholder, overwritten at play time.
pub(crate) fn load_file<P: AsRef<Path>>(path: P) -> LibResult<Vec<SeqEvent>> {
    let path = path.as_ref();
    debug!("loading SMF '{}'", path.display());
    let iter = ByteIter::new_file(path).map_err(open_fail)?;
    read_inner(iter)
}

fn read_inner<R: Read>(mut iter: ByteIter<R>) -> LibResult<Vec<SeqEvent>> {
    let mut tag = iter.read4().map_err(byte_fail)?;
    if &tag == TAG_RIFF {
        // A RIFF file can wrap a MIDI file; the SMF image lives in the
        // 'data' chunk of an RMID form.
        iter.read_u32_le().map_err(byte_fail)?;
        let form = iter.read4().map_err(byte_fail)?;
        if &form != TAG_RMID {
            invalid_file!("RIFF form is not RMID");
        }
        loop {
            let id = iter.read4().map_err(byte_fail)?;
            let length = iter.read_u32_le().map_err(byte_fail)?;
            if &id == TAG_RIFF_DATA {
                break;
            }
            // chunks are padded to even length
            iter.skip(u64::from(length) + u64::from(length & 1))
                .map_err(byte_fail)?;
        }
        tag = iter.read4().map_err(byte_fail)?;
    }
    if &tag != TAG_SMF_HEADER {
        invalid_file!("the header chunk is missing");
    }
    let header_length = iter.read_u32().map_err(byte_fail)?;
    // header chunk length is always 6
    if header_length != 6 {
        invalid_file!("header chunk length is {} instead of 6", header_length);
    }
    let format = iter.read_u16().map_err(byte_fail)?;
    if format > 1 {
        invalid_file!("unsupported SMF format {}", format);
    }
    let ntracks = iter.read_u16().map_err(byte_fail)?;
    let division = iter.read_u16().map_err(byte_fail)?;
    if division & 0x8000 != 0 {
        invalid_file!("SMPTE framing is not supported");
    }
    if division == 0 {
        invalid_file!("the division is zero");
    }
    debug!(
        "SMF format {}, {} track chunk(s), {} ticks per quarter",
        format, ntracks, division
    );

    let mut master: Vec<SeqEvent> = Vec::new();
    // like the timing, the tempo carries across chunk boundaries in decode
    // order rather than being applied as a by-time tempo map
    let mut quarter_ticks: i64 = DEFAULT_QUARTER_TICKS;
    for number in 0..ntracks {
        if iter.is_end() {
            warn!("file ended after {} of {} tracks", number, ntracks);
            break;
        }
        let id = iter.read4().map_err(byte_fail)?;
        let length = iter.read_u32().map_err(byte_fail)?;
        if &id != TAG_SMF_TRACK {
            trace!("skipping unknown chunk in SMF body");
            iter.skip(u64::from(length)).map_err(byte_fail)?;
            continue;
        }
        let track = read_track(&mut iter, u64::from(length), division, &mut quarter_ticks)?;
        trace!("track {} produced {} event(s)", number, track.len());
        master = merge_tracks(master, track);
    }
    debug!("decoded {} event(s)", master.len());
    Ok(master)
}

fn read_track<R: Read>(
    iter: &mut ByteIter<R>,
    length: u64,
    division: u16,
    quarter_ticks: &mut i64,
) -> LibResult<Vec<SeqEvent>> {
    iter.set_size_limit(length);
    let mut events = Vec::new();
    let mut time: i64 = 0;
    let mut running_status: u8 = 0;
    let mut ended = false;
    while !ended && !iter.is_end() {
        let delta = iter.read_vlq_u32().map_err(byte_fail)?;
        time += i64::from(delta) * *quarter_ticks / i64::from(division);
        let status = match iter.peek() {
            Some(byte) if byte & 0x80 == 0 => {
                // running status, reuse the previous status byte
                if running_status == 0 {
                    invalid_file!("data byte {:#x} with no status to repeat", byte);
                }
                running_status
            }
            Some(_) => iter.read_or_die().map_err(byte_fail)?,
            None => invalid_file!("the track ended inside an event"),
        };
        if status < FILE_SYSEX_F0 {
            running_status = status;
        }
        if let Some(event) = decode_message(iter, status, clamp_time(time), quarter_ticks, &mut ended)? {
            events.push(event);
        }
    }
    if !ended {
        warn!("track ended without an end-of-track meta event");
    }
    // end-of-track may arrive before the chunk length is consumed
    while !iter.is_end() {
        iter.read_or_die().map_err(byte_fail)?;
    }
    iter.clear_size_limit();
    Ok(events)
}

/// Translate one message into an event record, or `None` for messages the
/// sequencer does not replay. Data bytes are consumed either way.
fn decode_message<R: Read>(
    iter: &mut ByteIter<R>,
    status: u8,
    time: Ticks,
    quarter_ticks: &mut i64,
    ended: &mut bool,
) -> LibResult<Option<SeqEvent>> {
    let channel = i32::from(status & 0x0f) + 1;
    let kind = match status >> 4 {
        0x8 => {
            let note = iter.read_or_die().map_err(byte_fail)?;
            let velocity = iter.read_or_die().map_err(byte_fail)?;
            Some(EventKind::NoteOff {
                channel,
                note: i32::from(note) + 1,
                velocity: upscale(velocity),
            })
        }
        0x9 => {
            let note = iter.read_or_die().map_err(byte_fail)?;
            let velocity = iter.read_or_die().map_err(byte_fail)?;
            Some(EventKind::NoteOn {
                channel,
                note: i32::from(note) + 1,
                velocity: upscale(velocity),
            })
        }
        0xa => {
            let note = iter.read_or_die().map_err(byte_fail)?;
            let velocity = iter.read_or_die().map_err(byte_fail)?;
            Some(EventKind::Aftertouch {
                channel,
                note: i32::from(note) + 1,
                velocity: upscale(velocity),
            })
        }
        0xb => {
            let controller = iter.read_or_die().map_err(byte_fail)?;
            let value = iter.read_or_die().map_err(byte_fail)?;
            match controller {
                CTLR_MONO_OPERATION => Some(EventKind::Mono {
                    channel,
                    value: i32::from(value),
                }),
                CTLR_POLY_OPERATION => Some(EventKind::Poly { channel }),
                other => {
                    // the executor reconstructs controller state from the
                    // semantic events, raw controller changes are dropped
                    trace!("controller change {} dropped", other);
                    None
                }
            }
        }
        0xc => {
            let program = iter.read_or_die().map_err(byte_fail)?;
            Some(EventKind::InstChange {
                channel,
                instrument: i32::from(program) + 1,
            })
        }
        0xd => {
            let pressure = iter.read_or_die().map_err(byte_fail)?;
            Some(EventKind::Pressure {
                channel,
                value: upscale(pressure),
            })
        }
        0xe => {
            let low = iter.read_or_die().map_err(byte_fail)?;
            let high = iter.read_or_die().map_err(byte_fail)?;
            let raw = i32::from(high) << 7 | i32::from(low);
            Some(EventKind::Pitch {
                channel,
                value: bend_value(raw),
            })
        }
        0xf => {
            decode_system(iter, status, quarter_ticks, ended)?;
            None
        }
        _ => invalid_file!("invalid status byte {:#x}", status),
    };
    Ok(kind.map(|kind| SeqEvent {
        port: DECODE_PORT,
        time,
        kind,
    }))
}

fn decode_system<R: Read>(
    iter: &mut ByteIter<R>,
    status: u8,
    quarter_ticks: &mut i64,
    ended: &mut bool,
) -> LibResult<()> {
    match status {
        FILE_SYSEX_F0 | FILE_SYSEX_F7 => {
            let length = iter.read_vlq_u32().map_err(byte_fail)?;
            iter.skip(u64::from(length)).map_err(byte_fail)?;
        }
        FILE_META_EVENT => {
            let meta_type = iter.read_or_die().map_err(byte_fail)?;
            let length = iter.read_vlq_u32().map_err(byte_fail)?;
            match meta_type {
                META_END_OF_TRACK => {
                    if length != 0 {
                        invalid_file!("end-of-track length is {} instead of 0", length);
                    }
                    *ended = true;
                }
                META_SET_TEMPO => {
                    if length != 3 {
                        invalid_file!("set-tempo length is {} instead of 3", length);
                    }
                    let bytes = iter.read_n(3).map_err(byte_fail)?;
                    let micros =
                        u32::from(bytes[0]) << 16 | u32::from(bytes[1]) << 8 | u32::from(bytes[2]);
                    // microseconds per quarter to 100us ticks per quarter
                    *quarter_ticks = i64::from(micros / 100).max(1);
                    trace!("tempo change, quarter note is now {} ticks", quarter_ticks);
                }
                other => {
                    trace!("meta event {:#x} skipped", other);
                    iter.skip(u64::from(length)).map_err(byte_fail)?;
                }
            }
        }
        other => invalid_file!("unexpected system status byte {:#x} in a track", other),
    }
    Ok(())
}

/// Stable two-way merge on time; on equal times the master (earlier
/// decoded track) comes first.
fn merge_tracks(master: Vec<SeqEvent>, track: Vec<SeqEvent>) -> Vec<SeqEvent> {
    if master.is_empty() {
        return track;
    }
    if track.is_empty() {
        return master;
    }
    let mut merged = Vec::with_capacity(master.len() + track.len());
    let mut master_iter = master.into_iter().peekable();
    let mut track_iter = track.into_iter().peekable();
    loop {
        let take_master = match (master_iter.peek(), track_iter.peek()) {
            (Some(m), Some(t)) => m.time <= t.time,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_master {
            master_iter.next()
        } else {
            track_iter.next()
        };
        if let Some(event) = next {
            merged.push(event);
        }
    }
    merged
}

/// Scale a 7-bit file value into the full API range.
fn upscale(value: u8) -> i32 {
    i32::from(value) * 0x0100_0000
}

/// A raw 14-bit pitch wheel value, center `0x2000`, into the signed API
/// range.
fn bend_value(raw: i32) -> i32 {
    let wide = (i64::from(raw) - 0x2000) * 0x0004_0000;
    wide.max(-i64::from(i32::MAX)).min(i64::from(i32::MAX)) as i32
}

fn clamp_time(time: i64) -> Ticks {
    time.min(i64::from(i32::MAX)) as Ticks
}

fn byte_fail(source: ByteError) -> LibError {
    invalid_file_e!("{}", source)
}

fn open_fail(source: ByteError) -> LibError {
    match source {
        e @ ByteError::FileOpen { .. } => crate::error::IoSnafu { site: site!() }.into_error(e),
        e => byte_fail(e),
    }
}
