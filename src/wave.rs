/*!
WAV playback for the PCM workers: parse the RIFF/WAVE header, open a driver
stream with the file's parameters, and push the `data` chunk frames through
it in fixed-size buffers. Only integer PCM at 8, 16, 24 or 32 bits is
played. Unknown chunks are skipped (odd lengths padded to even), and a
failing write gets exactly one recovery attempt before the playback is
abandoned.
!*/

use crate::backend::{Backend, WaveSink, WaveSpec};
use crate::byte_iter::{ByteError, ByteIter};
use crate::constants::{TAG_RIFF_DATA, TAG_WAVE_FMT, WAVE_BUF};
use crate::error::{LibError, LibResult};
use log::{debug, warn};
use snafu::IntoError;
use std::io::Read;

/// Stream the file at `path` to a fresh driver stream on `port`. Returns
/// after the last data chunk has been handed to the driver.
pub(crate) fn play(backend: &dyn Backend, port: usize, path: &str) -> LibResult<()> {
    let mut iter = ByteIter::new_file(path).map_err(open_fail)?;
    iter.expect_tag("RIFF").map_err(byte_fail)?;
    iter.read_u32_le().map_err(byte_fail)?;
    iter.expect_tag("WAVE").map_err(byte_fail)?;

    let mut sink: Option<Box<dyn WaveSink>> = None;
    let mut spec: Option<WaveSpec> = None;
    while let Some((id, length)) = read_chunk_header(&mut iter)? {
        if &id == TAG_WAVE_FMT {
            if spec.is_some() {
                invalid_file!("more than one fmt chunk");
            }
            let parsed = read_format(&mut iter, length)?;
            debug!(
                "'{}': {} channel(s), {} Hz, {} bit(s)",
                path, parsed.channels, parsed.sample_rate, parsed.bits
            );
            let stream = backend.open_wave_out(port, &parsed).map_err(|e| {
                crate::error::OutputDeviceSnafu {
                    site: site!(),
                    description: e.to_string(),
                }
                .build()
            })?;
            sink = Some(stream);
            spec = Some(parsed);
        } else if &id == TAG_RIFF_DATA {
            match (sink.as_mut(), spec) {
                (Some(stream), Some(parsed)) => {
                    stream_data(&mut iter, stream.as_mut(), &parsed, length)?
                }
                _ => invalid_file!("data chunk before the fmt chunk"),
            }
            skip_pad(&mut iter, length)?;
        } else {
            // skip unrecognized chunk
            iter.skip(u64::from(length)).map_err(byte_fail)?;
            skip_pad(&mut iter, length)?;
        }
    }
    if spec.is_none() {
        invalid_file!("no fmt chunk");
    }
    Ok(())
}

/// The next `(id, length)` pair, or `None` at a clean end of file.
fn read_chunk_header<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Option<([u8; 4], u32)>> {
    let first = match iter.read().map_err(byte_fail)? {
        Some(byte) => byte,
        None => return Ok(None),
    };
    let id = [
        first,
        iter.read_or_die().map_err(byte_fail)?,
        iter.read_or_die().map_err(byte_fail)?,
        iter.read_or_die().map_err(byte_fail)?,
    ];
    let length = iter.read_u32_le().map_err(byte_fail)?;
    Ok(Some((id, length)))
}

fn read_format<R: Read>(iter: &mut ByteIter<R>, length: u32) -> LibResult<WaveSpec> {
    if length < 16 {
        invalid_file!("fmt chunk length is {}", length);
    }
    let format_tag = iter.read_u16_le().map_err(byte_fail)?;
    // 1 is integer PCM
    if format_tag != 1 {
        invalid_file!("cannot play format tag {}", format_tag);
    }
    let channels = iter.read_u16_le().map_err(byte_fail)?;
    if channels == 0 {
        invalid_file!("zero channels");
    }
    let sample_rate = iter.read_u32_le().map_err(byte_fail)?;
    if sample_rate == 0 {
        invalid_file!("zero sample rate");
    }
    iter.read_u32_le().map_err(byte_fail)?; // byte rate, derived
    let block_align = iter.read_u16_le().map_err(byte_fail)?;
    if block_align == 0 {
        invalid_file!("zero block align");
    }
    let bits = iter.read_u16_le().map_err(byte_fail)?;
    match bits {
        8 | 16 | 24 | 32 => {}
        other => invalid_file!("cannot play {} bit samples", other),
    }
    // tolerate the extension bytes some writers add
    iter.skip(u64::from(length) - 16).map_err(byte_fail)?;
    skip_pad(iter, length)?;
    Ok(WaveSpec {
        channels,
        sample_rate,
        bits,
        block_align,
    })
}

/// Transfer one data chunk in buffers of at most [`WAVE_BUF`] bytes, always
/// a whole number of frames.
fn stream_data<R: Read>(
    iter: &mut ByteIter<R>,
    sink: &mut dyn WaveSink,
    spec: &WaveSpec,
    length: u32,
) -> LibResult<()> {
    let frame = usize::from(spec.block_align);
    let buffer_frames = (WAVE_BUF / frame).max(1);
    let mut buffer = vec![0u8; buffer_frames * frame];
    let mut remaining = length as usize;
    while remaining > 0 {
        let whole_frames = remaining / frame;
        if whole_frames == 0 {
            warn!("data chunk ends with a partial frame of {} byte(s)", remaining);
            iter.skip(remaining as u64).map_err(byte_fail)?;
            break;
        }
        let transfer = whole_frames.min(buffer_frames) * frame;
        let got = iter.read_into(&mut buffer[..transfer]).map_err(byte_fail)?;
        if got != transfer {
            invalid_file!("the data chunk is truncated");
        }
        write_with_recovery(sink, &buffer[..transfer])?;
        remaining -= transfer;
    }
    Ok(())
}

fn write_with_recovery(sink: &mut dyn WaveSink, frames: &[u8]) -> LibResult<()> {
    if let Err(first) = sink.write_frames(frames) {
        warn!("wave write failed ({}), attempting recovery", first);
        let retried = sink.recover().and_then(|_| sink.write_frames(frames));
        if let Err(second) = retried {
            return crate::error::OutputDeviceSnafu {
                site: site!(),
                description: second.to_string(),
            }
            .fail();
        }
    }
    Ok(())
}

/// RIFF chunks are word aligned; an odd-length chunk is followed by one pad
/// byte, except possibly at the very end of the file.
fn skip_pad<R: Read>(iter: &mut ByteIter<R>, length: u32) -> LibResult<()> {
    if length & 1 == 1 {
        iter.read().map_err(byte_fail)?;
    }
    Ok(())
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
