#![allow(dead_code)]

use log::LevelFilter;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;

static LOGGER: Once = Once::new();

pub fn enable_logging() {
    LOGGER.call_once(logger_init)
}

fn logger_init() {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} {} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Warn)
        .init();
}

pub fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let mut f = std::fs::File::create(&path).expect("create fixture file");
    f.write_all(bytes).expect("write fixture file");
    path
}

// ---------------------------------------------------------------------
// SMF fixture building
// ---------------------------------------------------------------------

pub const END_OF_TRACK: &[u8] = &[0xff, 0x2f, 0x00];

/// Variable-length quantity encoding for delta times.
pub fn vlq(value: u32) -> Vec<u8> {
    let value = value & 0x0fff_ffff;
    let mut bytes = vec![(value & 0x7f) as u8];
    let mut remaining = value >> 7;
    while remaining > 0 {
        bytes.push((remaining & 0x7f) as u8 | 0x80);
        remaining >>= 7;
    }
    bytes.reverse();
    bytes
}

pub fn track_chunk(body: &[u8]) -> Vec<u8> {
    let mut chunk = b"MTrk".to_vec();
    chunk.extend_from_slice(&(body.len() as u32).to_be_bytes());
    chunk.extend_from_slice(body);
    chunk
}

pub fn smf_bytes(format: u16, division: u16, tracks: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = b"MThd\x00\x00\x00\x06".to_vec();
    bytes.extend_from_slice(&format.to_be_bytes());
    bytes.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
    bytes.extend_from_slice(&division.to_be_bytes());
    for track in tracks {
        bytes.extend_from_slice(track);
    }
    bytes
}

/// Wrap an SMF image the way media players do: `RIFF (RMID (data ...))`.
pub fn rmid_bytes(inner: &[u8]) -> Vec<u8> {
    let mut wrapped = b"RIFF".to_vec();
    wrapped.extend_from_slice(&((4 + 8 + inner.len()) as u32).to_le_bytes());
    wrapped.extend_from_slice(b"RMID");
    wrapped.extend_from_slice(b"data");
    wrapped.extend_from_slice(&(inner.len() as u32).to_le_bytes());
    wrapped.extend_from_slice(inner);
    wrapped
}

// ---------------------------------------------------------------------
// WAV fixture building
// ---------------------------------------------------------------------

pub fn riff_chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut bytes = id.to_vec();
    bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
    bytes.extend_from_slice(body);
    if body.len() & 1 == 1 {
        bytes.push(0);
    }
    bytes
}

pub fn fmt_chunk(channels: u16, sample_rate: u32, bits: u16) -> Vec<u8> {
    let block_align = channels * bits / 8;
    let mut body = Vec::new();
    body.extend_from_slice(&1u16.to_le_bytes());
    body.extend_from_slice(&channels.to_le_bytes());
    body.extend_from_slice(&sample_rate.to_le_bytes());
    body.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    body.extend_from_slice(&block_align.to_le_bytes());
    body.extend_from_slice(&bits.to_le_bytes());
    riff_chunk(b"fmt ", &body)
}

pub fn wave_bytes(chunks: &[Vec<u8>]) -> Vec<u8> {
    let body_len: usize = chunks.iter().map(Vec::len).sum();
    let mut bytes = b"RIFF".to_vec();
    bytes.extend_from_slice(&((body_len + 4) as u32).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    for c in chunks {
        bytes.extend_from_slice(c);
    }
    bytes
}
