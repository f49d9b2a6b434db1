mod utils;

use sound_sequencer::{CaptureBackend, ErrorKind, Sequencer};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use utils::{
    enable_logging, rmid_bytes, smf_bytes, track_chunk, vlq, write_file, END_OF_TRACK,
};

fn sequencer() -> (Sequencer, Arc<CaptureBackend>) {
    enable_logging();
    let backend = Arc::new(CaptureBackend::new(1, 0));
    let seq = Sequencer::new(Box::new(Arc::clone(&backend))).expect("sequencer start");
    (seq, backend)
}

/// Replaying a loaded file produces the file's wire messages in time
/// order, preserving the inter-event gaps.
#[test]
fn load_and_replay_keeps_order_and_deltas() {
    let (seq, backend) = sequencer();
    seq.open_synth_out(1).unwrap();
    // division 500, default tempo: one delta unit is 10 ticks (1ms)
    let mut body = Vec::new();
    body.extend(vlq(0));
    body.extend_from_slice(&[0xc0, 0x05]); // program 6
    body.extend(vlq(0));
    body.extend_from_slice(&[0x90, 59, 0x7f]);
    body.extend(vlq(100)); // 100ms later
    body.extend_from_slice(&[0x80, 59, 0x00]);
    body.extend(vlq(50)); // 50ms later
    body.extend_from_slice(&[0x91, 40, 0x40]);
    body.extend(vlq(0));
    body.extend_from_slice(END_OF_TRACK);
    let bytes = smf_bytes(0, 500, &[track_chunk(&body)]);
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "song.mid", &bytes);

    seq.load_synth(1, &path).unwrap();
    seq.play_synth(1, 0, 1).unwrap();
    thread::sleep(Duration::from_millis(30));
    seq.wait_synth(1).unwrap();

    let messages = backend.midi_messages(1);
    let bytes: Vec<Vec<u8>> = messages.iter().map(|m| m.bytes.clone()).collect();
    assert_eq!(
        vec![
            vec![0xc0, 0x05],
            vec![0x90, 59, 0x7f],
            vec![0x80, 59, 0x00],
            vec![0x91, 40, 0x40],
        ],
        bytes
    );
    // inter-event deltas survive the trip within scheduling tolerance
    let gap_one = messages[2].at.duration_since(messages[1].at);
    let gap_two = messages[3].at.duration_since(messages[2].at);
    assert!(gap_one >= Duration::from_millis(90), "{:?}", gap_one);
    assert!(gap_one < Duration::from_millis(400), "{:?}", gap_one);
    assert!(gap_two >= Duration::from_millis(40), "{:?}", gap_two);
    assert!(gap_two < Duration::from_millis(300), "{:?}", gap_two);
}

/// Tempo changes stretch the deltas that follow them.
#[test]
fn replay_honors_tempo_changes() {
    let (seq, backend) = sequencer();
    seq.open_synth_out(1).unwrap();
    // division 100: a delta unit is 5ms until the tempo change makes it
    // 1ms
    let mut body = Vec::new();
    body.extend(vlq(0));
    body.extend_from_slice(&[0x90, 10, 0x7f]);
    body.extend(vlq(10)); // 50ms
    body.extend_from_slice(&[0x80, 10, 0x00]);
    body.extend(vlq(0));
    body.extend_from_slice(&[0xff, 0x51, 0x03, 0x01, 0x86, 0xa0]); // 100ms per quarter
    body.extend(vlq(50)); // 50ms under the new tempo
    body.extend_from_slice(&[0x90, 11, 0x7f]);
    body.extend(vlq(0));
    body.extend_from_slice(END_OF_TRACK);
    let bytes = smf_bytes(0, 100, &[track_chunk(&body)]);
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "tempo.mid", &bytes);

    seq.load_synth(2, &path).unwrap();
    seq.play_synth(1, 0, 2).unwrap();
    thread::sleep(Duration::from_millis(30));
    seq.wait_synth(1).unwrap();

    let messages = backend.midi_messages(1);
    assert_eq!(3, messages.len());
    let gap = messages[2].at.duration_since(messages[1].at);
    assert!(gap >= Duration::from_millis(40), "{:?}", gap);
    assert!(gap < Duration::from_millis(300), "{:?}", gap);
}

/// A RIFF-wrapped SMF loads like a bare one.
#[test]
fn rmid_wrapper_is_accepted() {
    let (seq, backend) = sequencer();
    seq.open_synth_out(1).unwrap();
    let mut body = Vec::new();
    body.extend(vlq(0));
    body.extend_from_slice(&[0x90, 59, 0x7f]);
    body.extend(vlq(0));
    body.extend_from_slice(END_OF_TRACK);
    let inner = smf_bytes(0, 480, &[track_chunk(&body)]);
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "wrapped.rmi", &rmid_bytes(&inner));

    seq.load_synth(5, &path).unwrap();
    seq.play_synth(1, 0, 5).unwrap();
    thread::sleep(Duration::from_millis(30));
    seq.wait_synth(1).unwrap();
    assert_eq!(vec![0x90, 59, 0x7f], backend.midi_bytes(1));
}

/// The wrapper must still contain an SMF.
#[test]
fn rmid_without_inner_header_is_invalid() {
    let (seq, _backend) = sequencer();
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "hollow.rmi", &rmid_bytes(b"niht\x00\x00\x00\x06"));
    assert_eq!(
        ErrorKind::InvalidFile,
        seq.load_synth(5, &path).err().unwrap().kind()
    );
}

#[test]
fn smpte_files_are_rejected() {
    let (seq, _backend) = sequencer();
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "smpte.mid", &smf_bytes(0, 0xe728, &[]));
    assert_eq!(
        ErrorKind::InvalidFile,
        seq.load_synth(1, &path).err().unwrap().kind()
    );
}

#[test]
fn missing_file_is_an_io_error() {
    let (seq, _backend) = sequencer();
    assert_eq!(
        ErrorKind::Io,
        seq.load_synth(1, "no/such/file.mid").err().unwrap().kind()
    );
}

/// Two tracks interleave by time with ties to the earlier track.
#[test]
fn format_one_tracks_interleave() {
    let (seq, backend) = sequencer();
    seq.open_synth_out(1).unwrap();
    let mut first = Vec::new();
    first.extend(vlq(0));
    first.extend_from_slice(&[0xc0, 0]);
    first.extend(vlq(20));
    first.extend_from_slice(&[0xc0, 2]);
    first.extend(vlq(0));
    first.extend_from_slice(END_OF_TRACK);
    let mut second = Vec::new();
    second.extend(vlq(0));
    second.extend_from_slice(&[0xc1, 1]);
    second.extend(vlq(30));
    second.extend_from_slice(&[0xc1, 3]);
    second.extend(vlq(0));
    second.extend_from_slice(END_OF_TRACK);
    let bytes = smf_bytes(1, 500, &[track_chunk(&first), track_chunk(&second)]);
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "two.mid", &bytes);

    seq.load_synth(9, &path).unwrap();
    seq.play_synth(1, 0, 9).unwrap();
    thread::sleep(Duration::from_millis(30));
    seq.wait_synth(1).unwrap();
    assert_eq!(
        vec![0xc0, 0, 0xc1, 1, 0xc0, 2, 0xc1, 3],
        backend.midi_bytes(1)
    );
}
