mod utils;

use sound_sequencer::{CaptureBackend, ErrorKind, Sequencer};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use utils::{enable_logging, smf_bytes, track_chunk, vlq, write_file, END_OF_TRACK};

fn sequencer(midi_ports: usize, wave_ports: usize) -> (Sequencer, Arc<CaptureBackend>) {
    enable_logging();
    let backend = Arc::new(CaptureBackend::new(midi_ports, wave_ports));
    let seq = Sequencer::new(Box::new(Arc::clone(&backend))).expect("sequencer start");
    (seq, backend)
}

/// An immediate note executes on the calling thread, before the call
/// returns.
#[test]
fn immediate_note_round_trip() {
    let (seq, backend) = sequencer(1, 0);
    seq.open_synth_out(1).unwrap();
    seq.start_time();
    seq.note_on(1, 0, 1, 60, i32::MAX).unwrap();
    seq.note_off(1, 0, 1, 60, 0).unwrap();
    assert_eq!(
        vec![0x90, 0x3b, 0x7f, 0x80, 0x3b, 0x00],
        backend.midi_bytes(1)
    );
}

/// A sequenced note is silent until its time arrives, then lands close to
/// it.
#[test]
fn sequenced_note_fires_on_time() {
    let (seq, backend) = sequencer(1, 0);
    seq.open_synth_out(1).unwrap();
    seq.start_time();
    let started = Instant::now();
    // 3000 ticks is 300ms out
    seq.note_on(1, 3000, 1, 60, i32::MAX / 2).unwrap();
    thread::sleep(Duration::from_millis(100));
    assert!(backend.midi_bytes(1).is_empty(), "fired early");
    // the armed scheduler counts as a synth worker, so this returns when
    // the queue has drained
    seq.wait_synth(1).unwrap();
    let messages = backend.midi_messages(1);
    assert_eq!(1, messages.len());
    assert_eq!(vec![0x90, 0x3b, 0x3f], messages[0].bytes);
    let latency = messages[0].at.duration_since(started);
    assert!(latency >= Duration::from_millis(290), "{:?}", latency);
    assert!(latency < Duration::from_millis(1500), "{:?}", latency);
}

/// Two events with the same timestamp execute in submission order.
#[test]
fn equal_times_keep_submission_order() {
    let (seq, backend) = sequencer(1, 0);
    seq.open_synth_out(1).unwrap();
    seq.start_time();
    seq.instrument_change(1, 2000, 1, 1).unwrap();
    seq.instrument_change(1, 2000, 1, 2).unwrap();
    seq.wait_synth(1).unwrap();
    assert_eq!(vec![0xc0, 0x00, 0xc0, 0x01], backend.midi_bytes(1));
}

/// Distinct times come out strictly in time order, regardless of
/// submission order, and a wake drains everything that is due.
#[test]
fn sequenced_events_emit_in_time_order() {
    let (seq, backend) = sequencer(1, 0);
    seq.open_synth_out(1).unwrap();
    seq.start_time();
    // submit out of order, notes identify the expected order
    let times: &[(i32, i32)] = &[
        (1800, 9),
        (600, 3),
        (1200, 6),
        (200, 1),
        (1600, 8),
        (400, 2),
        (1400, 7),
        (800, 4),
        (2000, 10),
        (1000, 5),
    ];
    for &(time, note) in times {
        seq.note_on(1, time, 1, note, i32::MAX).unwrap();
    }
    seq.wait_synth(1).unwrap();
    let notes: Vec<u8> = backend
        .midi_messages(1)
        .iter()
        .map(|m| m.bytes[1] + 1)
        .collect();
    assert_eq!(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10], notes);
}

fn hundred_millisecond_track() -> Vec<u8> {
    // division 100 with the default tempo makes one delta unit 50 ticks
    // (5ms); ten events, one every 10ms
    let mut body = Vec::new();
    for note in 0..10u8 {
        body.extend(vlq(if note == 0 { 0 } else { 2 }));
        body.extend_from_slice(&[0x90, note, 0x7f]);
    }
    body.extend(vlq(0));
    body.extend_from_slice(END_OF_TRACK);
    smf_bytes(0, 100, &[track_chunk(&body)])
}

/// Three concurrent workers on one slot; waiting returns only after all of
/// them have finished.
#[test]
fn wait_synth_outlives_every_worker() {
    let (seq, backend) = sequencer(1, 0);
    seq.open_synth_out(1).unwrap();
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "track.mid", &hundred_millisecond_track());
    seq.load_synth(7, &path).unwrap();
    for _ in 0..3 {
        seq.play_synth(1, 0, 7).unwrap();
    }
    // give the workers time to register
    thread::sleep(Duration::from_millis(30));
    seq.wait_synth(1).unwrap();
    assert_eq!(30, backend.midi_messages(1).len());
    // nothing trickles in afterwards
    thread::sleep(Duration::from_millis(60));
    assert_eq!(30, backend.midi_messages(1).len());
}

/// Deleting a track blocks until its workers are done, then frees the
/// slot.
#[test]
fn delete_synth_waits_for_the_slot() {
    let (seq, backend) = sequencer(1, 0);
    seq.open_synth_out(1).unwrap();
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "track.mid", &hundred_millisecond_track());
    seq.load_synth(3, &path).unwrap();
    seq.play_synth(1, 0, 3).unwrap();
    thread::sleep(Duration::from_millis(30));
    let started = Instant::now();
    seq.delete_synth(3).unwrap();
    // the track runs for roughly 90ms and had about 60ms left
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(10, backend.midi_messages(1).len());
    // the slot is free again
    seq.load_synth(3, &path).unwrap();
}

#[test]
fn delete_synth_without_content_is_no_slot() {
    let (seq, _backend) = sequencer(1, 0);
    assert_eq!(
        ErrorKind::NoSlot,
        seq.delete_synth(9).err().unwrap().kind()
    );
}

#[test]
fn load_synth_twice_is_slot_in_use() {
    let (seq, _backend) = sequencer(1, 0);
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "track.mid", &hundred_millisecond_track());
    seq.load_synth(1, &path).unwrap();
    assert_eq!(
        ErrorKind::SlotInUse,
        seq.load_synth(1, &path).err().unwrap().kind()
    );
}

/// A stopped sequencer drops what was pending and rejects new sequenced
/// work, but immediate events still flow.
#[test]
fn stop_time_drops_pending_events() {
    let (seq, backend) = sequencer(1, 0);
    seq.open_synth_out(1).unwrap();
    seq.start_time();
    seq.note_on(1, 2000, 1, 60, i32::MAX).unwrap();
    seq.stop_time();
    thread::sleep(Duration::from_millis(300));
    assert!(backend.midi_bytes(1).is_empty());
    assert_eq!(
        ErrorKind::NotRunning,
        seq.note_on(1, 2000, 1, 60, 0).err().unwrap().kind()
    );
    seq.note_on(1, 0, 1, 60, 0).unwrap();
    assert_eq!(1, backend.midi_messages(1).len());
}

/// Past-due sequenced submissions execute inline on the caller.
#[test]
fn past_times_execute_immediately() {
    let (seq, backend) = sequencer(1, 0);
    seq.open_synth_out(1).unwrap();
    seq.start_time();
    thread::sleep(Duration::from_millis(20));
    // 10 ticks is 1ms, long past
    seq.note_on(1, 10, 1, 60, i32::MAX).unwrap();
    assert_eq!(1, backend.midi_messages(1).len());
}

/// The semantic controller expansions land as coarse/fine pairs.
#[test]
fn semantic_events_expand_to_controller_pairs() {
    let (seq, backend) = sequencer(1, 0);
    seq.open_synth_out(1).unwrap();
    seq.vibrato(1, 0, 2, i32::MAX).unwrap();
    seq.pitch(1, 0, 2, 0).unwrap();
    seq.pitch_range(1, 0, 2, 0x0200_0000).unwrap();
    assert_eq!(
        vec![
            0xb1, 1, 0x7f, // modulation coarse
            0xb1, 33, 0x7f, // modulation fine
            0xe1, 0x00, 0x40, // centered pitch, lsb then msb
            0xb1, 101, 0, // rpn coarse
            0xb1, 100, 0, // rpn fine
            0xb1, 6, 2, // data entry coarse
            0xb1, 38, 0, // data entry fine
        ],
        backend.midi_bytes(1)
    );
}

#[test]
fn current_time_tracks_the_epoch() {
    let (seq, _backend) = sequencer(1, 0);
    seq.start_time();
    let first = seq.current_time().unwrap();
    thread::sleep(Duration::from_millis(30));
    let second = seq.current_time().unwrap();
    assert!(second - first >= 250, "{} then {}", first, second);
}
