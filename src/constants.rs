/*!
Wire-MIDI status bytes, controller numbers and file-format constants used
throughout the crate. Controller names follow the 1987 MIDI spec; see
<http://www.music.mcgill.ca/~ich/classes/mumt306/StandardMIDIfileformat.html>.
!*/

// status byte high nibbles, channel 0-15 is or'ed into the low nibble
pub(crate) const MESS_NOTE_OFF: u8 = 0x80;
pub(crate) const MESS_NOTE_ON: u8 = 0x90;
pub(crate) const MESS_AFTERTOUCH: u8 = 0xa0;
pub(crate) const MESS_CTRL_CHG: u8 = 0xb0;
pub(crate) const MESS_PGM_CHG: u8 = 0xc0;
pub(crate) const MESS_CHN_PRES: u8 = 0xd0;
pub(crate) const MESS_PTCH_WHL: u8 = 0xe0;

// controller numbers
pub(crate) const CTLR_MODULATION_WHEEL_COARSE: u8 = 1;
pub(crate) const CTLR_PORTAMENTO_TIME_COARSE: u8 = 5;
pub(crate) const CTLR_DATA_ENTRY_COARSE: u8 = 6;
pub(crate) const CTLR_VOLUME_COARSE: u8 = 7;
pub(crate) const CTLR_BALANCE_COARSE: u8 = 8;
pub(crate) const CTLR_PAN_POSITION_COARSE: u8 = 10;
pub(crate) const CTLR_MODULATION_WHEEL_FINE: u8 = 33;
pub(crate) const CTLR_PORTAMENTO_TIME_FINE: u8 = 37;
pub(crate) const CTLR_DATA_ENTRY_FINE: u8 = 38;
pub(crate) const CTLR_VOLUME_FINE: u8 = 39;
pub(crate) const CTLR_BALANCE_FINE: u8 = 40;
pub(crate) const CTLR_PAN_POSITION_FINE: u8 = 42;
pub(crate) const CTLR_PORTAMENTO: u8 = 65;
pub(crate) const CTLR_LEGATO_PEDAL: u8 = 68;
pub(crate) const CTLR_SOUND_TIMBRE: u8 = 71;
pub(crate) const CTLR_SOUND_RELEASE_TIME: u8 = 72;
pub(crate) const CTLR_SOUND_ATTACK_TIME: u8 = 73;
pub(crate) const CTLR_SOUND_BRIGHTNESS: u8 = 74;
pub(crate) const CTLR_EFFECTS_LEVEL: u8 = 91;
pub(crate) const CTLR_TREMULO_LEVEL: u8 = 92;
pub(crate) const CTLR_CHORUS_LEVEL: u8 = 93;
pub(crate) const CTLR_CELESTE_LEVEL: u8 = 94;
pub(crate) const CTLR_PHASER_LEVEL: u8 = 95;
pub(crate) const CTLR_REGISTERED_PARAMETER_FINE: u8 = 100;
pub(crate) const CTLR_REGISTERED_PARAMETER_COARSE: u8 = 101;
pub(crate) const CTLR_MONO_OPERATION: u8 = 126;
pub(crate) const CTLR_POLY_OPERATION: u8 = 127;

// SMF meta event ids
pub(crate) const META_END_OF_TRACK: u8 = 0x2f;
pub(crate) const META_SET_TEMPO: u8 = 0x51;
pub(crate) const FILE_SYSEX_F0: u8 = 0xf0;
pub(crate) const FILE_SYSEX_F7: u8 = 0xf7;
pub(crate) const FILE_META_EVENT: u8 = 0xff;

// chunk tags
pub(crate) const TAG_SMF_HEADER: &[u8; 4] = b"MThd";
pub(crate) const TAG_SMF_TRACK: &[u8; 4] = b"MTrk";
pub(crate) const TAG_RIFF: &[u8; 4] = b"RIFF";
pub(crate) const TAG_RMID: &[u8; 4] = b"RMID";
pub(crate) const TAG_RIFF_DATA: &[u8; 4] = b"data";
pub(crate) const TAG_WAVE_FMT: &[u8; 4] = b"fmt ";

/// Logical ports per device class. Ports are 1-based.
pub const MAX_PORTS: usize = 100;
/// Synth track slots addressable by [`crate::Sequencer::load_synth`].
pub const MAX_SYNTH_TRACKS: usize = 100;
/// Wave track slots addressable by [`crate::Sequencer::load_wave`].
pub const MAX_WAVE_TRACKS: usize = 100;

/// Default quarter note time in 100 microsecond units (120 bpm) used until an
/// SMF set-tempo event is seen.
pub(crate) const DEFAULT_QUARTER_TICKS: i64 = 5000;

/// The port stamped on decoded track events. It is overwritten with the
/// caller's port at play time.
pub(crate) const DECODE_PORT: usize = 1;

/// Size of the transfer buffer used when streaming PCM frames.
pub(crate) const WAVE_BUF: usize = 16 * 1024;
