/*!
The variable-length quantities described by the MIDI file spec: a big-endian
base-128 encoding where the high bit of each byte signals continuation. The
largest number which can be represented is `0x0FFFFFFF`, i.e. four bytes.
!*/

use snafu::Snafu;

/// The byte value at which the continuation bit is set.
pub(crate) const CONTINUE: u8 = 0b1000_0000;

#[derive(Debug, Snafu)]
pub(crate) enum VlqError {
    #[snafu(display("the continuation bit of the last byte is set"))]
    IncompleteNumber,

    #[snafu(display("the number is larger than four bytes"))]
    Overflow,
}

/// Decode a complete variable-length quantity. The last byte, and only the
/// last byte, must have the continuation bit clear.
pub(crate) fn decode_slice(bytes: &[u8]) -> std::result::Result<u32, VlqError> {
    let mut value: u32 = 0;
    for (index, &byte) in bytes.iter().enumerate() {
        if index >= 4 {
            return Err(VlqError::Overflow);
        }
        value = value << 7 | u32::from(byte & !CONTINUE);
        if byte & CONTINUE == 0 {
            return Ok(value);
        }
    }
    Err(VlqError::IncompleteNumber)
}

/// Encode a value as a variable-length quantity. Values above `0x0FFFFFFF`
/// are truncated to the low 28 bits.
#[allow(dead_code)]
pub(crate) fn encode_u32(value: u32) -> Vec<u8> {
    let value = value & 0x0fff_ffff;
    let mut bytes = vec![(value & 0x7f) as u8];
    let mut remaining = value >> 7;
    while remaining > 0 {
        bytes.push((remaining & 0x7f) as u8 | CONTINUE);
        remaining >>= 7;
    }
    bytes.reverse();
    bytes
}
