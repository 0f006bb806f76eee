//! Little-endian field access shared by every fixed layout

use crate::error::WireError;

/// Types with a fixed, bit-exact wire layout
///
/// Implementors are the records that may travel as a
/// [`Payload::FixedRecord`](crate::Payload::FixedRecord): pulses, message
/// headers and stat records.
pub trait WireRecord: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Appends the encoded record to `out`
    fn write_to(&self, out: &mut Vec<u8>);

    /// Decodes a record from the front of `bytes`
    fn read_from(bytes: &[u8]) -> Result<Self, WireError>;

    /// Encodes the record into a fresh buffer
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        self.write_to(&mut out);
        out
    }
}

pub(crate) fn require(bytes: &[u8], needed: usize) -> Result<(), WireError> {
    if bytes.len() < needed {
        return Err(WireError::Truncated {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

pub(crate) fn u8_at(bytes: &[u8], at: usize) -> u8 {
    bytes[at]
}

pub(crate) fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

pub(crate) fn i16_at(bytes: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([bytes[at], bytes[at + 1]])
}

pub(crate) fn u32_at(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

pub(crate) fn i32_at(bytes: &[u8], at: usize) -> i32 {
    u32_at(bytes, at) as i32
}

pub(crate) fn u64_at(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}

pub(crate) fn i64_at(bytes: &[u8], at: usize) -> i64 {
    u64_at(bytes, at) as i64
}
