// Value Codec (spec.md §4.1).
//
// Serializes an integer into 1/2/4 little-endian bytes using the same
// low-word/high-word split primitives the vendor SDK exposes
// (LOBYTE(LOWORD), HIBYTE(LOWORD), LOBYTE(HIWORD), HIBYTE(HIWORD)), so the
// byte order matches exactly what a real GroupSyncWrite would serialize.
// Deserialization (the reverse) lives on the transport side, next to
// `get_data`, since it also has to know whether to reinterpret as signed.

use crate::error::{BusError, Result};

#[inline]
fn loword(value: u32) -> u16 {
    (value & 0xFFFF) as u16
}

#[inline]
fn hiword(value: u32) -> u16 {
    ((value >> 16) & 0xFFFF) as u16
}

#[inline]
fn lobyte(word: u16) -> u8 {
    (word & 0xFF) as u8
}

#[inline]
fn hibyte(word: u16) -> u8 {
    ((word >> 8) & 0xFF) as u8
}

/// Width of a control-table entry, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    One,
    Two,
    Four,
}

impl Width {
    pub fn from_bytes(n: u8) -> Result<Self> {
        match n {
            1 => Ok(Width::One),
            2 => Ok(Width::Two),
            4 => Ok(Width::Four),
            width => Err(BusError::UnsupportedWidth { width }),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Four => 4,
        }
    }
}

/// Serialize a 32-bit value into `width` little-endian wire bytes.
///
/// `value` is taken as its bit pattern (no range checking) since the caller
/// has already rounded and cast to i32 during `revert_calibration`.
pub fn to_wire_bytes(value: i32, width: Width) -> Vec<u8> {
    let raw = value as u32;
    match width {
        Width::One => vec![lobyte(loword(raw))],
        Width::Two => vec![lobyte(loword(raw)), hibyte(loword(raw))],
        Width::Four => vec![
            lobyte(loword(raw)),
            hibyte(loword(raw)),
            lobyte(hiword(raw)),
            hibyte(hiword(raw)),
        ],
    }
}

/// Deserialize `width` little-endian wire bytes into an unsigned value,
/// the counterpart of the transport's `getData`.
pub fn from_wire_bytes(bytes: &[u8], width: Width) -> u32 {
    match width {
        Width::One => bytes[0] as u32,
        Width::Two => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
        Width::Four => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}
