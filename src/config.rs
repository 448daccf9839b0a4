// Wire-level constants for the SCS/STS Feetech protocol.
// Mirrors the constants module of the vendor SDK (PROTOCOL_VERSION, BAUDRATE,
// TIMEOUT_MS, the baudrate code table) rather than anything runtime-configurable.

use std::time::Duration;

/// Protocol version used by the packet handler. SCS-series motors speak protocol 0.
pub const PROTOCOL_VERSION: u8 = 0;

/// Canonical bus baudrate once motors are configured.
pub const BAUDRATE: u32 = 1_000_000;

/// Packet round-trip timeout applied at connect.
pub const TIMEOUT_MS: u64 = 1_000;
pub const TIMEOUT: Duration = Duration::from_millis(TIMEOUT_MS);

/// Highest motor ID scanned during bus configuration (exclusive upper bound).
pub const MAX_ID_RANGE: u8 = 252;

/// Nominal/hard joint ranges, shared by the calibration engine.
pub const LOWER_BOUND_DEGREE: f32 = -270.0;
pub const UPPER_BOUND_DEGREE: f32 = 270.0;
pub const LOWER_BOUND_LINEAR: f32 = -10.0;
pub const UPPER_BOUND_LINEAR: f32 = 110.0;
pub const HALF_TURN_DEGREE: f32 = 180.0;

/// Retry budgets.
pub const NUM_READ_RETRY: u32 = 10;
pub const NUM_WRITE_RETRY: u32 = 10;

/// Baudrate code -> bps, shared by every SCS-series model.
pub const SCS_SERIES_BAUDRATE_TABLE: &[(u8, u32)] = &[
    (0, 1_000_000),
    (1, 500_000),
    (2, 250_000),
    (3, 128_000),
    (4, 115_200),
    (5, 57_600),
    (6, 38_400),
    (7, 19_200),
];

/// Registers whose raw reading must be reinterpreted as signed int32 and,
/// when a calibration is installed, passed through the calibration engine.
pub const CALIBRATION_REQUIRED: &[&str] = &["Goal_Position", "Present_Position"];

pub fn baudrate_code_for(bps: u32) -> Option<u8> {
    SCS_SERIES_BAUDRATE_TABLE
        .iter()
        .find(|(_, rate)| *rate == bps)
        .map(|(code, _)| *code)
}

pub fn bps_for_code(code: u8) -> Option<u32> {
    SCS_SERIES_BAUDRATE_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, rate)| *rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baudrate_table_round_trips() {
        assert_eq!(baudrate_code_for(1_000_000), Some(0));
        assert_eq!(bps_for_code(0), Some(1_000_000));
        assert_eq!(bps_for_code(7), Some(19_200));
        assert_eq!(baudrate_code_for(42), None);
    }
}
