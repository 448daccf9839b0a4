// Calibration Engine (spec.md §4.6).
//
// Forward map (raw -> physical), inverse map (physical -> raw), and the
// whole-turn auto-correct heuristic. The parallel-array calibration record
// of the original Python is re-architected here as a tagged enum per motor
// (spec.md §9 Design Notes), indexed directly by motor name instead of
// through a `motor_names` / `calib_idx` indirection.

use std::collections::HashMap;

use tracing::warn;

use crate::config::{
    HALF_TURN_DEGREE, LOWER_BOUND_DEGREE, LOWER_BOUND_LINEAR, UPPER_BOUND_DEGREE,
    UPPER_BOUND_LINEAR,
};
use crate::error::{BusError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveMode {
    NonInverted,
    Inverted,
}

impl DriveMode {
    fn sign(self) -> f32 {
        match self {
            DriveMode::NonInverted => 1.0,
            DriveMode::Inverted => -1.0,
        }
    }
}

/// One motor's calibration. DEGREE joints carry a homing offset and drive
/// mode; LINEAR joints (prismatic, e.g. a gripper) carry a start/end range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationEntry {
    Degree {
        drive_mode: DriveMode,
        homing_offset: i32,
    },
    Linear {
        start_pos: i32,
        end_pos: i32,
    },
}

impl CalibrationEntry {
    pub fn degree(drive_mode: DriveMode, homing_offset: i32) -> Self {
        Self::Degree {
            drive_mode,
            homing_offset,
        }
    }

    /// `start_pos != end_pos` is a data-model invariant (spec.md §3).
    pub fn linear(start_pos: i32, end_pos: i32) -> Result<Self> {
        if start_pos == end_pos {
            return Err(BusError::CalibrationUnresolvable {
                motor: String::new(),
                reason: "start_pos must differ from end_pos for a LINEAR entry".to_string(),
            });
        }
        Ok(Self::Linear { start_pos, end_pos })
    }
}

/// Calibration for every motor whose position is read/written through the
/// bus, keyed by motor name. Installed on a bus with `set_calibration`.
#[derive(Debug, Clone, Default)]
pub struct CalibrationRecord {
    entries: HashMap<String, CalibrationEntry>,
}

impl CalibrationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, motor_name: impl Into<String>, entry: CalibrationEntry) -> Self {
        self.entries.insert(motor_name.into(), entry);
        self
    }

    pub fn entry(&self, motor_name: &str) -> Option<&CalibrationEntry> {
        self.entries.get(motor_name)
    }

    /// Forward map: raw encoder count -> physical value (degrees or percent).
    /// Raises `JointOutOfRange` if the hard bound is violated.
    pub fn apply(&self, motor_name: &str, resolution: u32, raw: i32) -> Result<f32> {
        let entry = self.require(motor_name)?;
        match entry {
            CalibrationEntry::Degree {
                drive_mode,
                homing_offset,
            } => {
                let half_turn = (resolution / 2) as f32;
                let v = (raw as f32) * drive_mode.sign() + homing_offset as f32;
                let degrees = v / half_turn * HALF_TURN_DEGREE;
                if degrees < LOWER_BOUND_DEGREE || degrees > UPPER_BOUND_DEGREE {
                    return Err(BusError::JointOutOfRange {
                        motor: motor_name.to_string(),
                        value: degrees,
                        lower: LOWER_BOUND_DEGREE,
                        upper: UPPER_BOUND_DEGREE,
                    });
                }
                Ok(degrees)
            }
            CalibrationEntry::Linear { start_pos, end_pos } => {
                let percent =
                    (raw - start_pos) as f32 / (end_pos - start_pos) as f32 * 100.0;
                if percent < LOWER_BOUND_LINEAR || percent > UPPER_BOUND_LINEAR {
                    return Err(BusError::JointOutOfRange {
                        motor: motor_name.to_string(),
                        value: percent,
                        lower: LOWER_BOUND_LINEAR,
                        upper: UPPER_BOUND_LINEAR,
                    });
                }
                Ok(percent)
            }
        }
    }

    /// Inverse map: physical value -> raw encoder count, rounded to the
    /// nearest step and cast to i32.
    pub fn revert(&self, motor_name: &str, resolution: u32, value: f32) -> Result<i32> {
        let entry = self.require(motor_name)?;
        let raw = match entry {
            CalibrationEntry::Degree {
                drive_mode,
                homing_offset,
            } => {
                let half_turn = (resolution / 2) as f32;
                let v = value / HALF_TURN_DEGREE * half_turn - homing_offset as f32;
                v * drive_mode.sign()
            }
            CalibrationEntry::Linear { start_pos, end_pos } => {
                value / 100.0 * (end_pos - start_pos) as f32 + *start_pos as f32
            }
        };
        Ok(raw.round() as i32)
    }

    /// Apply calibration, and on `JointOutOfRange`, attempt exactly one
    /// whole-turn auto-correct before re-raising (spec.md §4.6 / §9).
    pub fn apply_autocorrect(&mut self, motor_name: &str, resolution: u32, raw: i32) -> Result<f32> {
        match self.apply(motor_name, resolution, raw) {
            Ok(value) => Ok(value),
            Err(BusError::JointOutOfRange { .. }) => {
                self.autocorrect(motor_name, resolution, raw)?;
                self.apply(motor_name, resolution, raw)
            }
            Err(other) => Err(other),
        }
    }

    /// Whole-turn auto-correct: find an integer `factor` shifting the
    /// calibration by `resolution * factor` so the value lands back in the
    /// nominal (not just hard) bound, and mutate the stored entry in place.
    fn autocorrect(&mut self, motor_name: &str, resolution: u32, raw: i32) -> Result<()> {
        let entry = self.require(motor_name)?;
        match *entry {
            CalibrationEntry::Degree {
                drive_mode,
                homing_offset,
            } => {
                let v = (raw as f32) * drive_mode.sign();
                let half_turn = (resolution / 2) as f32;
                let res = resolution as f32;
                let low_factor = (-half_turn - v - homing_offset as f32) / res;
                let upp_factor = (half_turn - v - homing_offset as f32) / res;

                let factor = select_factor(low_factor, upp_factor).ok_or_else(|| {
                    BusError::CalibrationUnresolvable {
                        motor: motor_name.to_string(),
                        reason: format!(
                            "no integer turn count between bounds [{low_factor}, {upp_factor}]"
                        ),
                    }
                })?;

                let new_offset = homing_offset + (resolution as i32) * factor;
                warn!(
                    motor = motor_name,
                    shift_turns = factor.abs(),
                    "auto-correcting calibration by shifting homing_offset a whole turn"
                );
                self.entries.insert(
                    motor_name.to_string(),
                    CalibrationEntry::Degree {
                        drive_mode,
                        homing_offset: new_offset,
                    },
                );
                Ok(())
            }
            CalibrationEntry::Linear { .. } => {
                // Open question in spec.md §9: the original shifts
                // `homing_offset`, a field LINEAR entries don't have.
                // Treated as unresolvable until clarified upstream.
                Err(BusError::CalibrationUnresolvable {
                    motor: motor_name.to_string(),
                    reason: "LINEAR auto-correct is not specified".to_string(),
                })
            }
        }
    }

    fn require(&self, motor_name: &str) -> Result<&CalibrationEntry> {
        self.entries.get(motor_name).ok_or_else(|| BusError::UnknownControlEntry {
            register: "<calibration>".to_string(),
            model: motor_name.to_string(),
        })
    }
}

/// Pick the first integer in `[low, upp]` (or `[upp, low]` if the interval
/// came out reversed), matching the original's `ceil`-then-validate search.
fn select_factor(low_factor: f32, upp_factor: f32) -> Option<i32> {
    if low_factor < upp_factor {
        let factor = low_factor.ceil();
        if factor > upp_factor {
            None
        } else {
            Some(factor as i32)
        }
    } else {
        let factor = upp_factor.ceil();
        if factor > low_factor {
            None
        } else {
            Some(factor as i32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESOLUTION: u32 = 4096;

    #[test]
    fn s1_forward_degree() {
        let cal = CalibrationRecord::new().with_entry(
            "joint",
            CalibrationEntry::degree(DriveMode::NonInverted, -2048),
        );
        assert_eq!(cal.apply("joint", RESOLUTION, 2048).unwrap(), 0.0);
        assert_eq!(cal.apply("joint", RESOLUTION, 4096).unwrap(), 90.0);
        assert_eq!(cal.apply("joint", RESOLUTION, 0).unwrap(), -90.0);
    }

    #[test]
    fn s2_inverse_degree() {
        let cal = CalibrationRecord::new().with_entry(
            "joint",
            CalibrationEntry::degree(DriveMode::NonInverted, -2048),
        );
        let raw = cal.revert("joint", RESOLUTION, 45.0).unwrap();
        assert_eq!(raw, 2560);
    }

    #[test]
    fn s3_autocorrect_whole_turn() {
        let mut cal = CalibrationRecord::new()
            .with_entry("joint", CalibrationEntry::degree(DriveMode::NonInverted, 0));

        let value = cal.apply_autocorrect("joint", RESOLUTION, 5000).unwrap();
        assert!((value - 79.45).abs() < 0.1, "got {value}");

        match cal.entry("joint").unwrap() {
            CalibrationEntry::Degree { homing_offset, .. } => assert_eq!(*homing_offset, -4096),
            _ => panic!("expected degree entry"),
        }
    }

    #[test]
    fn s4_linear() {
        let cal = CalibrationRecord::new()
            .with_entry("gripper", CalibrationEntry::linear(2000, 3000).unwrap());
        assert_eq!(cal.apply("gripper", RESOLUTION, 2500).unwrap(), 50.0);
        assert_eq!(cal.apply("gripper", RESOLUTION, 3100).unwrap(), 110.0);

        let mut cal = cal;
        let err = cal.apply_autocorrect("gripper", RESOLUTION, 3200).unwrap_err();
        assert!(matches!(err, BusError::CalibrationUnresolvable { .. }));
    }

    #[test]
    fn linear_requires_distinct_bounds() {
        assert!(CalibrationEntry::linear(100, 100).is_err());
    }

    #[test]
    fn invariant_round_trip_degree() {
        let cal = CalibrationRecord::new().with_entry(
            "joint",
            CalibrationEntry::degree(DriveMode::Inverted, 100),
        );
        for raw in [-2000, -500, 0, 500, 2000] {
            if let Ok(degrees) = cal.apply("joint", RESOLUTION, raw) {
                let back = cal.revert("joint", RESOLUTION, degrees).unwrap();
                assert!((back - raw).abs() <= 1, "raw={raw} back={back}");
            }
        }
    }

    #[test]
    fn invariant_autocorrect_idempotent() {
        let mut cal = CalibrationRecord::new()
            .with_entry("joint", CalibrationEntry::degree(DriveMode::NonInverted, 0));

        let first = cal.apply_autocorrect("joint", RESOLUTION, 5000).unwrap();
        let offset_after_first = match cal.entry("joint").unwrap() {
            CalibrationEntry::Degree { homing_offset, .. } => *homing_offset,
            _ => unreachable!(),
        };

        let second = cal.apply_autocorrect("joint", RESOLUTION, 5000).unwrap();
        let offset_after_second = match cal.entry("joint").unwrap() {
            CalibrationEntry::Degree { homing_offset, .. } => *homing_offset,
            _ => unreachable!(),
        };

        assert_eq!(first, second);
        assert_eq!(offset_after_first, offset_after_second);
    }

    #[test]
    fn monotone_in_raw_value() {
        let cal = CalibrationRecord::new().with_entry(
            "joint",
            CalibrationEntry::degree(DriveMode::NonInverted, 0),
        );
        let a = cal.apply("joint", RESOLUTION, 100).unwrap();
        let b = cal.apply("joint", RESOLUTION, 200).unwrap();
        assert!(b > a);
    }
}
