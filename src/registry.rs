// Control-Table Registry (spec.md §4.2).
//
// Immutable model -> {register -> (address, width)} mapping, cloned once per
// bus instance and optionally merged with a caller-supplied override table,
// mirroring the Python `deepcopy(MODEL_CONTROL_TABLE)` + `.update(...)` at
// construction.

use std::collections::HashMap;

use crate::codec::Width;
use crate::error::{BusError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlEntry {
    pub address: u16,
    pub width_bytes: u8,
}

impl ControlEntry {
    pub const fn new(address: u16, width_bytes: u8) -> Self {
        Self { address, width_bytes }
    }
}

pub type ControlTable = HashMap<&'static str, ControlEntry>;

/// Full SCS-series control table, shared by `scs_series` and `sts3215`.
pub fn scs_series_control_table() -> ControlTable {
    [
        ("Model", ControlEntry::new(3, 2)),
        ("ID", ControlEntry::new(5, 1)),
        ("Baud_Rate", ControlEntry::new(6, 1)),
        ("Return_Delay", ControlEntry::new(7, 1)),
        ("Response_Status_Level", ControlEntry::new(8, 1)),
        ("Min_Angle_Limit", ControlEntry::new(9, 2)),
        ("Max_Angle_Limit", ControlEntry::new(11, 2)),
        ("Max_Temperature_Limit", ControlEntry::new(13, 1)),
        ("Max_Voltage_Limit", ControlEntry::new(14, 1)),
        ("Min_Voltage_Limit", ControlEntry::new(15, 1)),
        ("Max_Torque_Limit", ControlEntry::new(16, 2)),
        ("Phase", ControlEntry::new(18, 1)),
        ("Unloading_Condition", ControlEntry::new(19, 1)),
        ("LED_Alarm_Condition", ControlEntry::new(20, 1)),
        ("P_Coefficient", ControlEntry::new(21, 1)),
        ("D_Coefficient", ControlEntry::new(22, 1)),
        ("I_Coefficient", ControlEntry::new(23, 1)),
        ("Minimum_Startup_Force", ControlEntry::new(24, 2)),
        ("CW_Dead_Zone", ControlEntry::new(26, 1)),
        ("CCW_Dead_Zone", ControlEntry::new(27, 1)),
        ("Protection_Current", ControlEntry::new(28, 2)),
        ("Angular_Resolution", ControlEntry::new(30, 1)),
        ("Offset", ControlEntry::new(31, 2)),
        ("Mode", ControlEntry::new(33, 1)),
        ("Protective_Torque", ControlEntry::new(34, 1)),
        ("Protection_Time", ControlEntry::new(35, 1)),
        ("Overload_Torque", ControlEntry::new(36, 1)),
        (
            "Speed_closed_loop_P_proportional_coefficient",
            ControlEntry::new(37, 1),
        ),
        ("Over_Current_Protection_Time", ControlEntry::new(38, 1)),
        (
            "Velocity_closed_loop_I_integral_coefficient",
            ControlEntry::new(39, 1),
        ),
        ("Torque_Enable", ControlEntry::new(40, 1)),
        ("Acceleration", ControlEntry::new(41, 1)),
        ("Goal_Position", ControlEntry::new(42, 2)),
        ("Goal_Time", ControlEntry::new(44, 2)),
        ("Goal_Speed", ControlEntry::new(46, 2)),
        ("Lock", ControlEntry::new(55, 1)),
        ("Present_Position", ControlEntry::new(56, 2)),
        ("Present_Speed", ControlEntry::new(58, 2)),
        ("Present_Load", ControlEntry::new(60, 2)),
        ("Present_Voltage", ControlEntry::new(62, 1)),
        ("Present_Temperature", ControlEntry::new(63, 1)),
        ("Status", ControlEntry::new(65, 1)),
        ("Moving", ControlEntry::new(66, 1)),
        ("Present_Current", ControlEntry::new(69, 2)),
    ]
    .into_iter()
    .collect()
}

/// model -> control table.
pub type ModelControlTable = HashMap<String, ControlTable>;

pub fn default_model_control_table() -> ModelControlTable {
    let table = scs_series_control_table();
    [
        ("scs_series".to_string(), table.clone()),
        ("sts3215".to_string(), table),
    ]
    .into_iter()
    .collect()
}

/// model -> encoder resolution (steps per revolution).
pub type ModelResolution = HashMap<String, u32>;

pub fn default_model_resolution() -> ModelResolution {
    [
        ("scs_series".to_string(), 4096),
        ("sts3215".to_string(), 4096),
    ]
    .into_iter()
    .collect()
}

/// Registry owned by a single bus instance: the merged control table plus
/// encoder resolutions, with caller overrides folded in at construction.
#[derive(Debug, Clone)]
pub struct Registry {
    model_ctrl_table: ModelControlTable,
    model_resolution: ModelResolution,
}

impl Registry {
    pub fn new(
        extra_model_control_table: Option<ModelControlTable>,
        extra_model_resolution: Option<ModelResolution>,
    ) -> Self {
        let mut model_ctrl_table = default_model_control_table();
        if let Some(extra) = extra_model_control_table {
            model_ctrl_table.extend(extra);
        }

        let mut model_resolution = default_model_resolution();
        if let Some(extra) = extra_model_resolution {
            model_resolution.extend(extra);
        }

        Self {
            model_ctrl_table,
            model_resolution,
        }
    }

    pub fn entry(&self, model: &str, register: &str) -> Result<ControlEntry> {
        self.model_ctrl_table
            .get(model)
            .and_then(|table| table.get(register))
            .copied()
            .ok_or_else(|| BusError::UnknownControlEntry {
                register: register.to_string(),
                model: model.to_string(),
            })
    }

    pub fn resolution(&self, model: &str) -> Result<u32> {
        self.model_resolution
            .get(model)
            .copied()
            .ok_or_else(|| BusError::UnknownControlEntry {
                register: "<resolution>".to_string(),
                model: model.to_string(),
            })
    }

    /// Verify that every model in `models` agrees on both the address and
    /// the width for `register`. Fatal mismatch -> `HeterogeneousBatch`.
    pub fn assert_same_address(&self, models: &[String], register: &str) -> Result<ControlEntry> {
        let mut entries = Vec::with_capacity(models.len());
        for model in models {
            entries.push(self.entry(model, register)?);
        }

        let first = entries[0];
        if entries.iter().any(|e| *e != first) {
            return Err(BusError::HeterogeneousBatch {
                register: register.to_string(),
                models: models.to_vec(),
            });
        }

        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_register_resolves() {
        let registry = Registry::new(None, None);
        let entry = registry.entry("sts3215", "Present_Position").unwrap();
        assert_eq!(entry, ControlEntry::new(56, 2));
    }

    #[test]
    fn unknown_register_is_fatal() {
        let registry = Registry::new(None, None);
        assert!(registry.entry("sts3215", "Nonexistent").is_err());
        assert!(registry.entry("unknown-model", "ID").is_err());
    }

    #[test]
    fn extra_control_table_overrides_by_model() {
        let mut extra = ModelControlTable::new();
        let mut table = scs_series_control_table();
        table.insert("Custom", ControlEntry::new(100, 1));
        extra.insert("custom-model".to_string(), table);

        let registry = Registry::new(Some(extra), None);
        assert_eq!(
            registry.entry("custom-model", "Custom").unwrap(),
            ControlEntry::new(100, 1)
        );
        // Base models remain available, untouched by the override.
        assert!(registry.entry("sts3215", "Custom").is_err());
    }

    #[test]
    fn heterogeneous_batch_is_rejected() {
        let mut extra = ModelControlTable::new();
        let mut table = scs_series_control_table();
        table.insert("Present_Position", ControlEntry::new(999, 2));
        extra.insert("weird-model".to_string(), table);

        let registry = Registry::new(Some(extra), None);
        let models = vec!["sts3215".to_string(), "weird-model".to_string()];
        let err = registry
            .assert_same_address(&models, "Present_Position")
            .unwrap_err();
        assert!(matches!(err, BusError::HeterogeneousBatch { .. }));
    }

    #[test]
    fn homogeneous_batch_passes() {
        let registry = Registry::new(None, None);
        let models = vec!["sts3215".to_string(), "scs_series".to_string()];
        let entry = registry
            .assert_same_address(&models, "Present_Position")
            .unwrap();
        assert_eq!(entry, ControlEntry::new(56, 2));
    }
}
