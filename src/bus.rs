// Motors Bus (spec.md §4.3 / §4.4 / §6.4) — the stateful façade.
//
// Owns the transport, a per-register-group cache of reader/writer handles,
// the motor roster, and the calibration record. `read`/`write` are the two
// hot paths; `configure_motors` (implemented in `configure.rs`) drives the
// one-motor-at-a-time bus configuration protocol on top of these
// primitives only.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::calibration::CalibrationRecord;
use crate::codec::Width;
use crate::config::{CALIBRATION_REQUIRED, NUM_READ_RETRY, TIMEOUT_MS};
use crate::error::{BusError, Result};
use crate::registry::{ModelControlTable, ModelResolution, Registry};
use crate::transport::Transport;

/// A single motor's stable identity on the bus: wire ID plus model name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MotorDescriptor {
    pub id: u8,
    pub model: String,
}

impl MotorDescriptor {
    pub fn new(id: u8, model: impl Into<String>) -> Self {
        Self {
            id,
            model: model.into(),
        }
    }
}

/// Which motors a `read`/`write` call addresses. A bare name is wrapped
/// into `Single` by the `From<&str>` impl (spec.md §4.3 step 1).
#[derive(Debug, Clone)]
pub enum MotorNames<'a> {
    All,
    Single(&'a str),
    Many(&'a [&'a str]),
}

impl<'a> From<&'a str> for MotorNames<'a> {
    fn from(name: &'a str) -> Self {
        MotorNames::Single(name)
    }
}

impl<'a> From<&'a [&'a str]> for MotorNames<'a> {
    fn from(names: &'a [&'a str]) -> Self {
        MotorNames::Many(names)
    }
}

impl<'a, const N: usize> From<&'a [&'a str; N]> for MotorNames<'a> {
    fn from(names: &'a [&'a str; N]) -> Self {
        MotorNames::Many(names.as_slice())
    }
}

/// Values to `write`: a scalar broadcasts to every selected motor
/// (spec.md §4.4 step 1), or one value per selected name.
#[derive(Debug, Clone)]
pub enum Values {
    Scalar(f32),
    Many(Vec<f32>),
}

impl From<f32> for Values {
    fn from(v: f32) -> Self {
        Values::Scalar(v)
    }
}

impl From<i32> for Values {
    fn from(v: i32) -> Self {
        Values::Scalar(v as f32)
    }
}

impl From<Vec<f32>> for Values {
    fn from(v: Vec<f32>) -> Self {
        Values::Many(v)
    }
}

impl From<&[f32]> for Values {
    fn from(v: &[f32]) -> Self {
        Values::Many(v.to_vec())
    }
}

#[derive(Debug, Clone)]
struct GroupHandle {
    address: u16,
    width: Width,
    ids: Vec<u8>,
}

fn group_sync_key(register: &str, motor_names: &[String]) -> String {
    format!("{register}_{}", motor_names.join("_"))
}

fn capture_timestamp_utc() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// The stateful façade over a chain of Feetech motors (spec.md §3 "Bus state").
pub struct MotorsBus<T: Transport> {
    port_path: String,
    transport: T,
    registry: Registry,
    motors: Vec<(String, MotorDescriptor)>,
    calibration: Option<CalibrationRecord>,
    group_readers: HashMap<String, GroupHandle>,
    group_writers: HashMap<String, GroupHandle>,
    is_connected: bool,
    pub logs: HashMap<String, f64>,
}

impl<T: Transport + Default> MotorsBus<T> {
    pub fn new(
        port: impl Into<String>,
        motors: Vec<(String, MotorDescriptor)>,
        extra_model_control_table: Option<ModelControlTable>,
        extra_model_resolution: Option<ModelResolution>,
    ) -> Self {
        Self {
            port_path: port.into(),
            transport: T::default(),
            registry: Registry::new(extra_model_control_table, extra_model_resolution),
            motors,
            calibration: None,
            group_readers: HashMap::new(),
            group_writers: HashMap::new(),
            is_connected: false,
            logs: HashMap::new(),
        }
    }
}

impl<T: Transport> MotorsBus<T> {
    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn motor_names(&self) -> Vec<String> {
        self.motors.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn motor_models(&self) -> Vec<String> {
        self.motors.iter().map(|(_, d)| d.model.clone()).collect()
    }

    pub fn motor_indices(&self) -> Vec<u8> {
        self.motors.iter().map(|(_, d)| d.id).collect()
    }

    pub fn set_calibration(&mut self, calibration: CalibrationRecord) {
        self.calibration = Some(calibration);
    }

    pub fn calibration(&self) -> Option<&CalibrationRecord> {
        self.calibration.as_ref()
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn resolution_of(&self, model: &str) -> Result<u32> {
        self.registry.resolution(model)
    }

    /// Raw transport access for the configuration orchestrator (spec.md
    /// §4.5), which must probe and relabel motors before they hold a
    /// roster identity the `read`/`write` name-based API can address.
    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected {
            return Err(BusError::AlreadyConnected);
        }

        self.transport
            .open(&self.port_path)
            .map_err(|_| BusError::OpenFailed {
                path: self.port_path.clone(),
            })?;
        self.is_connected = true;
        self.transport.set_packet_timeout_ms(TIMEOUT_MS);

        if !self.are_motors_configured() {
            return Err(BusError::NotConfigured);
        }
        Ok(())
    }

    /// Reopen the port without the `are_motors_configured` gate `connect`
    /// applies, matching the original's `reconnect` (spec.md §6.4,
    /// SPEC_FULL.md ambient supplement #3).
    pub fn reconnect(&mut self) -> Result<()> {
        self.transport
            .open(&self.port_path)
            .map_err(|_| BusError::OpenFailed {
                path: self.port_path.clone(),
            })?;
        self.is_connected = true;
        Ok(())
    }

    pub fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected {
            return Err(BusError::NotConnected);
        }
        self.transport.close();
        self.group_readers.clear();
        self.group_writers.clear();
        self.is_connected = false;
        Ok(())
    }

    pub fn are_motors_configured(&mut self) -> bool {
        match self.read("ID", MotorNames::All) {
            Ok(values) => {
                let expected: Vec<f32> = self.motor_indices().iter().map(|&id| id as f32).collect();
                values == expected
            }
            Err(e) => {
                warn!("are_motors_configured: {e}");
                false
            }
        }
    }

    fn resolve_names(&self, motor_names: MotorNames) -> Result<Vec<String>> {
        let names = match motor_names {
            MotorNames::All => self.motor_names(),
            MotorNames::Single(name) => vec![name.to_string()],
            MotorNames::Many(names) => names.iter().map(|s| s.to_string()).collect(),
        };
        for name in &names {
            if !self.motors.iter().any(|(n, _)| n == name) {
                return Err(BusError::UnknownMotor { name: name.clone() });
            }
        }
        Ok(names)
    }

    fn ids_and_models(&self, names: &[String]) -> (Vec<u8>, Vec<String>) {
        let mut ids = Vec::with_capacity(names.len());
        let mut models = Vec::with_capacity(names.len());
        for name in names {
            let (_, descriptor) = self.motors.iter().find(|(n, _)| n == name).expect("resolved above");
            ids.push(descriptor.id);
            models.push(descriptor.model.clone());
        }
        (ids, models)
    }

    /// Read `register` from `motor_names` (default: full roster) and
    /// return physical values in the order requested (spec.md §4.3).
    ///
    /// Returned as `f32` uniformly: a raw reading widened losslessly when
    /// no calibration is installed, or the calibrated physical value
    /// (degrees/percent) when one is. `spec.md` §6.4 describes the return
    /// type as "int32 vector", which only holds for the uncalibrated case —
    /// the calibration engine (§4.6) produces a float. This crate resolves
    /// that in favor of not truncating calibrated values; see DESIGN.md.
    pub fn read<'a>(&mut self, register: &str, motor_names: impl Into<MotorNames<'a>>) -> Result<Vec<f32>> {
        if !self.is_connected {
            return Err(BusError::NotConnected);
        }

        let start = std::time::Instant::now();
        let names = self.resolve_names(motor_names.into())?;
        let (ids, models) = self.ids_and_models(&names);

        let entry = self.registry.assert_same_address(&models, register)?;
        let width = Width::from_bytes(entry.width_bytes)?;
        let group_key = group_sync_key(register, &names);

        self.group_readers
            .entry(group_key.clone())
            .and_modify(|h| {
                h.address = entry.address;
                h.width = width;
                h.ids = ids.clone();
            })
            .or_insert_with(|| GroupHandle {
                address: entry.address,
                width,
                ids: ids.clone(),
            });

        let mut last_err = String::new();
        let mut raw_values = None;
        for attempt in 0..NUM_READ_RETRY {
            match self.transport.group_sync_read(&ids, entry.address, width) {
                Ok(values) => {
                    raw_values = Some(values);
                    break;
                }
                Err(reason) => {
                    debug!(attempt, %reason, "group sync read failed, retrying");
                    last_err = reason;
                }
            }
        }

        let raw_values = raw_values.ok_or_else(|| BusError::BusCommError {
            group_key: group_key.clone(),
            reason: last_err,
        })?;

        let needs_calibration = CALIBRATION_REQUIRED.contains(&register) && self.calibration.is_some();

        let mut out = Vec::with_capacity(raw_values.len());
        for (i, raw) in raw_values.into_iter().enumerate() {
            // Reinterpret the unsigned wire value as signed int32
            // (two's-complement) for Goal/Present_Position; a no-op cast for
            // everything else, matching the original's `.astype(np.int32)`.
            let signed = raw as i32;
            if needs_calibration {
                let model = &models[i];
                let resolution = self.resolution_of(model)?;
                let calibration = self.calibration.as_mut().expect("checked above");
                out.push(calibration.apply_autocorrect(&names[i], resolution, signed)?);
            } else {
                out.push(signed as f32);
            }
        }

        self.logs.insert(
            format!("delta_timestamp_s_read_{group_key}"),
            start.elapsed().as_secs_f64(),
        );
        self.logs
            .insert(format!("timestamp_utc_read_{group_key}"), capture_timestamp_utc());

        Ok(out)
    }

    /// Write `values` to `register` on `motor_names` (spec.md §4.4).
    pub fn write<'a>(
        &mut self,
        register: &str,
        values: impl Into<Values>,
        motor_names: impl Into<MotorNames<'a>>,
    ) -> Result<()> {
        if !self.is_connected {
            return Err(BusError::NotConnected);
        }

        let start = std::time::Instant::now();
        let names = self.resolve_names(motor_names.into())?;
        let (ids, models) = self.ids_and_models(&names);

        let values = match values.into() {
            Values::Scalar(v) => vec![v; names.len()],
            Values::Many(v) => v,
        };
        if values.len() != names.len() {
            return Err(BusError::ValuesLengthMismatch {
                register: register.to_string(),
                expected: names.len(),
                got: values.len(),
            });
        }

        let raw_values: Result<Vec<i32>> = if CALIBRATION_REQUIRED.contains(&register) && self.calibration.is_some() {
            let calibration = self.calibration.as_ref().expect("checked above");
            names
                .iter()
                .zip(models.iter())
                .zip(values.iter())
                .map(|((name, model), value)| {
                    let resolution = self.resolution_of(model)?;
                    calibration.revert(name, resolution, *value)
                })
                .collect()
        } else {
            Ok(values.iter().map(|v| v.round() as i32).collect())
        };
        let raw_values = raw_values?;

        let entry = self.registry.assert_same_address(&models, register)?;
        let width = Width::from_bytes(entry.width_bytes)?;
        let group_key = group_sync_key(register, &names);

        // Independent writer cache, gated on writer-cache membership only
        // (spec.md §9 redesign: the original gates this on `group_readers`).
        let init_group = !self.group_writers.contains_key(&group_key);
        self.group_writers
            .entry(group_key.clone())
            .and_modify(|h| {
                h.address = entry.address;
                h.width = width;
                h.ids = ids.clone();
            })
            .or_insert_with(|| GroupHandle {
                address: entry.address,
                width,
                ids: ids.clone(),
            });
        debug!(group_key, init_group, "group sync write");

        let data: Vec<(u8, i32)> = ids.iter().copied().zip(raw_values.iter().copied()).collect();
        self.transport
            .group_sync_write(entry.address, width, &data)
            .map_err(|reason| BusError::BusCommError {
                group_key: group_key.clone(),
                reason,
            })?;

        self.logs.insert(
            format!("delta_timestamp_s_write_{group_key}"),
            start.elapsed().as_secs_f64(),
        );
        self.logs.insert(
            format!("timestamp_utc_write_{group_key}"),
            capture_timestamp_utc(),
        );

        Ok(())
    }
}

impl<T: Transport> Drop for MotorsBus<T> {
    fn drop(&mut self) {
        if self.is_connected {
            let _ = self.disconnect();
        }
    }
}
