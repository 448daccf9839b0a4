// Error taxonomy for the motor bus, following the teacher's `FeetechError`
// shape: one enum, `thiserror::Error` derive, `#[from]` at the transport
// boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("motors bus is already connected")]
    AlreadyConnected,

    #[error("motors bus is not connected")]
    NotConnected,

    #[error("failed to open port '{path}'")]
    OpenFailed { path: String },

    #[error("motors are not configured; run configure_motors first")]
    NotConfigured,

    #[error("communication error on group '{group_key}': {reason}")]
    BusCommError { group_key: String, reason: String },

    #[error(
        "joint '{motor}' out of range: value {value} outside bound [{lower}, {upper}]"
    )]
    JointOutOfRange {
        motor: String,
        value: f32,
        lower: f32,
        upper: f32,
    },

    #[error("calibration for '{motor}' could not be auto-corrected: {reason}")]
    CalibrationUnresolvable { motor: String, reason: String },

    #[error(
        "models {models:?} disagree on the control-table entry for '{register}'"
    )]
    HeterogeneousBatch { register: String, models: Vec<String> },

    #[error("unknown control table entry '{register}' for model '{model}'")]
    UnknownControlEntry { register: String, model: String },

    #[error("unknown motor '{name}'")]
    UnknownMotor { name: String },

    #[error("write to '{register}' expected {expected} value(s), got {got}")]
    ValuesLengthMismatch {
        register: String,
        expected: usize,
        got: usize,
    },

    #[error("unsupported register width {width} (must be 1, 2 or 4)")]
    UnsupportedWidth { width: u8 },

    #[error("no motor found while configuring slot {slot}, expected exactly one new motor")]
    MotorNotFound { slot: usize },

    #[error("more than one new motor detected while configuring slot {slot}: {ids:?}")]
    AmbiguousBus { slot: usize, ids: Vec<u8> },

    #[error("failed to write baudrate for motor {id} after {attempts} attempts")]
    BaudWriteFailed { id: u8, attempts: u32 },

    #[error("failed to write id for motor, expected {expected} but read back {actual:?}")]
    IdWriteFailed { expected: u8, actual: Option<u8> },

    #[error(
        "motor index used to communicate through the bus ({expected}) does not match the index present in its memory ({actual}); the motor memory might be damaged"
    )]
    CorruptedMotorMemory { expected: u8, actual: u8 },

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BusError>;
