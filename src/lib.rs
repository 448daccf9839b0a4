//! Feetech SCS-series motor bus driver.
//!
//! A half-duplex UART bus driver for a chain of daisy-chained Feetech
//! smart servos: group sync read/write over a contiguous control-table
//! region, a calibration engine converting raw encoder counts to degrees
//! or percent, and a one-motor-at-a-time configuration protocol for
//! assigning IDs and baud rates to unconfigured motors.

pub mod bus;
pub mod calibration;
pub mod codec;
pub mod configure;
pub mod config;
pub mod error;
pub mod find_port;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use bus::{MotorDescriptor, MotorNames, MotorsBus, Values};
pub use calibration::{CalibrationEntry, CalibrationRecord, DriveMode};
pub use error::{BusError, Result};
pub use transport::{SerialTransport, Transport};
