// Motor test: careful, confirmation-gated exercise of bus configuration,
// calibration, and writes.
//
// IMPORTANT: run motor_diagnostic first to verify read-only communication.
//
// Usage: cargo run --example motor_test -- [port]
// Example: cargo run --example motor_test -- /dev/tty.usbmodem58760432781
//
// Safety: explicit confirmation before any writes, torque disabled on exit.

use std::io::{self, Write};

use scs_motors_bus::configure::StdinPrompter;
use scs_motors_bus::{CalibrationEntry, CalibrationRecord, DriveMode, MotorDescriptor, MotorNames, MotorsBus, SerialTransport};

const MOTOR_NAMES: [&str; 3] = ["shoulder", "elbow", "gripper"];
const MOTOR_IDS: [u8; 3] = [1, 2, 6];

fn confirm(prompt: &str) -> bool {
    print!("{prompt} [y/N]: ");
    io::stdout().flush().unwrap();
    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();
    input.trim().eq_ignore_ascii_case("y")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().unwrap()),
        )
        .init();

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/tty.usbmodem58760432781".to_string());

    println!("Motor test (WITH WRITES) on {port}");
    println!("This tool WILL write to motors and may cause movement.");
    println!();

    if !confirm("Have you run motor_diagnostic and verified all motors respond?") {
        println!("Run motor_diagnostic first: cargo run --example motor_diagnostic -- {port}");
        return Ok(());
    }

    let motors = MOTOR_NAMES
        .iter()
        .zip(MOTOR_IDS.iter())
        .map(|(&name, &id)| (name.to_string(), MotorDescriptor::new(id, "sts3215")))
        .collect();
    let mut bus: MotorsBus<SerialTransport> = MotorsBus::new(port.clone(), motors, None, None);

    println!("Opening serial port...");
    bus.reconnect()?;
    println!("Connected.");
    println!();

    if !bus.are_motors_configured() {
        if !confirm("Roster ids are not yet assigned. Run configure_motors now?") {
            println!("Aborted.");
            return Ok(());
        }
        let mut prompter = StdinPrompter;
        bus.configure_motors(&mut prompter)?;
        println!("Configuration complete.");
    }
    println!();

    bus.set_calibration(
        CalibrationRecord::new()
            .with_entry("shoulder", CalibrationEntry::degree(DriveMode::NonInverted, -2048))
            .with_entry("elbow", CalibrationEntry::degree(DriveMode::NonInverted, -2048))
            .with_entry("gripper", CalibrationEntry::linear(2000, 3000)?),
    );

    println!("Step: enabling torque...");
    if !confirm("Enable torque on all motors?") {
        return Ok(());
    }
    bus.write("Torque_Enable", 1i32, MotorNames::All)?;
    println!("  torque enabled");
    println!();

    println!("Step: reading current calibrated positions...");
    for name in MOTOR_NAMES {
        let value = bus.read("Present_Position", MotorNames::from(name))?;
        println!("  {name}: {value:?}");
    }
    println!();

    println!("Step: nudging shoulder by a few degrees (slow, small move)...");
    if confirm("Send a small Goal_Position move to 'shoulder'?") {
        let current = bus.read("Present_Position", MotorNames::from("shoulder"))?[0];
        bus.write("Goal_Position", current + 5.0, MotorNames::from("shoulder"))?;
        println!("  move sent");
    }

    println!();
    println!("Step: disabling torque (cleanup)...");
    bus.write("Torque_Enable", 0i32, MotorNames::All)?;
    println!("  torque disabled");

    bus.disconnect()?;
    println!("Test complete.");
    Ok(())
}
