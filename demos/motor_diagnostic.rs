// Motor diagnostic: READ-ONLY check of bus connectivity and register values.
//
// This tool does not write anything to the motors - it's safe to run any
// time. Use this before motor_test to confirm the bus and roster are sane.
//
// Usage: cargo run --example motor_diagnostic -- [port]
// Example: cargo run --example motor_diagnostic -- /dev/tty.usbmodem58760432781

use scs_motors_bus::{MotorDescriptor, MotorNames, MotorsBus, SerialTransport};

const MOTOR_NAMES: [&str; 3] = ["shoulder", "elbow", "gripper"];
const MOTOR_IDS: [u8; 3] = [1, 2, 6];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/dev/tty.usbmodem58760432781".to_string());

    println!("Motor diagnostic (read-only) on {port}");
    println!("Expected roster: {:?}", MOTOR_IDS);
    println!();

    let motors = MOTOR_NAMES
        .iter()
        .zip(MOTOR_IDS.iter())
        .map(|(&name, &id)| (name.to_string(), MotorDescriptor::new(id, "sts3215")))
        .collect();

    let mut bus: MotorsBus<SerialTransport> = MotorsBus::new(port.clone(), motors, None, None);

    println!("Step 1: Opening serial port...");
    // `reconnect` skips the roster-configured gate `connect` applies, so
    // this tool works even before the motors carry their final ids.
    match bus.reconnect() {
        Ok(()) => println!("  serial port opened"),
        Err(e) => {
            println!("  failed to open serial port: {e}");
            return Err(e.into());
        }
    }
    println!();

    println!("Step 2: Reading registers from each motor...");
    println!();
    for name in MOTOR_NAMES {
        println!("  === {name} ===");
        for register in ["Torque_Enable", "Present_Position", "Present_Voltage", "Present_Temperature"] {
            match bus.read(register, MotorNames::from(name)) {
                Ok(values) => println!("    {register}: {values:?}"),
                Err(e) => println!("    {register}: ERROR - {e}"),
            }
        }
        println!();
    }

    bus.disconnect()?;
    println!("Diagnostic complete.");
    Ok(())
}
