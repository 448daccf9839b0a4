use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scs_motors_bus::find_port::{diff_ports, list_tty_ports, PortDiff};

#[derive(Parser)]
#[command(name = "scs-motors-bus", about = "Feetech SCS-series motor bus tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover which serial port a bus is attached to by unplugging it.
    FindPort,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::FindPort => {
            if let Err(code) = find_port() {
                std::process::exit(code);
            }
        }
    }
}

fn find_port() -> Result<(), i32> {
    println!("Finding all available ports for the motors bus.");
    let before = list_tty_ports();
    println!("{before:?}");

    println!("Remove the usb cable from your motors bus and press Enter when done.");
    let mut input = String::new();
    let _ = std::io::stdin().read_line(&mut input);

    std::thread::sleep(std::time::Duration::from_millis(500));
    let after = list_tty_ports();

    match diff_ports(&before, &after) {
        PortDiff::Found(port) => {
            println!("The port of this motors bus is '{}'.", port.display());
            println!("Reconnect the usb cable.");
            Ok(())
        }
        PortDiff::NoneFound => {
            eprintln!("Could not detect the port. No difference was found.");
            Err(1)
        }
        PortDiff::Ambiguous(ports) => {
            eprintln!("Could not detect the port. More than one port was found: {ports:?}");
            Err(1)
        }
    }
}
