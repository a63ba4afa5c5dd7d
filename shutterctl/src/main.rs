/*!
# Shutter Control Tool

Command-line front-end for the Uniblitz VLM1 two-position shutter. The
shutter listens on a 9600 bps serial line for two single-byte commands
(`A` opens, `@` closes) and never answers.

## Features

- Serial port enumeration with default port selection
- Hardware self-test (open, close the shutter, release the port)
- Manual open/close/toggle/home moves
- Debug mode with an in-memory serial port, no hardware needed
- JSON status output for scripting

## Usage

### List ports
```bash
shutterctl ports
```

### Self-test on a given port
```bash
shutterctl self-test --port /dev/ttyUSB0
```

### Open the shutter without hardware attached
```bash
shutterctl --debug --json move open
```
*/

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn, Level};

use shared::{
    enumerate_ports, self_test, BinaryActuator, ControllerRole, LogSink, MockBackend, SerialBackend,
    StatusEvent, StatusSink, SystemSerial,
};

mod config;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "shutterctl")]
#[command(about = "Control and self-test for the Uniblitz VLM1 shutter")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "shutterctl.toml", global = true)]
    config: PathBuf,

    /// Use an in-memory serial port instead of real hardware
    #[arg(long, global = true)]
    debug: bool,

    /// Print status events as JSON lines on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List serial ports and the default selection
    Ports,

    /// Open the port, close the shutter and release the port
    SelfTest {
        /// Serial port (overrides configuration and default selection)
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Move the shutter
    Move {
        #[arg(value_enum)]
        action: MoveAction,

        /// Serial port (overrides configuration and default selection)
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Move to an absolute value: above zero opens, anything else closes
    Set {
        #[arg(allow_hyphen_values = true)]
        value: f64,

        /// Serial port (overrides configuration and default selection)
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "shutterctl.toml")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MoveAction {
    Open,
    Close,
    Toggle,
    Home,
}

/// Status sink writing one JSON object per event to stdout
struct JsonSink;

impl StatusSink for JsonSink {
    fn update_status(&self, event: StatusEvent) {
        match event.to_json() {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize status event: {}", e),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load_or_default(&cli.config)?;
    let level = if cli.verbose { Level::DEBUG } else { config.logging.level() };

    // Logging goes to stderr to keep stdout clean for JSON output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    if let Commands::Config { output } = &cli.command {
        return generate_config_file(output);
    }

    if cli.debug {
        let backend = debug_backend(&config, port_override(&cli.command));
        let result = run(&cli, &config, backend.clone());
        info!("🧪 Bytes sent: {}", hex::encode_upper(backend.sent()));
        result
    } else {
        run(&cli, &config, SystemSerial::default())
    }
}

/// In-memory backend exposing the preferred port and any requested one
fn debug_backend(config: &AppConfig, port: Option<String>) -> MockBackend {
    let mut ports = vec![config.shutter.preferred_port.clone()];
    for extra in config.shutter.port.iter().chain(port.iter()) {
        if !ports.contains(extra) {
            ports.push(extra.clone());
        }
    }
    let names: Vec<&str> = ports.iter().map(String::as_str).collect();
    MockBackend::with_ports(&names)
}

fn port_override(command: &Commands) -> Option<String> {
    match command {
        Commands::SelfTest { port } | Commands::Move { port, .. } | Commands::Set { port, .. } => port.clone(),
        Commands::Ports | Commands::Config { .. } => None,
    }
}

fn run<B: SerialBackend + 'static>(cli: &Cli, config: &AppConfig, backend: B) -> Result<()> {
    let ports = enumerate_ports(&backend).context("Failed to enumerate serial ports")?;
    let settings = config.shutter.settings(ports, port_override(&cli.command));

    if let Commands::Ports = cli.command {
        return list_ports(cli, &settings);
    }

    let actuator = BinaryActuator::new(settings, backend);
    let mut actuator = if cli.json {
        actuator.with_sink(JsonSink)
    } else {
        actuator.with_sink(LogSink)
    };

    match &cli.command {
        Commands::SelfTest { .. } => {
            self_test(&mut actuator)?;
            println!("✅ Self-test completed");
        }
        Commands::Move { action, .. } => {
            actuator.initialize(ControllerRole::Master, None)?;
            let position = match action {
                MoveAction::Open => actuator.move_absolute(1.0)?,
                MoveAction::Close => actuator.move_absolute(0.0)?,
                MoveAction::Toggle => actuator.move_relative(1.0)?,
                MoveAction::Home => actuator.move_home()?,
            };
            info!("Shutter is now {}", position);
            actuator.current_position();
            actuator.shutdown();
        }
        Commands::Set { value, .. } => {
            actuator.initialize(ControllerRole::Master, None)?;
            let position = actuator.move_absolute(*value)?;
            info!("Value {} commanded shutter {}", value, position);
            actuator.current_position();
            actuator.shutdown();
        }
        Commands::Ports | Commands::Config { .. } => {}
    }

    Ok(())
}

fn list_ports(cli: &Cli, settings: &shared::ActuatorSettings) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }

    if settings.available_ports.is_empty() {
        println!("⚠️ No serial ports found");
    }
    for port in &settings.available_ports {
        let marker = if Some(port) == settings.port.as_ref() { "*" } else { " " };
        println!("{} {}", marker, port);
    }
    match &settings.port {
        Some(port) => println!("🔌 Default port: {}", port),
        None => println!("🔌 Default port: none"),
    }
    Ok(())
}

/// Generate a default configuration file
fn generate_config_file(output_path: &Path) -> Result<()> {
    let config = AppConfig::new();
    config.save_to_file(output_path)?;

    println!("✅ Generated configuration file: {}", output_path.display());
    println!("📝 Edit the file to customize settings, then run:");
    println!("   shutterctl --config {} self-test", output_path.display());

    Ok(())
}
