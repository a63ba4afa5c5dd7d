/*!
# Shutter Control Core

This crate contains the serial channel management and binary actuator control
logic shared by the command-line tool and the Python extension of the
Uniblitz VLM1 shutter driver.

## Core Types

- [`Position`] - Logical shutter position (closed/open) and its command byte
- [`SerialChannel`] - A single open serial connection
- [`OwnedChannel`] / [`SharedChannel`] - Owning and non-owning channel handles
- [`BinaryActuator`] - Master/slave actuator controller state machine
- [`ActuatorSettings`] - Port selection and host-side bounds metadata

## Modules

- [`position`] - Position coercion and the single-byte wire protocol
- [`channel`] - Serial channel lifecycle and port enumeration
- [`controller`] - Actuator controller
- [`settings`] - Configuration surface
- [`status`] - Status notifications towards the host framework
- [`mock`] - In-memory serial backend for tests and dry runs
- [`error`] - Common error types
*/

pub mod channel;
pub mod controller;
pub mod error;
pub mod mock;
pub mod position;
pub mod settings;
pub mod status;

// Re-export commonly used types
pub use channel::{enumerate_ports, OwnedChannel, SerialBackend, SerialChannel, SharedChannel, SystemSerial};
pub use controller::{self_test, BinaryActuator, ControllerRole, ControllerState, InitReport};
pub use error::{ChannelError, ConnectionError, InitError, MoveError, Result, SharedError};
pub use mock::MockBackend;
pub use position::Position;
pub use settings::{ActuatorSettings, Bounds, ChannelConfig, SettingChange};
pub use status::{LogSink, RecordingSink, StatusEvent, StatusSink};

/// Version information for the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    /// Fixed baud rate of the shutter controller
    pub const BAUD_RATE: u32 = 9600;

    /// Command byte driving the shutter open (logical 1)
    pub const OPEN_COMMAND: u8 = b'A';

    /// Command byte driving the shutter closed (logical 0)
    pub const CLOSE_COMMAND: u8 = b'@';

    /// Port selected by default when it is among the enumerated ports
    pub const PREFERRED_PORT: &str = "COM10";

    /// Host-side lower bound of the actuator value
    pub const MIN_BOUND: f64 = 0.0;

    /// Host-side upper bound of the actuator value
    pub const MAX_BOUND: f64 = 1.0;

    /// Host-side positioning tolerance
    pub const EPSILON: f64 = 1.0;
}
