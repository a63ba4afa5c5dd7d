/*!
Binary actuator controller.

Translates logical move requests into the two-byte shutter protocol and keeps
the last commanded position. Nothing is ever read back from the device, so
[`BinaryActuator::current_position`] reports what was commanded, not what the
shutter physically did.

## Lifecycle

```text
Uninitialized -> Initializing -> Ready -> Closed
      ^               |                      |
      +--- failure ---+                      +-- initialize() again
```

A master opens and owns its channel. A slave is handed a [`SharedChannel`]
by its master and never closes it.
*/

use crate::channel::{OwnedChannel, SerialBackend, SharedChannel};
use crate::error::{ChannelError, InitError, MoveError, Result};
use crate::position::Position;
use crate::settings::{ActuatorSettings, SettingChange};
use crate::status::{LogSink, StatusEvent, StatusSink};
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Whether a controller owns its channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControllerRole {
    #[default]
    Master,
    Slave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

/// Outcome of an initialization in the host framework's `(info, initialized)` form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub info: String,
    pub initialized: bool,
}

enum ChannelHandle {
    Owned(OwnedChannel),
    Shared(SharedChannel),
}

impl ChannelHandle {
    fn write(&self, byte: u8) -> std::result::Result<(), ChannelError> {
        match self {
            Self::Owned(channel) => channel.write(byte),
            Self::Shared(channel) => channel.write(byte),
        }
    }

    fn share(&self) -> SharedChannel {
        match self {
            Self::Owned(channel) => channel.share(),
            Self::Shared(channel) => channel.clone(),
        }
    }
}

/// Two-position shutter controller
pub struct BinaryActuator {
    settings: ActuatorSettings,
    backend: Box<dyn SerialBackend>,
    sink: Box<dyn StatusSink>,
    role: ControllerRole,
    state: ControllerState,
    channel: Option<ChannelHandle>,
    position: Position,
}

impl BinaryActuator {
    /// Create an uninitialized controller. The cached position starts closed.
    pub fn new(settings: ActuatorSettings, backend: impl SerialBackend + 'static) -> Self {
        Self {
            settings,
            backend: Box::new(backend),
            sink: Box::new(LogSink),
            role: ControllerRole::Master,
            state: ControllerState::Uninitialized,
            channel: None,
            position: Position::Closed,
        }
    }

    /// Replace the status sink
    pub fn with_sink(mut self, sink: impl StatusSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Connect the controller.
    ///
    /// A master opens the configured port; a slave adopts `external`, which
    /// must be an open channel shared by its master. Any channel held from a
    /// previous initialization is shut down first. On failure the controller
    /// is left `Uninitialized` and may be initialized again.
    pub fn initialize(
        &mut self,
        role: ControllerRole,
        external: Option<SharedChannel>,
    ) -> std::result::Result<(), InitError> {
        let (result, event) = self.run_initialization(role, external);
        self.sink.update_status(event);
        result
    }

    /// Same as [`initialize`](Self::initialize), folded into a report that never fails
    pub fn initialize_report(&mut self, role: ControllerRole, external: Option<SharedChannel>) -> InitReport {
        let (result, event) = self.run_initialization(role, external);
        let report = InitReport {
            info: event.message(),
            initialized: result.is_ok(),
        };
        self.sink.update_status(event);
        report
    }

    fn run_initialization(
        &mut self,
        role: ControllerRole,
        external: Option<SharedChannel>,
    ) -> (std::result::Result<(), InitError>, StatusEvent) {
        if self.channel.is_some() {
            self.shutdown();
        }

        self.role = role;
        self.state = ControllerState::Initializing;

        match self.connect(role, external) {
            Ok((handle, info)) => {
                self.channel = Some(handle);
                self.state = ControllerState::Ready;
                info!("{}", info);
                (Ok(()), StatusEvent::Initialized { info })
            }
            Err(err) => {
                self.state = ControllerState::Uninitialized;
                warn!("Shutter initialization failed: {}", err);
                let event = StatusEvent::init_failed(&err);
                (Err(err), event)
            }
        }
    }

    fn connect(
        &self,
        role: ControllerRole,
        external: Option<SharedChannel>,
    ) -> std::result::Result<(ChannelHandle, String), InitError> {
        match role {
            ControllerRole::Slave => {
                let shared = external
                    .filter(SharedChannel::is_open)
                    .ok_or(InitError::MissingExternalController)?;
                let info = format!("Slave shutter sharing port {}", shared.port());
                Ok((ChannelHandle::Shared(shared), info))
            }
            ControllerRole::Master => {
                if external.is_some() {
                    debug!("Ignoring external controller handed to a master");
                }
                let config = self.settings.channel_config().ok_or(InitError::NoPortSelected)?;
                let owned = OwnedChannel::open(self.backend.as_ref(), config)
                    .map_err(InitError::HardwareInitFailed)?;
                let info = format!("Port opened: {}", owned.port());
                Ok((ChannelHandle::Owned(owned), info))
            }
        }
    }

    /// Last commanded position. No hardware round-trip is made.
    pub fn current_position(&self) -> Position {
        self.sink.update_status(StatusEvent::Position {
            value: self.position.value(),
        });
        self.position
    }

    /// Move to `target`, quantized by [`Position::from_value`]: anything
    /// above zero opens, everything else (negative values included) closes.
    pub fn move_absolute<T: Zero + PartialOrd>(&mut self, target: T) -> std::result::Result<Position, MoveError> {
        self.command(Position::from_value(target))
    }

    /// Toggle the shutter for any non-zero `delta`; zero is a no-op.
    /// Magnitude and sign of `delta` are ignored.
    pub fn move_relative<T: Zero>(&mut self, delta: T) -> std::result::Result<Position, MoveError> {
        if delta.is_zero() {
            return Ok(self.position);
        }
        self.command(self.position.toggled())
    }

    /// Close the shutter, whatever the cached position says
    pub fn move_home(&mut self) -> std::result::Result<Position, MoveError> {
        self.command(Position::Closed)
    }

    fn command(&mut self, target: Position) -> std::result::Result<Position, MoveError> {
        let channel = match (self.state, &self.channel) {
            (ControllerState::Ready, Some(channel)) => channel,
            _ => return Err(MoveError::NotInitialized),
        };

        channel.write(target.command_byte())?;
        self.position = target;
        debug!("Shutter commanded {}", target);
        Ok(target)
    }

    /// Release the channel. A master closes it, a slave only drops its reference.
    /// Calling this on a controller without a channel does nothing.
    pub fn shutdown(&mut self) {
        let event = match self.channel.take() {
            Some(ChannelHandle::Owned(channel)) => {
                channel.close();
                StatusEvent::Closed
            }
            Some(ChannelHandle::Shared(channel)) => {
                debug!("Slave released its reference to {}", channel.port());
                StatusEvent::Released { port: channel.port() }
            }
            None => return,
        };
        self.state = ControllerState::Closed;
        self.sink.update_status(event);
    }

    /// Apply a setting changed by the host. A port change shuts the current
    /// channel down so the next `initialize` opens the new port.
    pub fn apply_setting_change(&mut self, change: SettingChange) {
        if change.invalidates_channel() {
            info!("Port selection changed, closing current channel");
            self.shutdown();
        }
        self.settings.apply(&change);
    }

    /// Apply a parameter change by its host name. Parameters the shutter
    /// does not act on are ignored.
    pub fn apply_named_setting(&mut self, name: &str, value: &str) -> Result<()> {
        if let Some(change) = self.settings.change_from_named(name, value)? {
            self.apply_setting_change(change);
        }
        Ok(())
    }

    /// Handle to give to slave controllers, available once ready
    pub fn shared_channel(&self) -> Option<SharedChannel> {
        match self.state {
            ControllerState::Ready => self.channel.as_ref().map(ChannelHandle::share),
            _ => None,
        }
    }

    pub fn role(&self) -> ControllerRole {
        self.role
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn settings(&self) -> &ActuatorSettings {
        &self.settings
    }

    pub fn is_ready(&self) -> bool {
        self.state == ControllerState::Ready
    }
}

impl Drop for BinaryActuator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Ad-hoc hardware check: open as master, command closed, tear down
pub fn self_test(actuator: &mut BinaryActuator) -> Result<()> {
    actuator.initialize(ControllerRole::Master, None)?;
    let outcome = actuator.move_absolute(0.0);
    actuator.shutdown();
    let position = outcome?;
    info!("Self-test passed, shutter {}", position);
    Ok(())
}
