/*!
Serial channel management.

A [`SerialChannel`] owns exactly one OS serial handle. Controllers never hold
a channel directly: the master holds an [`OwnedChannel`], which may close the
connection, and hands [`SharedChannel`] handles to its slaves. A shared handle
has no `close` method, so a slave cannot release a connection it does not own.

Everything here is single-threaded and blocking. Writers sharing one physical
channel are serialized by their caller.
*/

use crate::error::{ChannelError, ConnectionError};
use crate::settings::ChannelConfig;
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Byte sink of an open serial connection
pub type SerialLink = Box<dyn Write + Send>;

/// Source of serial ports: enumeration and opening
pub trait SerialBackend {
    /// Names of the serial ports currently present
    fn available_ports(&self) -> Result<Vec<String>, ChannelError>;

    /// Open a port. Implementations must not retry.
    fn open(&self, config: &ChannelConfig) -> Result<SerialLink, ConnectionError>;
}

/// Serial ports of the host operating system
#[derive(Debug, Clone)]
pub struct SystemSerial {
    timeout: Duration,
}

impl SystemSerial {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemSerial {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl SerialBackend for SystemSerial {
    fn available_ports(&self) -> Result<Vec<String>, ChannelError> {
        let ports = serialport::available_ports()
            .map_err(|e| ChannelError::Enumeration(e.to_string()))?;
        Ok(ports.into_iter().map(|p| p.port_name).collect())
    }

    fn open(&self, config: &ChannelConfig) -> Result<SerialLink, ConnectionError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(self.timeout)
            .open()
            .map_err(|e| ConnectionError::new(&config.port, e.to_string()))?;
        Ok(Box::new(port))
    }
}

/// Enumerate the serial ports a backend can currently see
pub fn enumerate_ports(backend: &dyn SerialBackend) -> Result<Vec<String>, ChannelError> {
    let ports = backend.available_ports()?;
    debug!("Enumerated {} serial port(s): {:?}", ports.len(), ports);
    Ok(ports)
}

/// A single serial connection
pub struct SerialChannel {
    config: ChannelConfig,
    link: Option<SerialLink>,
}

impl SerialChannel {
    /// Open the configured port through `backend`
    pub fn open(backend: &dyn SerialBackend, config: ChannelConfig) -> Result<Self, ConnectionError> {
        info!("Opening serial port {} at {} bps", config.port, config.baud_rate);
        let link = backend.open(&config)?;
        Ok(Self {
            config,
            link: Some(link),
        })
    }

    /// Transmit one command byte and flush it to the device
    pub fn write(&mut self, byte: u8) -> Result<(), ChannelError> {
        let link = self.link.as_mut().ok_or(ChannelError::NotConnected)?;
        link.write_all(&[byte])?;
        link.flush()?;
        debug!("Sent 0x{:02X} on {}", byte, self.config.port);
        Ok(())
    }

    /// Release the OS handle. Closing twice is a no-op.
    pub fn close(&mut self) {
        if let Some(mut link) = self.link.take() {
            if let Err(e) = link.flush() {
                warn!("Flush before closing {} failed: {}", self.config.port, e);
            }
            info!("Closed serial port {}", self.config.port);
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.is_some()
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialChannel")
            .field("config", &self.config)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Owning handle: the only handle allowed to close the connection.
/// Dropping it closes the connection as well.
#[derive(Debug)]
pub struct OwnedChannel {
    inner: Rc<RefCell<SerialChannel>>,
}

impl OwnedChannel {
    pub fn open(backend: &dyn SerialBackend, config: ChannelConfig) -> Result<Self, ConnectionError> {
        let channel = SerialChannel::open(backend, config)?;
        Ok(Self {
            inner: Rc::new(RefCell::new(channel)),
        })
    }

    /// Non-owning handle for a slave controller
    pub fn share(&self) -> SharedChannel {
        SharedChannel {
            inner: Rc::clone(&self.inner),
        }
    }

    pub fn write(&self, byte: u8) -> Result<(), ChannelError> {
        self.inner.borrow_mut().write(byte)
    }

    pub fn close(&self) {
        self.inner.borrow_mut().close();
    }

    pub fn port(&self) -> String {
        self.inner.borrow().config().port.clone()
    }
}

impl Drop for OwnedChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Non-owning handle to a channel opened by a master
#[derive(Debug, Clone)]
pub struct SharedChannel {
    inner: Rc<RefCell<SerialChannel>>,
}

impl SharedChannel {
    /// Fails with `NotConnected` once the owner has closed the channel
    pub fn write(&self, byte: u8) -> Result<(), ChannelError> {
        self.inner.borrow_mut().write(byte)
    }

    pub fn is_open(&self) -> bool {
        self.inner.borrow().is_open()
    }

    pub fn port(&self) -> String {
        self.inner.borrow().config().port.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    #[test]
    fn test_open_write_close() {
        let backend = MockBackend::with_ports(&["COM3"]);
        let mut channel = SerialChannel::open(&backend, ChannelConfig::new("COM3")).unwrap();
        assert!(channel.is_open());
        assert!(backend.is_connected());

        channel.write(0x41).unwrap();
        channel.write(0x40).unwrap();
        assert_eq!(backend.sent(), vec![0x41, 0x40]);

        channel.close();
        assert!(!channel.is_open());
        assert!(!backend.is_connected());
    }

    #[test]
    fn test_close_is_idempotent() {
        let backend = MockBackend::with_ports(&["COM3"]);
        let mut channel = SerialChannel::open(&backend, ChannelConfig::new("COM3")).unwrap();
        channel.close();
        channel.close();
        assert!(!channel.is_open());
    }

    #[test]
    fn test_write_after_close_is_not_connected() {
        let backend = MockBackend::with_ports(&["COM3"]);
        let mut channel = SerialChannel::open(&backend, ChannelConfig::new("COM3")).unwrap();
        channel.close();
        assert!(matches!(channel.write(0x41), Err(ChannelError::NotConnected)));
        assert!(backend.sent().is_empty());
    }

    #[test]
    fn test_open_unknown_port_fails() {
        let backend = MockBackend::with_ports(&["COM3"]);
        let err = SerialChannel::open(&backend, ChannelConfig::new("COM99")).unwrap_err();
        assert_eq!(err.port, "COM99");
        assert_eq!(backend.open_attempts(), 1);
    }

    #[test]
    fn test_drop_releases_handle() {
        let backend = MockBackend::with_ports(&["COM3"]);
        {
            let _channel = SerialChannel::open(&backend, ChannelConfig::new("COM3")).unwrap();
            assert!(backend.is_connected());
        }
        assert!(!backend.is_connected());
    }

    #[test]
    fn test_shared_handle_follows_owner() {
        let backend = MockBackend::with_ports(&["COM3"]);
        let owned = OwnedChannel::open(&backend, ChannelConfig::new("COM3")).unwrap();
        let shared = owned.share();

        shared.write(0x41).unwrap();
        owned.write(0x40).unwrap();
        assert_eq!(backend.sent(), vec![0x41, 0x40]);
        assert_eq!(shared.port(), "COM3");

        owned.close();
        assert!(!shared.is_open());
        assert!(matches!(shared.write(0x41), Err(ChannelError::NotConnected)));
    }

    #[test]
    fn test_dropping_owner_closes_shared_handles() {
        let backend = MockBackend::with_ports(&["COM3"]);
        let owned = OwnedChannel::open(&backend, ChannelConfig::new("COM3")).unwrap();
        let shared = owned.share();
        drop(owned);
        assert!(!shared.is_open());
        assert!(!backend.is_connected());
    }

    #[test]
    fn test_enumerate_ports() {
        let backend = MockBackend::with_ports(&["COM1", "COM10"]);
        assert_eq!(enumerate_ports(&backend).unwrap(), vec!["COM1", "COM10"]);
    }
}
