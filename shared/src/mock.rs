/*!
In-memory serial backend.

Records every byte written so tests and dry runs can inspect the command
stream without hardware attached.
*/

use crate::channel::{SerialBackend, SerialLink};
use crate::error::{ChannelError, ConnectionError};
use crate::settings::ChannelConfig;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Fake serial backend with a fixed set of ports
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    ports: Vec<String>,
    refuse_open: bool,
    state: Arc<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    sent: Mutex<Vec<u8>>,
    live_links: AtomicUsize,
    open_attempts: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MockBackend {
    pub fn with_ports(ports: &[&str]) -> Self {
        Self {
            ports: ports.iter().map(|p| p.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Enumerates its ports but refuses to open any of them (port busy)
    pub fn refusing(ports: &[&str]) -> Self {
        Self {
            refuse_open: true,
            ..Self::with_ports(ports)
        }
    }

    /// Make subsequent writes fail with an I/O error
    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every byte written so far, across all links
    pub fn sent(&self) -> Vec<u8> {
        self.state.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Whether at least one link is still open
    pub fn is_connected(&self) -> bool {
        self.state.live_links.load(Ordering::SeqCst) > 0
    }

    pub fn open_attempts(&self) -> usize {
        self.state.open_attempts.load(Ordering::SeqCst)
    }
}

impl SerialBackend for MockBackend {
    fn available_ports(&self) -> Result<Vec<String>, ChannelError> {
        Ok(self.ports.clone())
    }

    fn open(&self, config: &ChannelConfig) -> Result<SerialLink, ConnectionError> {
        self.state.open_attempts.fetch_add(1, Ordering::SeqCst);

        if !self.ports.contains(&config.port) {
            return Err(ConnectionError::new(&config.port, "no such port"));
        }
        if self.refuse_open {
            return Err(ConnectionError::new(&config.port, "port is busy"));
        }

        self.state.live_links.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockLink {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockLink {
    state: Arc<MockState>,
}

impl Write for MockLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        let mut sent = self
            .state
            .sent
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "mock log poisoned"))?;
        sent.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.state.live_links.fetch_sub(1, Ordering::SeqCst);
    }
}
