/*!
# VLM1 Shutter - Python Actuator Backend

This Python extension module exposes the binary shutter controller to the
Python motion-control host. Method names follow the host's actuator plugin
conventions so the plugin class can forward to it directly.

## Usage

```python
import vlm1_shutter

shutter = vlm1_shutter.Shutter(status_callback=lambda kind, msg: print(kind, msg))
info, initialized = shutter.ini_stage()
if initialized:
    shutter.move_abs(1)          # open
    shutter.move_rel(1)          # toggle -> closed
    print(shutter.get_actuator_value())

    # A second axis reusing the same serial line
    slave = vlm1_shutter.Shutter()
    slave.ini_stage(shutter.controller(), role="Slave")

shutter.close()
```
*/

use pyo3::prelude::*;
use pyo3::types::PyModule;
use pyo3::Bound;
use shared::{
    ActuatorSettings, BinaryActuator, ControllerRole, MoveError, SharedChannel, SharedError,
    StatusEvent, StatusSink, SystemSerial,
};
use tracing::debug;

/// Forwards status events to a Python callable `(kind, message)`
struct CallbackSink {
    callback: PyObject,
}

impl StatusSink for CallbackSink {
    fn update_status(&self, event: StatusEvent) {
        Python::with_gil(|py| {
            if let Err(e) = self.callback.call1(py, (event.kind(), event.message())) {
                e.print(py);
            }
        });
    }
}

/// Serial line opened by a master shutter, handed to slave shutters
#[pyclass(name = "SharedController", unsendable)]
pub struct PySharedController {
    inner: SharedChannel,
}

#[pymethods]
impl PySharedController {
    #[getter]
    fn port(&self) -> String {
        self.inner.port()
    }

    #[getter]
    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
}

/// Python wrapper for the Rust shutter controller
#[pyclass(name = "Shutter", unsendable)]
pub struct PyShutter {
    inner: BinaryActuator,
}

#[pymethods]
impl PyShutter {
    /// Enumerate serial ports and select the default one (or `com_port`)
    #[new]
    #[pyo3(signature = (com_port=None, status_callback=None))]
    fn new(com_port: Option<String>, status_callback: Option<PyObject>) -> PyResult<Self> {
        let backend = SystemSerial::default();
        let mut settings = ActuatorSettings::discover(&backend).map_err(shared_err)?;
        if com_port.is_some() {
            settings.port = com_port;
        }

        let actuator = BinaryActuator::new(settings, backend);
        let inner = match status_callback {
            Some(callback) => actuator.with_sink(CallbackSink { callback }),
            None => actuator,
        };

        Ok(PyShutter { inner })
    }

    /// Names of the serial ports currently present
    #[staticmethod]
    fn list_ports() -> PyResult<Vec<String>> {
        shared::enumerate_ports(&SystemSerial::default())
            .map_err(|e| PyErr::new::<pyo3::exceptions::PyIOError, _>(format!("Failed to list ports: {}", e)))
    }

    /// Selected serial port
    #[getter]
    fn com_port(&self) -> Option<String> {
        self.inner.settings().port.clone()
    }

    /// Ports enumerated when the shutter was created
    #[getter]
    fn available_ports(&self) -> Vec<String> {
        self.inner.settings().available_ports.clone()
    }

    /// `(min, max)` bounds for the host UI
    #[getter]
    fn bounds(&self) -> (f64, f64) {
        let bounds = self.inner.settings().bounds;
        (bounds.min, bounds.max)
    }

    #[getter]
    fn epsilon(&self) -> f64 {
        self.inner.settings().epsilon
    }

    #[getter]
    fn initialized(&self) -> bool {
        self.inner.is_ready()
    }

    /// Initialize the communication. Never raises for hardware failures.
    ///
    /// Returns `(info, initialized)`.
    #[pyo3(signature = (controller=None, role="Master"))]
    fn ini_stage(&mut self, controller: Option<PyRef<'_, PySharedController>>, role: &str) -> PyResult<(String, bool)> {
        let role = parse_role(role)?;
        let external = controller.map(|c| c.inner.clone());
        debug!("ini_stage as {:?}", role);

        let report = self.inner.initialize_report(role, external);
        Ok((report.info, report.initialized))
    }

    /// Handle to pass to slave shutters, `None` until initialized
    fn controller(&self) -> Option<PySharedController> {
        self.inner
            .shared_channel()
            .map(|inner| PySharedController { inner })
    }

    /// Last commanded position, not read back from the hardware
    fn get_actuator_value(&self) -> f64 {
        self.inner.current_position().value()
    }

    /// Open for any value above zero, close otherwise
    fn move_abs(&mut self, value: f64) -> PyResult<f64> {
        self.inner.move_absolute(value).map(|p| p.value()).map_err(move_err)
    }

    /// Toggle for any non-zero value
    fn move_rel(&mut self, value: f64) -> PyResult<f64> {
        self.inner.move_relative(value).map(|p| p.value()).map_err(move_err)
    }

    fn move_home(&mut self) -> PyResult<f64> {
        self.inner.move_home().map(|p| p.value()).map_err(move_err)
    }

    /// Terminate the communication
    fn close(&mut self) {
        self.inner.shutdown();
    }

    /// Apply a parameter change from the host's settings tree.
    /// Parameters the shutter does not use are ignored.
    fn commit_settings(&mut self, name: &str, value: &str) -> PyResult<()> {
        self.inner.apply_named_setting(name, value).map_err(shared_err)
    }
}

fn parse_role(role: &str) -> PyResult<ControllerRole> {
    match role.to_ascii_lowercase().as_str() {
        "master" => Ok(ControllerRole::Master),
        "slave" => Ok(ControllerRole::Slave),
        other => Err(PyErr::new::<pyo3::exceptions::PyValueError, _>(format!(
            "Unknown controller role: {}",
            other
        ))),
    }
}

fn move_err(e: MoveError) -> PyErr {
    PyErr::new::<pyo3::exceptions::PyRuntimeError, _>(format!("Shutter move failed: {}", e))
}

fn shared_err(e: SharedError) -> PyErr {
    match e {
        SharedError::Config(msg) => PyErr::new::<pyo3::exceptions::PyValueError, _>(msg),
        other => PyErr::new::<pyo3::exceptions::PyIOError, _>(other.to_string()),
    }
}

/// Python module definition
#[pymodule]
fn vlm1_shutter(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyShutter>()?;
    m.add_class::<PySharedController>()?;
    m.add("__version__", shared::VERSION)?;

    // Add module docstring
    m.add("__doc__", "Uniblitz VLM1 shutter controller over a 9600 bps serial line")?;

    Ok(())
}
