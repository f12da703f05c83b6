//! Amperka Cube driver over its USB serial port.
//!
//! The cube firmware reads one newline-terminated command at a time:
//! `red`, `green` or `off`. Writes are best effort; a failed write is
//! logged at debug level and otherwise ignored, matching the device
//! contract in [`crate::device`].

use crate::device::{Device, DeviceOpener, OpenError};
use serialport::SerialPort;
use std::io::Write;
use std::time::Duration;

const BAUD_RATE: u32 = 9600;
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Opens the cube at a serial port path such as `/dev/ttyACM0` or `COM3`.
#[derive(Clone, Debug)]
pub struct CubeOpener {
    port: String,
}

impl CubeOpener {
    pub fn new(port: impl Into<String>) -> Self {
        Self { port: port.into() }
    }
}

impl DeviceOpener for CubeOpener {
    type Device = SerialCube;

    fn open(&mut self) -> Result<SerialCube, OpenError> {
        let port = serialport::new(&self.port, BAUD_RATE)
            .timeout(WRITE_TIMEOUT)
            .open()
            .map_err(|err| OpenError::new(&self.port, err))?;
        tracing::debug!(port = %self.port, baud = BAUD_RATE, "cube port opened");
        Ok(SerialCube {
            port,
            name: self.port.clone(),
        })
    }
}

/// An open cube.
pub struct SerialCube {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialCube {
    fn send(&mut self, command: &[u8]) {
        if let Err(err) = self.port.write_all(command).and_then(|()| self.port.flush()) {
            tracing::debug!(port = %self.name, error = %err, "cube write failed");
        }
    }
}

impl Device for SerialCube {
    fn red(&mut self) {
        self.send(b"red\n");
    }

    fn green(&mut self) {
        self.send(b"green\n");
    }

    fn off(&mut self) {
        self.send(b"off\n");
    }

    fn close(self) {
        tracing::debug!(port = %self.name, "cube port closed");
        drop(self.port);
    }
}
