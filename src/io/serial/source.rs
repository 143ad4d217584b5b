// src/io/serial/source.rs
//
// Opened serial port as a ByteSource.
// Reads are bounded by the configured inter-byte timeout so the capture
// loop can poll its stop flag and the framer can observe silence gaps.

use std::io::{self, Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::utils::{to_serialport_data_bits, to_serialport_parity, to_serialport_stop_bits, Parity};
use crate::error::SessionError;
use crate::io::{ByteSource, ReadOutcome};

// ============================================================================
// Configuration
// ============================================================================

/// Serial port configuration for a capture session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub parity: Parity,
    /// Inter-byte read timeout. Any silence gap at least this long ends the
    /// current packet; it also bounds the stop latency of the capture loop.
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// 8-N-1 with the default 100 ms inter-byte timeout.
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        SerialConfig {
            port: port.into(),
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            read_timeout: Duration::from_millis(100),
        }
    }
}

// ============================================================================
// Serial Byte Source
// ============================================================================

/// An opened serial port handle. Dropping it closes the device.
pub struct SerialByteSource {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialByteSource {
    /// Open the configured port.
    ///
    /// The read timeout is fixed on the handle here; `read_byte` reports a
    /// `TimedOut` outcome each time it elapses with no data.
    pub fn open(config: &SerialConfig) -> Result<Self, SessionError> {
        let port = serialport::new(&config.port, config.baud_rate)
            .data_bits(to_serialport_data_bits(config.data_bits))
            .stop_bits(to_serialport_stop_bits(config.stop_bits))
            .parity(to_serialport_parity(&config.parity))
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| SessionError::DeviceUnavailable {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        tlog!(
            "[serial] Opened {} at {} baud ({}-{}-{}, timeout {:?})",
            config.port,
            config.baud_rate,
            config.data_bits,
            match config.parity {
                Parity::None => 'N',
                Parity::Odd => 'O',
                Parity::Even => 'E',
            },
            config.stop_bits,
            config.read_timeout
        );

        Ok(SerialByteSource { port })
    }
}

impl ByteSource for SerialByteSource {
    fn read_byte(&mut self) -> io::Result<ReadOutcome> {
        let mut buf = [0u8; 1];
        match self.port.read(&mut buf) {
            Ok(n) if n > 0 => Ok(ReadOutcome::Byte(buf[0])),
            // EOF - port closed/disconnected
            Ok(_) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "device disconnected",
            )),
            // Timeout is expected for serial reads
            Err(ref e) if e.kind() == io::ErrorKind::TimedOut => Ok(ReadOutcome::TimedOut),
            Err(e) => Err(e),
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }
}

// ============================================================================
// Port Enumeration
// ============================================================================

/// Information about an available serial port
#[derive(Clone, Debug, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

/// List available serial ports
///
/// On macOS, filters out /dev/tty.* devices and only shows /dev/cu.* devices.
/// The cu (calling unit) devices are non-blocking and preferred for outgoing
/// connections. The tty (terminal) devices block on open waiting for carrier
/// detect.
pub fn list_serial_ports() -> Result<Vec<SerialPortInfo>, String> {
    let ports =
        serialport::available_ports().map_err(|e| format!("Failed to enumerate ports: {}", e))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (port_type, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => (
                    "USB".to_string(),
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                serialport::SerialPortType::BluetoothPort => {
                    ("Bluetooth".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::PciPort => {
                    ("PCI".to_string(), None, None, None, None, None)
                }
                serialport::SerialPortType::Unknown => {
                    ("Unknown".to_string(), None, None, None, None, None)
                }
            };
            SerialPortInfo {
                port_name: p.port_name,
                port_type,
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect())
}
