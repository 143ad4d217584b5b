// src/io/serial/mod.rs
//
// Serial port capture source on the `serialport` crate.
// Provides the opened-port ByteSource implementation, port enumeration,
// and the configuration types shared with CLI tooling.

mod source;
pub(crate) mod utils;

pub use source::{list_serial_ports, SerialByteSource, SerialConfig, SerialPortInfo};
pub use utils::{parse_hex_payload, Parity};
