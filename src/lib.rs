//! XBee serial capture engine.
//!
//! Frames a delimiter-less serial byte stream into packets, using the
//! inter-byte read timeout as the only frame boundary, logs each packet
//! with a millisecond wall-clock timestamp, and renders the legacy
//! `data_log` session report.
//!
//! The capture pipeline is [`ByteSource`] → [`SilenceFramer`] →
//! [`PacketStore`], driven by the receiver thread a [`SessionController`]
//! owns. Presentation layers observe it through [`SessionObserver`]
//! callbacks and the report operations; nothing in this crate renders UI.

#[macro_use]
mod logging;

pub mod error;
pub mod io;
pub mod report;
pub mod session;
pub mod store;

pub use error::SessionError;
pub use io::framer::SilenceFramer;
pub use io::serial::{
    list_serial_ports, parse_hex_payload, Parity, SerialByteSource, SerialConfig, SerialPortInfo,
};
pub use io::{now_ms, ByteSource, Packet, ReadOutcome};
pub use report::{collect_stats, render_report, write_report, ReportStats, DEFAULT_SOURCE_LABEL};
pub use session::{SessionController, SessionEndReason, SessionObserver, SessionState};
pub use store::PacketStore;
