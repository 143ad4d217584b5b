// src/io/mod.rs
//
// IO abstractions for byte-oriented capture sources.
// A ByteSource hands out single bytes bounded by the configured read
// timeout; the timeout doubles as the frame delimiter for the silence
// framer, so there is no separate idle-detection mechanism.

pub mod framer;
pub mod serial;

use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::TimeZone;
use serde::{Deserialize, Serialize};

// ============================================================================
// Byte Source
// ============================================================================

/// Outcome of a single bounded read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One byte arrived within the timeout window.
    Byte(u8),
    /// No byte arrived within the timeout window.
    TimedOut,
}

/// A byte-oriented capture source with timeout-bounded reads.
///
/// Reads block for at most the timeout configured when the source was
/// opened. A disconnect is reported as `ErrorKind::UnexpectedEof`; any
/// other error is a hard read failure that ends the session.
pub trait ByteSource: Send {
    /// Read one byte, or report that the timeout window elapsed.
    fn read_byte(&mut self) -> io::Result<ReadOutcome>;

    /// Write raw bytes to the device and flush them.
    fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
}

// ============================================================================
// Packet
// ============================================================================

/// A packet framed out of the byte stream by a silence gap.
///
/// Created exactly once, when a read timeout follows at least one buffered
/// byte. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    /// Host UNIX timestamp in milliseconds, stamped when the gap was observed.
    pub timestamp_ms: u64,
    /// Payload bytes in arrival order.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Uppercase space-separated hex rendering of the payload ("7E 00 E1").
    pub fn payload_hex(&self) -> String {
        self.payload
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Wall-clock rendering of the timestamp, `YYYY-MM-DD HH:MM:SS.mmm`
    /// local time.
    pub fn timestamp_text(&self) -> String {
        format_timestamp_ms(self.timestamp_ms)
    }
}

/// Get current time in milliseconds since UNIX epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Render an epoch-millisecond timestamp as `YYYY-MM-DD HH:MM:SS.mmm` local
/// time.
pub fn format_timestamp_ms(timestamp_ms: u64) -> String {
    match chrono::Local.timestamp_millis_opt(timestamp_ms as i64) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        _ => format!("@{}ms", timestamp_ms),
    }
}
