// src/store.rs
//
// Session packet log.
// The receiver thread is the only writer; every other thread takes
// point-in-time snapshots for display and reporting.

use std::sync::Mutex;

use crate::io::Packet;

/// Thread-safe, append-only log of the packets framed during a session.
///
/// Packets are appended in arrival order and never reordered. A snapshot
/// can never observe a torn packet: whole `Packet` values are published
/// under the lock.
#[derive(Debug, Default)]
pub struct PacketStore {
    packets: Mutex<Vec<Packet>>,
}

impl PacketStore {
    pub fn new() -> Self {
        PacketStore {
            packets: Mutex::new(Vec::new()),
        }
    }

    /// Append one framed packet to the end of the log.
    pub fn append(&self, packet: Packet) {
        self.packets.lock().unwrap().push(packet);
    }

    /// Point-in-time ordered copy of the log.
    pub fn snapshot(&self) -> Vec<Packet> {
        self.packets.lock().unwrap().clone()
    }

    /// Number of packets appended so far.
    pub fn count(&self) -> usize {
        self.packets.lock().unwrap().len()
    }

    /// Drop all packets. Used when resetting between sessions.
    pub fn clear(&self) {
        self.packets.lock().unwrap().clear();
    }
}
