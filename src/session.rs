// src/session.rs
//
// Capture session lifecycle.
// One controller owns at most one receiver thread. The thread drives
// timeout-bounded reads through the silence framer and appends each framed
// packet to the session store, notifying the observer as it goes.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use serde::Serialize;

use crate::error::SessionError;
use crate::io::framer::SilenceFramer;
use crate::io::serial::{SerialByteSource, SerialConfig};
use crate::io::{ByteSource, Packet, ReadOutcome};
use crate::report;
use crate::store::PacketStore;

// ============================================================================
// Types
// ============================================================================

/// Current state of a capture session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Running,
    /// Stop requested; the receiver loop exits within one read timeout.
    Stopping,
}

/// Why a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEndReason {
    /// `stop()` was requested.
    Stopped,
    /// The device reported end-of-stream (unplugged or closed).
    Disconnected,
    /// A non-timeout read error. The session is not retried.
    ReadError(String),
}

impl SessionEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEndReason::Stopped => "stopped",
            SessionEndReason::Disconnected => "disconnected",
            SessionEndReason::ReadError(_) => "error",
        }
    }
}

/// Callbacks delivered by the receiver thread.
///
/// `on_packet_framed` runs on the receiver thread between reads; it must
/// not block for long or packets separated by short gaps will merge.
pub trait SessionObserver: Send + Sync {
    fn on_packet_framed(&self, _packet: &Packet) {}
    fn on_session_ended(&self, _reason: &SessionEndReason) {}
}

// ============================================================================
// Session Controller
// ============================================================================

/// Owns the receiver thread of one capture session at a time.
///
/// State machine: Idle → Running on `start`, Running → Stopping on `stop`,
/// back to Idle once the receiver thread observes the flag and exits. A
/// hard read failure also ends the session (→ Idle); there is no reconnect
/// or retry.
pub struct SessionController {
    source_label: String,
    store: Arc<PacketStore>,
    observer: Arc<dyn SessionObserver>,
    state: Arc<Mutex<SessionState>>,
    stop_flag: Arc<AtomicBool>,
    receive_thread: Mutex<Option<JoinHandle<()>>>,
}

impl SessionController {
    pub fn new(source_label: impl Into<String>, observer: Arc<dyn SessionObserver>) -> Self {
        SessionController {
            source_label: source_label.into(),
            store: Arc::new(PacketStore::new()),
            observer,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            stop_flag: Arc::new(AtomicBool::new(false)),
            receive_thread: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    /// Number of packets framed so far in the current log.
    pub fn count(&self) -> usize {
        self.store.count()
    }

    /// Point-in-time copy of the session log. Valid in any state; a running
    /// session contributes only fully assembled packets.
    pub fn snapshot(&self) -> Vec<Packet> {
        self.store.snapshot()
    }

    /// Start a capture session with the byte source produced by `open`.
    ///
    /// `open` runs under the state transition, so two concurrent `start`
    /// calls can never obtain two handles to the same device. Fails with
    /// `AlreadyRunning` unless the controller is idle, and with whatever
    /// `open` returns (typically `DeviceUnavailable`) when the device
    /// cannot be opened — the controller stays idle in that case.
    pub fn start(
        &self,
        open: impl FnOnce() -> Result<Box<dyn ByteSource>, SessionError>,
    ) -> Result<(), SessionError> {
        let mut state = self.state.lock().unwrap();
        if *state != SessionState::Idle {
            return Err(SessionError::AlreadyRunning);
        }

        // Harvest the thread of a previous session that ended on its own.
        if let Some(handle) = self.receive_thread.lock().unwrap().take() {
            let _ = handle.join();
        }

        let source = open()?;
        self.stop_flag.store(false, Ordering::Relaxed);
        *state = SessionState::Running;

        let store = Arc::clone(&self.store);
        let observer = Arc::clone(&self.observer);
        let stop_flag = Arc::clone(&self.stop_flag);
        let thread_state = Arc::clone(&self.state);
        let label = self.source_label.clone();

        let handle = std::thread::spawn(move || {
            run_receive_loop(source, store, observer, stop_flag, thread_state, label);
        });
        *self.receive_thread.lock().unwrap() = Some(handle);

        Ok(())
    }

    /// Open the configured serial port and start capturing from it.
    pub fn start_serial(&self, config: &SerialConfig) -> Result<(), SessionError> {
        let config = config.clone();
        self.start(move || {
            SerialByteSource::open(&config).map(|s| Box::new(s) as Box<dyn ByteSource>)
        })
    }

    /// Request the receiver loop to exit. Idempotent, callable from any
    /// thread; a no-op while idle. The loop observes the flag within one
    /// read-timeout interval.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        let mut state = self.state.lock().unwrap();
        if *state == SessionState::Running {
            *state = SessionState::Stopping;
        }
    }

    /// Block until the receiver thread has fully exited (state back to
    /// Idle). A no-op when no session ran since the last `join`.
    pub fn join(&self) {
        let handle = self.receive_thread.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    /// Clear the session log. Only valid between sessions.
    pub fn reset(&self) -> Result<(), SessionError> {
        let state = self.state.lock().unwrap();
        if *state != SessionState::Idle {
            return Err(SessionError::AlreadyRunning);
        }
        self.store.clear();
        Ok(())
    }

    /// Render the report for the current snapshot.
    pub fn generate_report(&self) -> String {
        report::render_report(&self.store.snapshot(), &self.source_label)
    }

    /// Export the report to the next unused `data_log<N>.txt` under `dir`.
    pub fn export_report(&self, dir: &Path) -> io::Result<PathBuf> {
        report::write_report(dir, &self.store.snapshot(), &self.source_label)
    }
}

// ============================================================================
// Receiver Loop
// ============================================================================

/// Blocking receive loop. Runs on the dedicated receiver thread until the
/// stop flag is set or the source fails.
fn run_receive_loop(
    mut source: Box<dyn ByteSource>,
    store: Arc<PacketStore>,
    observer: Arc<dyn SessionObserver>,
    stop_flag: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
    label: String,
) {
    let mut framer = SilenceFramer::new();

    let reason = loop {
        // Re-checked after every read attempt; worst-case stop latency is
        // one timeout interval.
        if stop_flag.load(Ordering::Relaxed) {
            break SessionEndReason::Stopped;
        }

        match source.read_byte() {
            Ok(ReadOutcome::Byte(byte)) => framer.push(byte),
            Ok(ReadOutcome::TimedOut) => {
                if let Some(packet) = framer.on_silence() {
                    store.append(packet.clone());
                    observer.on_packet_framed(&packet);
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                tlog!("[capture:{}] Device disconnected", label);
                break SessionEndReason::Disconnected;
            }
            Err(e) => {
                tlog!("[capture:{}] Read error: {}", label, e);
                break SessionEndReason::ReadError(e.to_string());
            }
        }
    };

    // A hard failure flushes the partial frame as a final packet; a
    // requested stop discards it.
    if reason != SessionEndReason::Stopped {
        if let Some(packet) = framer.flush() {
            store.append(packet.clone());
            observer.on_packet_framed(&packet);
        }
    }

    // Close the device before the session is reported over.
    drop(source);

    tlog!("[capture:{}] Session ended ({})", label, reason.as_str());
    observer.on_session_ended(&reason);
    *state.lock().unwrap() = SessionState::Idle;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::{Duration, Instant};

    /// Replays a fixed script of read outcomes, then reports end-of-stream.
    struct ScriptedSource {
        script: VecDeque<io::Result<ReadOutcome>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<io::Result<ReadOutcome>>) -> Self {
            ScriptedSource {
                script: script.into(),
            }
        }
    }

    impl ByteSource for ScriptedSource {
        fn read_byte(&mut self) -> io::Result<ReadOutcome> {
            self.script.pop_front().unwrap_or_else(|| {
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "device disconnected",
                ))
            })
        }

        fn write_bytes(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }
    }

    /// Times out forever, pacing each read like a real port would.
    struct IdleSource {
        read_timeout: Duration,
    }

    impl ByteSource for IdleSource {
        fn read_byte(&mut self) -> io::Result<ReadOutcome> {
            std::thread::sleep(self.read_timeout);
            Ok(ReadOutcome::TimedOut)
        }

        fn write_bytes(&mut self, _bytes: &[u8]) -> io::Result<()> {
            Ok(())
        }
    }

    /// Records callbacks for assertions.
    #[derive(Default)]
    struct RecordingObserver {
        packets: Mutex<Vec<Packet>>,
        ended: Mutex<Option<SessionEndReason>>,
    }

    impl SessionObserver for RecordingObserver {
        fn on_packet_framed(&self, packet: &Packet) {
            self.packets.lock().unwrap().push(packet.clone());
        }

        fn on_session_ended(&self, reason: &SessionEndReason) {
            *self.ended.lock().unwrap() = Some(reason.clone());
        }
    }

    fn byte(b: u8) -> io::Result<ReadOutcome> {
        Ok(ReadOutcome::Byte(b))
    }

    fn timeout() -> io::Result<ReadOutcome> {
        Ok(ReadOutcome::TimedOut)
    }

    #[test]
    fn test_end_to_end_single_packet_then_auto_end() {
        let observer = Arc::new(RecordingObserver::default());
        let controller = SessionController::new("XBEE3", observer.clone());

        let script = vec![
            byte(0x41),
            byte(0x42),
            timeout(),
            timeout(),
            timeout(),
            timeout(),
            timeout(),
            // Script exhaustion reads as a disconnect.
        ];
        controller
            .start(move || Ok(Box::new(ScriptedSource::new(script)) as Box<dyn ByteSource>))
            .unwrap();
        controller.join();

        assert_eq!(controller.state(), SessionState::Idle);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].payload, vec![0x41, 0x42]);

        let observed = observer.packets.lock().unwrap();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].payload, vec![0x41, 0x42]);
        assert_eq!(
            *observer.ended.lock().unwrap(),
            Some(SessionEndReason::Disconnected)
        );
    }

    #[test]
    fn test_groups_separated_by_silence_become_separate_packets() {
        let observer = Arc::new(RecordingObserver::default());
        let controller = SessionController::new("XBEE3", observer);

        let script = vec![
            byte(0x01),
            byte(0x02),
            timeout(),
            byte(0x03),
            timeout(),
            timeout(),
            byte(0x04),
            byte(0x05),
            byte(0x06),
            timeout(),
        ];
        controller
            .start(move || Ok(Box::new(ScriptedSource::new(script)) as Box<dyn ByteSource>))
            .unwrap();
        controller.join();

        let payloads: Vec<Vec<u8>> = controller.snapshot().into_iter().map(|p| p.payload).collect();
        assert_eq!(
            payloads,
            vec![vec![0x01, 0x02], vec![0x03], vec![0x04, 0x05, 0x06]]
        );
    }

    #[test]
    fn test_hard_error_flushes_partial_packet() {
        let observer = Arc::new(RecordingObserver::default());
        let controller = SessionController::new("XBEE3", observer.clone());

        let script = vec![
            byte(0xAA),
            byte(0xBB),
            Err(io::Error::new(io::ErrorKind::Other, "bus fault")),
        ];
        controller
            .start(move || Ok(Box::new(ScriptedSource::new(script)) as Box<dyn ByteSource>))
            .unwrap();
        controller.join();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].payload, vec![0xAA, 0xBB]);
        assert!(matches!(
            *observer.ended.lock().unwrap(),
            Some(SessionEndReason::ReadError(_))
        ));
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_start_while_running_fails_fast() {
        struct Quiet;
        impl SessionObserver for Quiet {}

        let controller = SessionController::new("XBEE3", Arc::new(Quiet));
        controller
            .start(|| {
                Ok(Box::new(IdleSource {
                    read_timeout: Duration::from_millis(10),
                }) as Box<dyn ByteSource>)
            })
            .unwrap();

        let second = controller.start(|| {
            Ok(Box::new(IdleSource {
                read_timeout: Duration::from_millis(10),
            }) as Box<dyn ByteSource>)
        });
        assert!(matches!(second, Err(SessionError::AlreadyRunning)));

        controller.stop();
        controller.join();
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_open_failure_leaves_controller_idle() {
        struct Quiet;
        impl SessionObserver for Quiet {}

        let controller = SessionController::new("XBEE3", Arc::new(Quiet));
        let result = controller.start(|| {
            Err(SessionError::DeviceUnavailable {
                port: "COM6".to_string(),
                reason: "no such device".to_string(),
            })
        });
        assert!(matches!(
            result,
            Err(SessionError::DeviceUnavailable { .. })
        ));
        assert_eq!(controller.state(), SessionState::Idle);

        // The controller is still usable afterwards.
        controller
            .start(|| Ok(Box::new(ScriptedSource::new(vec![])) as Box<dyn ByteSource>))
            .unwrap();
        controller.join();
    }

    #[test]
    fn test_stop_then_join_bounded_by_timeout_interval() {
        struct Quiet;
        impl SessionObserver for Quiet {}

        let read_timeout = Duration::from_millis(50);
        let controller = SessionController::new("XBEE3", Arc::new(Quiet));
        controller
            .start(move || Ok(Box::new(IdleSource { read_timeout }) as Box<dyn ByteSource>))
            .unwrap();

        std::thread::sleep(Duration::from_millis(20));
        let begin = Instant::now();
        controller.stop();
        controller.join();

        // One timeout interval plus scheduling slack.
        assert!(begin.elapsed() < Duration::from_secs(1));
        assert_eq!(controller.state(), SessionState::Idle);
    }

    #[test]
    fn test_stop_is_idempotent_and_noop_while_idle() {
        struct Quiet;
        impl SessionObserver for Quiet {}

        let controller = SessionController::new("XBEE3", Arc::new(Quiet));
        controller.stop();
        controller.stop();
        controller.join();
        assert_eq!(controller.state(), SessionState::Idle);

        // A stale stop request does not poison the next session.
        controller
            .start(|| {
                Ok(Box::new(ScriptedSource::new(vec![byte(0x01), timeout()]))
                    as Box<dyn ByteSource>)
            })
            .unwrap();
        controller.join();
        assert_eq!(controller.count(), 1);
    }

    #[test]
    fn test_reset_clears_log_only_between_sessions() {
        struct Quiet;
        impl SessionObserver for Quiet {}

        let controller = SessionController::new("XBEE3", Arc::new(Quiet));
        controller
            .start(|| {
                Ok(Box::new(ScriptedSource::new(vec![byte(0xE1), timeout()]))
                    as Box<dyn ByteSource>)
            })
            .unwrap();
        controller.join();
        assert_eq!(controller.count(), 1);

        controller.reset().unwrap();
        assert_eq!(controller.count(), 0);

        controller
            .start(|| {
                Ok(Box::new(IdleSource {
                    read_timeout: Duration::from_millis(10),
                }) as Box<dyn ByteSource>)
            })
            .unwrap();
        assert!(matches!(
            controller.reset(),
            Err(SessionError::AlreadyRunning)
        ));
        controller.stop();
        controller.join();
    }

    #[test]
    fn test_generate_report_matches_legacy_stats() {
        let observer = Arc::new(RecordingObserver::default());
        let controller = SessionController::new("XBEE3", observer.clone());

        let script = vec![
            byte(0xE1),
            byte(0x02),
            timeout(),
            byte(0xAA),
            byte(0xE1),
            byte(0xE1),
            timeout(),
            timeout(),
        ];
        controller
            .start(move || Ok(Box::new(ScriptedSource::new(script)) as Box<dyn ByteSource>))
            .unwrap();
        controller.join();

        let report = controller.generate_report();
        assert!(report.contains("Quantidade de Erros de Pacote: 3"));
        assert!(report.contains("Quantidade de Linhas: 3"));
        assert!(report.contains(" - XBEE3: E1 02\n"));
        assert!(report.contains(" - XBEE3: AA E1 E1\n"));
    }
}
