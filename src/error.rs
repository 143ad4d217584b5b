// src/error.rs
//
// Session error taxonomy.
// Every failure either ends the current start attempt or ends the session;
// there is no retry policy anywhere in the capture core.

use thiserror::Error;

/// Errors surfaced by session control operations.
///
/// Read failures during an active session are not represented here: they
/// terminate the session and arrive through
/// [`SessionObserver::on_session_ended`](crate::session::SessionObserver).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The serial device could not be opened. The start attempt fails
    /// synchronously and the controller stays idle.
    #[error("failed to open {port}: {reason}")]
    DeviceUnavailable { port: String, reason: String },

    /// A capture session is already active on this controller.
    #[error("a capture session is already running")]
    AlreadyRunning,
}
