//! Canonical message types for channel communication between the
//! event loop and the remote-network worker.

/// A text message to deliver on the remote network.
///
/// Produced on the event-loop thread, drained by the worker between
/// polls: the remote client is session-bound and must not be driven
/// from the loop thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSend {
    /// Remote thread id to deliver into.
    pub thread_id: String,
    /// Plain-text body.
    pub text: String,
}
