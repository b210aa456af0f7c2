//! Remote-network directory boundary.
//!
//! Everything the bridge needs from the remote chat service, behind
//! traits so the resolution core never sees wire details.

use async_trait::async_trait;

use crate::common::error::DirectoryResult;
use crate::common::types::{RemoteEvent, ThreadKind};

/// Canonical metadata for a remote thread.
///
/// The thread kind is interpreted exactly once, at the boundary that
/// produces this struct; unmodeled kinds never get this far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMetadata {
    pub kind: ThreadKind,
    pub display_name: String,
    pub topic: String,
    /// Remote user ids of the thread members.
    pub participant_ids: Vec<String>,
}

/// Async view of the remote network, usable from the event loop.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// Fetch canonical metadata for a thread.
    ///
    /// Errors: `NotFound` for invalid/inaccessible ids,
    /// `RemoteUnavailable` on transient failure (caller may retry),
    /// `UnsupportedKind` for thread types the bridge does not model.
    async fn fetch_thread_metadata(&self, remote_id: &str) -> DirectoryResult<ThreadMetadata>;

    /// Deliver a text message into a remote thread.
    ///
    /// The remote client is session-bound to the worker thread, so
    /// implementations hand the message over rather than sending
    /// in-place.
    async fn send_text(&self, thread_id: &str, text: &str) -> DirectoryResult<()>;
}

/// Blocking, session-bound remote client driven by the worker thread.
pub trait RemoteSession: Send {
    /// Block until the next batch of inbound events (or a poll timeout,
    /// which yields an empty batch).
    fn poll_events(&mut self) -> DirectoryResult<Vec<RemoteEvent>>;

    /// Deliver a text message into a remote thread.
    fn send_text(&mut self, thread_id: &str, text: &str) -> DirectoryResult<()>;
}
