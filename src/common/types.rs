//! Shared types used across the application.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

/// A person known to the bridge, keyed by one or both network identities.
///
/// At least one of `remote_id`/`local_id` is set at construction; once
/// both are set they never change for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    /// Stable remote-network user id.
    pub remote_id: Option<String>,
    /// Matrix user id (`@localpart:domain`).
    pub local_id: Option<String>,
}

impl Person {
    /// A fully linked person with both identities known.
    pub fn linked(remote_id: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            remote_id: Some(remote_id.into()),
            local_id: Some(local_id.into()),
        }
    }
}

/// A bridged conversation, fully resolved on both networks.
///
/// `is_direct` and `participants` are derived from remote metadata and
/// immutable once fetched; there is no live membership sync.
#[derive(Debug, Clone)]
pub struct Room {
    /// Remote-network thread id.
    pub remote_id: String,
    /// Matrix room id (`!opaque:domain`).
    pub local_id: String,
    /// Full canonical alias (`#localpart:domain`).
    pub local_alias: String,
    pub display_name: String,
    pub topic: String,
    /// One-to-one vs multi-party.
    pub is_direct: bool,
    /// Remote user ids of the thread members. Membership only, no
    /// ordering meaning.
    pub participants: HashSet<String>,
}

/// Kind of remote-network thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadKind {
    /// One-to-one conversation.
    Direct,
    /// Multi-party conversation.
    Group,
}

impl ThreadKind {
    /// Parse a thread kind from its wire representation.
    ///
    /// Returns `None` for kinds the bridge does not model (pages,
    /// marketplace threads, and whatever the remote network adds next);
    /// the caller decides how to reject those.
    pub fn from_wire(kind: &str) -> Option<Self> {
        match kind {
            "direct" | "user" => Some(Self::Direct),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

/// Kind of inbound remote-network event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEventKind {
    Message,
    Typing,
    ReadReceipt,
    Presence,
    /// Anything the listener does not recognize. Carried so the router
    /// can log what it dropped.
    Other,
}

impl RemoteEventKind {
    pub fn from_wire(kind: &str) -> Self {
        match kind {
            "message" => Self::Message,
            "typing" => Self::Typing,
            "read_receipt" => Self::ReadReceipt,
            "presence" => Self::Presence,
            _ => Self::Other,
        }
    }
}

/// An inbound event from the remote network.
#[derive(Debug, Clone)]
pub struct RemoteEvent {
    pub kind: RemoteEventKind,
    /// Remote user id of the author.
    pub author_id: String,
    /// Remote thread id the event belongs to.
    pub thread_id: String,
    /// Thread kind as reported on the event itself. A hint only; the
    /// resolver trusts fetched metadata, not this field.
    pub thread_kind: Option<ThreadKind>,
    pub timestamp: DateTime<Utc>,
    /// Message body; `None` for non-message events.
    pub text: Option<String>,
}

/// An inbound event from the Matrix side.
#[derive(Debug, Clone)]
pub enum LocalEvent {
    /// An `m.room.message` text event.
    Message {
        event_id: String,
        room_id: String,
        sender: String,
        body: String,
    },
    /// An `m.room.member` invite state event.
    Invite {
        room_id: String,
        sender: String,
        /// The invited user (the event's state key).
        target: String,
    },
}
