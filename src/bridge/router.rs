//! Message routing between the two networks.
//!
//! Every inbound event is classified into an explicit disposition:
//! `Received -> Identified -> Routed -> Delivered | Dropped | Failed`.
//! Delivery failures are logged and dropped, never retried; a
//! duplicate delivery is worse than a missed one.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use crate::common::error::DirectoryError;
use crate::common::types::{RemoteEvent, RemoteEventKind};
use crate::bridge::filter::NamespaceMatcher;
use crate::directory::local::LocalDirectory;
use crate::directory::remote::RemoteDirectory;
use crate::identity::resolver::IdentityResolver;

/// Terminal state of one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Delivered,
    Dropped(DropReason),
    Failed(DirectoryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Typing notifications, receipts, and other non-message kinds.
    NonMessage,
    /// No body to deliver.
    EmptyBody,
    /// Originated from the bridge itself; delivering would loop.
    BridgeEcho,
    /// Matrix sender is not the one linked account this bridge puppets.
    ForeignSender,
    /// Matrix room with no bridged counterpart.
    UnbridgedRoom,
}

/// Registry of event ids the bridge itself produced on the Matrix
/// side. The sender namespace is the primary provenance marker; this
/// registry backs it up for events the namespace cannot attribute.
#[derive(Debug)]
struct ProvenanceRegistry {
    inner: Mutex<ProvenanceState>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct ProvenanceState {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl ProvenanceRegistry {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(ProvenanceState::default()),
            capacity,
        }
    }

    fn record(&self, event_id: &str) {
        let mut state = self.inner.lock().unwrap();
        if state.seen.insert(event_id.to_string()) {
            state.order.push_back(event_id.to_string());
            while state.order.len() > self.capacity {
                if let Some(evicted) = state.order.pop_front() {
                    state.seen.remove(&evicted);
                }
            }
        }
    }

    fn seen(&self, event_id: &str) -> bool {
        self.inner.lock().unwrap().seen.contains(event_id)
    }
}

pub struct MessageRouter {
    resolver: Arc<IdentityResolver>,
    local: Arc<dyn LocalDirectory>,
    remote: Arc<dyn RemoteDirectory>,
    namespaces: Arc<NamespaceMatcher>,
    /// Full Matrix id of the linked account.
    linked_user: String,
    /// Remote user id of the linked account.
    owner_id: String,
    provenance: ProvenanceRegistry,
}

impl MessageRouter {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        local: Arc<dyn LocalDirectory>,
        remote: Arc<dyn RemoteDirectory>,
        namespaces: Arc<NamespaceMatcher>,
        linked_user: String,
    ) -> Self {
        let owner_id = resolver.scheme().owner_id().to_string();
        Self {
            resolver,
            local,
            remote,
            namespaces,
            linked_user,
            owner_id,
            provenance: ProvenanceRegistry::new(1024),
        }
    }

    /// Route one inbound remote-network event into Matrix.
    ///
    /// Runs on the event loop; the worker submits it through the
    /// cross-runtime bridge.
    pub async fn handle_remote_event(&self, event: RemoteEvent) -> Disposition {
        if event.kind != RemoteEventKind::Message {
            debug!(kind = ?event.kind, thread = %event.thread_id, "dropping non-message event");
            return Disposition::Dropped(DropReason::NonMessage);
        }
        let text = match event.text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => return Disposition::Dropped(DropReason::EmptyBody),
        };
        if event.author_id == self.owner_id {
            // The remote network echoes our own outbound sends back at
            // us as regular events.
            debug!(thread = %event.thread_id, "dropping echo of own remote message");
            return Disposition::Dropped(DropReason::BridgeEcho);
        }

        let person = match self.resolver.person_by_remote(&event.author_id).await {
            Ok(person) => person,
            Err(err) => return self.failed_remote(&event, err),
        };
        let room = match self.resolver.room_by_remote(&event.thread_id).await {
            Ok(room) => room,
            Err(err) => return self.failed_remote(&event, err),
        };
        let puppet = match person.local_id.as_deref() {
            Some(puppet) => puppet,
            None => {
                return self.failed_remote(
                    &event,
                    DirectoryError::IdentityConflict {
                        message: format!("person '{}' has no local identity", event.author_id),
                    },
                )
            }
        };

        if let Err(err) = self.local.ensure_joined(puppet, &room.local_id).await {
            return self.failed_remote(&event, err);
        }
        match self.local.send_text_as(puppet, &room.local_id, text).await {
            Ok(event_id) => {
                self.provenance.record(&event_id);
                info!(
                    author = %event.author_id,
                    thread = %event.thread_id,
                    room = %room.local_id,
                    "delivered remote message"
                );
                Disposition::Delivered
            }
            Err(err) => self.failed_remote(&event, err),
        }
    }

    /// Route one inbound Matrix message out to the remote network.
    ///
    /// Runs on the event loop directly; no cross-runtime hop needed.
    pub async fn handle_local_message(
        &self,
        event_id: &str,
        room_id: &str,
        sender: &str,
        body: &str,
    ) -> Disposition {
        if self.provenance.seen(event_id) {
            debug!(event = %event_id, "dropping echo of own local send");
            return Disposition::Dropped(DropReason::BridgeEcho);
        }
        if self.namespaces.matches_user(sender) && sender != self.linked_user {
            debug!(sender = %sender, "dropping message from bridge-owned sender");
            return Disposition::Dropped(DropReason::BridgeEcho);
        }
        if sender != self.linked_user {
            debug!(sender = %sender, "dropping message from non-linked sender");
            return Disposition::Dropped(DropReason::ForeignSender);
        }
        if body.is_empty() {
            return Disposition::Dropped(DropReason::EmptyBody);
        }

        let room = match self.resolver.room_by_local(room_id).await {
            Ok(room) => room,
            Err(DirectoryError::NotFound { .. }) => {
                debug!(room = %room_id, "message in a room with no bridged counterpart");
                return Disposition::Dropped(DropReason::UnbridgedRoom);
            }
            Err(err) => {
                error!(
                    room = %room_id,
                    sender = %sender,
                    error = %err,
                    "failed to resolve room for outbound message"
                );
                return Disposition::Failed(err);
            }
        };

        match self.remote.send_text(&room.remote_id, body).await {
            Ok(()) => {
                info!(
                    room = %room_id,
                    thread = %room.remote_id,
                    "queued outbound message to remote network"
                );
                Disposition::Delivered
            }
            Err(err) => {
                error!(
                    room = %room_id,
                    thread = %room.remote_id,
                    error = %err,
                    "failed to hand off outbound message"
                );
                Disposition::Failed(err)
            }
        }
    }

    fn failed_remote(&self, event: &RemoteEvent, err: DirectoryError) -> Disposition {
        error!(
            author = %event.author_id,
            thread = %event.thread_id,
            error = %err,
            "failed to deliver remote message"
        );
        Disposition::Failed(err)
    }
}
