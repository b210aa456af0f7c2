//! The protocol/debug room.
//!
//! A dedicated room where the bridge reports what it is doing and
//! takes commands from the linked user. Resolved or created once at
//! startup; a forwarder task drains posted notes into it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::common::error::{DirectoryError, DirectoryResult};
use crate::directory::local::{LocalDirectory, RoomSpec, RoomVisibility};
use crate::identity::alias::IdScheme;

/// Resolve the protocol room, creating it on first run.
pub async fn ensure_protocol_room(
    local: &Arc<dyn LocalDirectory>,
    scheme: &IdScheme,
    linked_user: &str,
) -> DirectoryResult<String> {
    let alias = scheme.protocol_room_alias();
    match local.resolve_alias_to_id(&alias).await {
        Ok(room_id) => {
            info!(alias = %alias, room = %room_id, "protocol room already exists");
            Ok(room_id)
        }
        Err(DirectoryError::NotFound { .. }) => {
            let spec = RoomSpec {
                alias_localpart: scheme.protocol_room_alias_localpart(),
                visibility: RoomVisibility::Private,
                display_name: "Messenger".to_string(),
                topic: "Protocol & debug info for the messenger bridge".to_string(),
                is_direct: false,
                invitee_ids: vec![linked_user.to_string()],
            };
            let room_id = local.create_room(&spec).await?;
            info!(alias = %alias, room = %room_id, "created protocol room");
            Ok(room_id)
        }
        Err(err) => Err(err),
    }
}

/// Handle for posting operator-visible notes.
///
/// Only notes worth an operator's attention belong here (INFO and
/// above). The forwarder's own send produces DEBUG logs; feeding those
/// back in would loop forever.
#[derive(Clone)]
pub struct RoomLogger {
    tx: mpsc::UnboundedSender<String>,
}

impl RoomLogger {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Queue a note for the protocol room. Never blocks; silently a
    /// no-op once the forwarder is gone.
    pub fn post(&self, line: impl Into<String>) {
        let _ = self.tx.send(line.into());
    }
}

/// Drain queued notes into the protocol room as bot messages.
///
/// Runs on the event loop until the channel closes.
pub async fn forward_to_room(
    local: Arc<dyn LocalDirectory>,
    room_id: String,
    mut rx: mpsc::UnboundedReceiver<String>,
) {
    while let Some(line) = rx.recv().await {
        if let Err(err) = local.send_text(&room_id, &line).await {
            warn!(room = %room_id, error = %err, "failed to post to protocol room");
        }
    }
    info!("protocol room forwarder stopped");
}
