//! Event-loop-side intake.
//!
//! Drains inbound Matrix events and hands each one to the right
//! consumer: the invite acceptor, the protocol-room command handler,
//! or the message router.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::bridge::commands::CommandHandler;
use crate::bridge::router::{Disposition, MessageRouter};
use crate::common::types::LocalEvent;
use crate::matrix::acceptor::InviteAcceptor;

pub struct Orchestrator {
    router: Arc<MessageRouter>,
    acceptor: InviteAcceptor,
    commands: Option<CommandHandler>,
    protocol_room_id: Option<String>,
    /// Full Matrix id of the linked account.
    linked_user: String,
}

impl Orchestrator {
    pub fn new(
        router: Arc<MessageRouter>,
        acceptor: InviteAcceptor,
        commands: Option<CommandHandler>,
        protocol_room_id: Option<String>,
        linked_user: String,
    ) -> Self {
        Self {
            router,
            acceptor,
            commands,
            protocol_room_id,
            linked_user,
        }
    }

    /// Drain inbound Matrix events until shutdown or the transport
    /// closes its end.
    pub async fn run(
        self,
        mut local_rx: mpsc::UnboundedReceiver<LocalEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                event = local_rx.recv() => {
                    match event {
                        Some(event) => self.dispatch(event).await,
                        None => {
                            info!("local event intake closed");
                            break;
                        }
                    }
                }
            }
        }
        info!("orchestrator stopped");
    }

    async fn dispatch(&self, event: LocalEvent) {
        match event {
            LocalEvent::Invite {
                room_id,
                sender,
                target,
            } => match self.acceptor.handle_invite(&room_id, &sender, &target).await {
                Ok(true) => {}
                Ok(false) => debug!(room = %room_id, target = %target, "ignored invite"),
                Err(err) => warn!(
                    room = %room_id,
                    target = %target,
                    error = %err,
                    "failed to handle invite"
                ),
            },
            LocalEvent::Message {
                event_id,
                room_id,
                sender,
                body,
            } => {
                if self.is_protocol_command_context(&room_id, &sender) {
                    if let Some(commands) = &self.commands {
                        match commands.handle(&body).await {
                            Ok(true) => return,
                            Ok(false) => {}
                            Err(err) => {
                                warn!(error = %err, "protocol-room command failed");
                                return;
                            }
                        }
                    }
                    // Plain chatter in the protocol room is not bridged.
                    return;
                }

                let disposition = self
                    .router
                    .handle_local_message(&event_id, &room_id, &sender, &body)
                    .await;
                match disposition {
                    Disposition::Delivered => {}
                    Disposition::Dropped(reason) => {
                        debug!(event = %event_id, ?reason, "local message dropped")
                    }
                    Disposition::Failed(_) => {
                        // Already logged with full context by the router.
                    }
                }
            }
        }
    }

    fn is_protocol_command_context(&self, room_id: &str, sender: &str) -> bool {
        self.protocol_room_id.as_deref() == Some(room_id) && sender == self.linked_user
    }
}
