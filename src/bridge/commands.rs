//! Protocol-room commands (!echo, !status).
//!
//! Only messages from the linked user in the protocol room reach this
//! handler. Commands are an explicit allowlist; there is no free-form
//! evaluation.

use std::sync::Arc;

use tracing::info;

use crate::common::error::DirectoryResult;
use crate::directory::local::LocalDirectory;
use crate::identity::store::IdentityStore;

/// Commands understood in the protocol room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Repeat the arguments back.
    Echo(String),
    /// Report cache sizes and liveness.
    Status,
    /// List available commands.
    Help,
}

impl Command {
    /// Parse a message body into a command.
    ///
    /// Returns `None` for anything that is not a command; such
    /// messages fall through to normal routing.
    pub fn parse(body: &str) -> Option<Self> {
        if body.len() > 200 || !body.starts_with('!') {
            return None;
        }
        let mut parts = body[1..].splitn(2, ' ');
        let name = parts.next()?.to_lowercase();
        let args = parts.next().map(str::trim).unwrap_or_default();

        match name.as_str() {
            "echo" => Some(Self::Echo(args.to_string())),
            "status" => Some(Self::Status),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// Executes protocol-room commands and posts the responses.
pub struct CommandHandler {
    local: Arc<dyn LocalDirectory>,
    store: Arc<IdentityStore>,
    protocol_room_id: String,
}

impl CommandHandler {
    pub fn new(
        local: Arc<dyn LocalDirectory>,
        store: Arc<IdentityStore>,
        protocol_room_id: String,
    ) -> Self {
        Self {
            local,
            store,
            protocol_room_id,
        }
    }

    /// Handle a protocol-room message.
    ///
    /// Returns `true` if the message was a command and has been
    /// answered.
    pub async fn handle(&self, body: &str) -> DirectoryResult<bool> {
        let Some(command) = Command::parse(body) else {
            return Ok(false);
        };
        info!(?command, "running protocol-room command");

        let response = match command {
            Command::Echo(text) => text,
            Command::Status => {
                let stats = self.store.stats();
                format!(
                    "bridge up; {} people and {} rooms cached",
                    stats.people, stats.rooms
                )
            }
            Command::Help => "Available commands: !echo <text>, !status, !help".to_string(),
        };

        self.local
            .send_text(&self.protocol_room_id, &response)
            .await?;
        Ok(true)
    }
}
