//! Configuration type definitions.

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub matrix: MatrixConfig,
    pub messenger: MessengerConfig,
    pub bridge: Option<BridgeConfig>,
    pub namespaces: Option<NamespacesConfig>,
}

/// Matrix homeserver connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MatrixConfig {
    /// Homeserver base URL, e.g. `http://127.0.0.1:8008`.
    pub base_url: String,
    /// Server name used in user ids and aliases.
    pub domain: String,
    /// Application service token presented to the homeserver.
    pub as_token: String,
    /// Localpart of the one real user this bridge puppets for.
    pub linked_user: String,
}

/// Remote messenger connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MessengerConfig {
    /// Remote API base URL.
    pub base_url: String,
    /// Remote user id of the bridged account.
    pub owner_id: String,
    /// Session token obtained out of band.
    pub session_token: String,
    /// Long-poll timeout in seconds.
    pub poll_timeout_secs: Option<u64>,
}

/// Bridge behavior settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct BridgeConfig {
    /// Namespace prefix for puppet user ids and room aliases.
    pub prefix: Option<String>,
    /// Default bound on cross-runtime calls, in seconds.
    pub call_timeout_secs: Option<u64>,
    /// Whether to maintain the protocol/debug room.
    pub protocol_room: Option<bool>,
}

/// Appservice namespace regexes, as registered with the homeserver.
///
/// When absent, patterns are derived from the prefix and owner id.
#[derive(Debug, Clone, Deserialize)]
pub struct NamespacesConfig {
    pub users: Option<Vec<String>>,
    pub aliases: Option<Vec<String>>,
}

impl Config {
    /// Effective namespace prefix.
    pub fn prefix(&self) -> &str {
        self.bridge
            .as_ref()
            .and_then(|b| b.prefix.as_deref())
            .unwrap_or("msgr")
    }

    /// Full Matrix id of the linked user.
    pub fn linked_user_id(&self) -> String {
        format!("@{}:{}", self.matrix.linked_user, self.matrix.domain)
    }

    /// Whether the protocol room is enabled.
    pub fn protocol_room_enabled(&self) -> bool {
        self.bridge
            .as_ref()
            .and_then(|b| b.protocol_room)
            .unwrap_or(true)
    }
}
