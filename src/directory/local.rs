//! Local-network (Matrix) directory boundary.

use async_trait::async_trait;

use crate::common::error::DirectoryResult;

/// Room directory visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomVisibility {
    Private,
    Public,
}

/// Request to provision a room on the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSpec {
    /// Alias localpart: the part between `#` and `:`, non-inclusive.
    pub alias_localpart: String,
    pub visibility: RoomVisibility,
    pub display_name: String,
    pub topic: String,
    pub is_direct: bool,
    /// Full user ids to invite at creation.
    pub invitee_ids: Vec<String>,
}

/// Async view of the Matrix homeserver, usable from the event loop.
///
/// All operations are remote calls and may fail with `Unauthorized`,
/// `NotFound`, `Conflict` (alias taken by a differently-provenanced
/// room), or `LocalUnavailable` (transient).
#[async_trait]
pub trait LocalDirectory: Send + Sync {
    /// Resolve a full room alias (`#localpart:domain`) to a room id.
    async fn resolve_alias_to_id(&self, alias: &str) -> DirectoryResult<String>;

    /// Create a room, returning its id.
    async fn create_room(&self, spec: &RoomSpec) -> DirectoryResult<String>;

    /// Send a text message as the bridge bot. Returns the event id.
    async fn send_text(&self, room_id: &str, text: &str) -> DirectoryResult<String>;

    /// Send a text message impersonating a puppet user. Returns the
    /// event id.
    async fn send_text_as(
        &self,
        user_id: &str,
        room_id: &str,
        text: &str,
    ) -> DirectoryResult<String>;

    /// Join a user into a room; success if already joined.
    async fn ensure_joined(&self, user_id: &str, room_id: &str) -> DirectoryResult<()>;

    /// Fetch a room's canonical alias. `NotFound` if it has none.
    async fn get_canonical_alias(&self, room_id: &str) -> DirectoryResult<String>;
}
