//! Identity resolution across the two networks.
//!
//! Produces fully resolved `Person`/`Room` records given either side's
//! identifier, provisioning the missing side exactly once. All
//! provisioning funnels through the remote-id path so the by-local and
//! by-remote routes can never create divergent duplicate rooms.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::common::error::{DirectoryError, DirectoryResult};
use crate::common::types::{Person, Room, ThreadKind};
use crate::directory::local::{LocalDirectory, RoomSpec, RoomVisibility};
use crate::directory::remote::{RemoteDirectory, ThreadMetadata};
use crate::identity::alias::IdScheme;
use crate::identity::store::IdentityStore;

pub struct IdentityResolver {
    store: Arc<IdentityStore>,
    remote: Arc<dyn RemoteDirectory>,
    local: Arc<dyn LocalDirectory>,
    scheme: IdScheme,
    /// Full Matrix id of the one real user this bridge puppets for.
    linked_user: String,
}

impl IdentityResolver {
    pub fn new(
        store: Arc<IdentityStore>,
        remote: Arc<dyn RemoteDirectory>,
        local: Arc<dyn LocalDirectory>,
        scheme: IdScheme,
        linked_user: String,
    ) -> Self {
        Self {
            store,
            remote,
            local,
            scheme,
            linked_user,
        }
    }

    pub fn store(&self) -> &IdentityStore {
        &self.store
    }

    pub fn scheme(&self) -> &IdScheme {
        &self.scheme
    }

    /// Resolve a person by their remote user id.
    ///
    /// Puppet ids derive from the remote id alone, so this never makes
    /// a directory round trip.
    pub async fn person_by_remote(&self, remote_id: &str) -> DirectoryResult<Arc<Person>> {
        self.store
            .get_or_create_person_by_remote(remote_id, async {
                let local_id = if remote_id == self.scheme.owner_id() {
                    self.linked_user.clone()
                } else {
                    self.scheme.puppet_user_id(remote_id)
                };
                Ok(Person::linked(remote_id, local_id))
            })
            .await
    }

    /// Resolve a person by their Matrix user id.
    pub async fn person_by_local(&self, local_id: &str) -> DirectoryResult<Arc<Person>> {
        if local_id == self.linked_user {
            let owner = self.scheme.owner_id().to_string();
            return self.person_by_remote(&owner).await;
        }
        match self.scheme.parse_puppet_user_id(local_id) {
            Some((owner, remote_id)) if owner == self.scheme.owner_id() => {
                self.person_by_remote(&remote_id).await
            }
            Some((owner, _)) => Err(DirectoryError::IdentityConflict {
                message: format!(
                    "puppet '{}' belongs to account '{}', not '{}'",
                    local_id,
                    owner,
                    self.scheme.owner_id()
                ),
            }),
            None => Err(DirectoryError::NotFound {
                id: local_id.to_string(),
            }),
        }
    }

    /// Resolve a room by its remote thread id, provisioning the Matrix
    /// side on first sight.
    pub async fn room_by_remote(&self, remote_id: &str) -> DirectoryResult<Arc<Room>> {
        self.store
            .get_or_create_room_by_remote(remote_id, self.build_room(remote_id))
            .await
    }

    /// Resolve a room by its Matrix room id.
    ///
    /// Extracts the remote thread id from the room's canonical alias
    /// and delegates to [`room_by_remote`](Self::room_by_remote).
    pub async fn room_by_local(&self, local_id: &str) -> DirectoryResult<Arc<Room>> {
        if let Some(hit) = self.store.room_by_local(local_id) {
            return Ok(hit);
        }

        let alias = self.local.get_canonical_alias(local_id).await?;
        let (owner, remote_id) =
            self.scheme
                .parse_room_alias(&alias)
                .ok_or_else(|| DirectoryError::IdentityConflict {
                    message: format!(
                        "room {} has canonical alias '{}' outside the bridge naming scheme",
                        local_id, alias
                    ),
                })?;
        if owner != self.scheme.owner_id() {
            return Err(DirectoryError::IdentityConflict {
                message: format!(
                    "alias '{}' belongs to account '{}', not '{}'",
                    alias,
                    owner,
                    self.scheme.owner_id()
                ),
            });
        }

        let room = self.room_by_remote(&remote_id).await?;
        if room.local_id != local_id {
            return Err(DirectoryError::IdentityConflict {
                message: format!(
                    "alias '{}' resolves to {} but was looked up via {}",
                    alias, room.local_id, local_id
                ),
            });
        }
        Ok(room)
    }

    /// Factory for the remote-id path: fetch metadata, find or create
    /// the Matrix room, assemble the record.
    async fn build_room(&self, remote_id: &str) -> DirectoryResult<Room> {
        let meta = self.remote.fetch_thread_metadata(remote_id).await?;
        let alias = self.scheme.room_alias(remote_id);

        let local_id = match self.local.resolve_alias_to_id(&alias).await {
            Ok(id) => {
                debug!(thread = remote_id, alias = %alias, room = %id, "found existing room");
                id
            }
            Err(DirectoryError::NotFound { .. }) => {
                self.provision_room(remote_id, &meta, &alias).await?
            }
            Err(err) => return Err(err),
        };

        let is_direct = match meta.kind {
            ThreadKind::Direct => true,
            ThreadKind::Group => false,
        };

        Ok(Room {
            remote_id: remote_id.to_string(),
            local_id,
            local_alias: alias,
            display_name: meta.display_name,
            topic: meta.topic,
            is_direct,
            participants: meta.participant_ids.into_iter().collect::<HashSet<_>>(),
        })
    }

    async fn provision_room(
        &self,
        remote_id: &str,
        meta: &ThreadMetadata,
        alias: &str,
    ) -> DirectoryResult<String> {
        // Mutually recursive with person resolution; safe because the
        // person path never resolves rooms.
        let mut invitees = Vec::new();
        for participant in &meta.participant_ids {
            let person = self.person_by_remote(participant).await?;
            if let Some(local_id) = &person.local_id {
                if local_id != &self.linked_user && !invitees.contains(local_id) {
                    invitees.push(local_id.clone());
                }
            }
        }
        invitees.push(self.linked_user.clone());

        let spec = RoomSpec {
            alias_localpart: self.scheme.room_alias_localpart(remote_id),
            visibility: RoomVisibility::Private,
            display_name: meta.display_name.clone(),
            topic: meta.topic.clone(),
            is_direct: meta.kind == ThreadKind::Direct,
            invitee_ids: invitees,
        };
        let room_id = self.local.create_room(&spec).await?;
        info!(
            thread = remote_id,
            alias = %alias,
            room = %room_id,
            invitees = spec.invitee_ids.len(),
            "provisioned room"
        );
        Ok(room_id)
    }
}
