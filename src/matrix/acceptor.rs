//! Invite auto-acceptance.
//!
//! Invites to or from appservice-namespace users into bridge-owned
//! rooms are accepted immediately; chasing them by hand does not
//! scale past the first conversation. Everything else is left alone.

use std::sync::Arc;

use tracing::{debug, info};

use crate::bridge::filter::NamespaceMatcher;
use crate::common::error::{DirectoryError, DirectoryResult};
use crate::directory::local::LocalDirectory;

pub struct InviteAcceptor {
    local: Arc<dyn LocalDirectory>,
    namespaces: Arc<NamespaceMatcher>,
    /// Full Matrix id of the appservice bot.
    bot_user: String,
}

impl InviteAcceptor {
    pub fn new(
        local: Arc<dyn LocalDirectory>,
        namespaces: Arc<NamespaceMatcher>,
        bot_user: String,
    ) -> Self {
        Self {
            local,
            namespaces,
            bot_user,
        }
    }

    /// Handle one invite membership event.
    ///
    /// Returns `true` if the invite was accepted, `false` if it was
    /// outside the bridge's namespaces and ignored.
    pub async fn handle_invite(
        &self,
        room_id: &str,
        sender: &str,
        target: &str,
    ) -> DirectoryResult<bool> {
        info!(target = %target, room = %room_id, sender = %sender, "invite received");

        if !self.namespaces.matches_user(target) {
            // Invites to users outside the namespace should not even
            // reach the appservice.
            debug!(target = %target, "invite target outside user namespace");
            return Ok(false);
        }
        if sender != self.bot_user && !self.namespaces.matches_user(sender) {
            debug!(sender = %sender, "invite sender outside user namespace");
            return Ok(false);
        }

        let alias = match self.local.get_canonical_alias(room_id).await {
            Ok(alias) => alias,
            Err(DirectoryError::NotFound { .. }) => {
                debug!(room = %room_id, "invited room has no canonical alias");
                return Ok(false);
            }
            Err(err) => return Err(err),
        };
        if !self.namespaces.matches_alias(&alias) {
            debug!(alias = %alias, "invited room outside alias namespace");
            return Ok(false);
        }

        info!(target = %target, alias = %alias, room = %room_id, "accepting invite");
        self.local.ensure_joined(target, room_id).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::mock::MockLocalDirectory;
    use crate::identity::alias::IdScheme;

    const LINKED: &str = "@alice:example.org";

    fn acceptor(local: Arc<MockLocalDirectory>) -> InviteAcceptor {
        let scheme = IdScheme::new("msgr", "O", "example.org");
        let (users, aliases) = NamespaceMatcher::default_patterns(&scheme, LINKED);
        InviteAcceptor::new(
            local,
            Arc::new(NamespaceMatcher::new(users, aliases)),
            scheme.bot_user_id(),
        )
    }

    #[tokio::test]
    async fn test_accepts_in_namespace_invite() {
        let local = Arc::new(MockLocalDirectory::new("example.org"));
        local.insert_room("#msgr_O_T1:example.org", "!r1:example.org");
        let acceptor = acceptor(local.clone());

        let accepted = acceptor
            .handle_invite(
                "!r1:example.org",
                "@msgr_O:example.org",
                "@msgr_O_A:example.org",
            )
            .await
            .unwrap();

        assert!(accepted);
        assert_eq!(
            local.joined(),
            vec![(
                "@msgr_O_A:example.org".to_string(),
                "!r1:example.org".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_accepts_invite_to_linked_user() {
        let local = Arc::new(MockLocalDirectory::new("example.org"));
        local.insert_room("#msgr_O_protocol:example.org", "!proto:example.org");
        let acceptor = acceptor(local.clone());

        let accepted = acceptor
            .handle_invite("!proto:example.org", "@msgr_O:example.org", LINKED)
            .await
            .unwrap();

        assert!(accepted);
    }

    #[tokio::test]
    async fn test_ignores_out_of_namespace_target() {
        let local = Arc::new(MockLocalDirectory::new("example.org"));
        local.insert_room("#msgr_O_T1:example.org", "!r1:example.org");
        let acceptor = acceptor(local.clone());

        let accepted = acceptor
            .handle_invite(
                "!r1:example.org",
                "@msgr_O:example.org",
                "@stranger:example.org",
            )
            .await
            .unwrap();

        assert!(!accepted);
        assert!(local.joined().is_empty());
    }

    #[tokio::test]
    async fn test_ignores_out_of_namespace_sender() {
        let local = Arc::new(MockLocalDirectory::new("example.org"));
        local.insert_room("#msgr_O_T1:example.org", "!r1:example.org");
        let acceptor = acceptor(local.clone());

        let accepted = acceptor
            .handle_invite(
                "!r1:example.org",
                "@stranger:example.org",
                "@msgr_O_A:example.org",
            )
            .await
            .unwrap();

        assert!(!accepted);
        assert!(local.joined().is_empty());
    }

    #[tokio::test]
    async fn test_ignores_room_outside_alias_namespace() {
        let local = Arc::new(MockLocalDirectory::new("example.org"));
        local.insert_room("#book-club:example.org", "!club:example.org");
        let acceptor = acceptor(local.clone());

        let accepted = acceptor
            .handle_invite(
                "!club:example.org",
                "@msgr_O:example.org",
                "@msgr_O_A:example.org",
            )
            .await
            .unwrap();

        assert!(!accepted);
        assert!(local.joined().is_empty());
    }

    #[tokio::test]
    async fn test_ignores_aliasless_room() {
        let local = Arc::new(MockLocalDirectory::new("example.org"));
        let acceptor = acceptor(local.clone());

        let accepted = acceptor
            .handle_invite(
                "!bare:example.org",
                "@msgr_O:example.org",
                "@msgr_O_A:example.org",
            )
            .await
            .unwrap();

        assert!(!accepted);
    }
}
