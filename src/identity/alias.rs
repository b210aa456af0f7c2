//! Deterministic naming scheme tying remote identifiers to Matrix ones.
//!
//! Aliases and puppet user ids embed `(owner account, remote id)` so
//! the mapping can be re-derived after a restart purely by parsing.
//! The formats are load-bearing: changing them orphans every room and
//! puppet the bridge has ever provisioned.

/// Derives and parses bridge-owned aliases and user ids.
///
/// Alias localparts take the form `<prefix>_<owner>_<remote>`; the
/// localpart is the part between `#` (or `@`) and `:`, non-inclusive.
/// The prefix and owner contain no `_`, so the first two separators
/// are unambiguous and the remote id may itself contain `_`.
#[derive(Debug, Clone)]
pub struct IdScheme {
    prefix: String,
    owner_id: String,
    domain: String,
}

impl IdScheme {
    pub fn new(prefix: &str, owner_id: &str, domain: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            owner_id: owner_id.to_string(),
            domain: domain.to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Localpart of the room alias for a remote thread.
    pub fn room_alias_localpart(&self, remote_thread_id: &str) -> String {
        format!("{}_{}_{}", self.prefix, self.owner_id, remote_thread_id)
    }

    /// Full room alias for a remote thread.
    pub fn room_alias(&self, remote_thread_id: &str) -> String {
        format!(
            "#{}:{}",
            self.room_alias_localpart(remote_thread_id),
            self.domain
        )
    }

    /// Localpart of the puppet user for a remote user.
    pub fn puppet_user_localpart(&self, remote_user_id: &str) -> String {
        format!("{}_{}_{}", self.prefix, self.owner_id, remote_user_id)
    }

    /// Full Matrix id of the puppet user for a remote user.
    pub fn puppet_user_id(&self, remote_user_id: &str) -> String {
        format!(
            "@{}:{}",
            self.puppet_user_localpart(remote_user_id),
            self.domain
        )
    }

    /// Full Matrix id of the appservice bot itself.
    pub fn bot_user_id(&self) -> String {
        format!("@{}_{}:{}", self.prefix, self.owner_id, self.domain)
    }

    /// Localpart of the protocol/debug room alias.
    pub fn protocol_room_alias_localpart(&self) -> String {
        format!("{}_{}_protocol", self.prefix, self.owner_id)
    }

    /// Full alias of the protocol/debug room.
    pub fn protocol_room_alias(&self) -> String {
        format!("#{}:{}", self.protocol_room_alias_localpart(), self.domain)
    }

    /// Parse a full room alias back into `(owner, remote_thread_id)`.
    ///
    /// Returns `None` for aliases on another domain, with another
    /// prefix, or otherwise outside the scheme.
    pub fn parse_room_alias(&self, alias: &str) -> Option<(String, String)> {
        let localpart = alias
            .strip_prefix('#')?
            .strip_suffix(&format!(":{}", self.domain))?;
        self.parse_localpart(localpart)
    }

    /// Parse a full puppet user id back into `(owner, remote_user_id)`.
    pub fn parse_puppet_user_id(&self, user_id: &str) -> Option<(String, String)> {
        let localpart = user_id
            .strip_prefix('@')?
            .strip_suffix(&format!(":{}", self.domain))?;
        self.parse_localpart(localpart)
    }

    fn parse_localpart(&self, localpart: &str) -> Option<(String, String)> {
        let rest = localpart.strip_prefix(&format!("{}_", self.prefix))?;
        let (owner, remote) = rest.split_once('_')?;
        if remote.is_empty() {
            return None;
        }
        Some((owner.to_string(), remote.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> IdScheme {
        IdScheme::new("msgr", "100012345", "example.org")
    }

    #[test]
    fn test_room_alias_format() {
        assert_eq!(
            scheme().room_alias("T1"),
            "#msgr_100012345_T1:example.org"
        );
        assert_eq!(scheme().room_alias_localpart("T1"), "msgr_100012345_T1");
    }

    #[test]
    fn test_puppet_user_format() {
        assert_eq!(
            scheme().puppet_user_id("555"),
            "@msgr_100012345_555:example.org"
        );
        assert_eq!(scheme().bot_user_id(), "@msgr_100012345:example.org");
    }

    #[test]
    fn test_room_alias_round_trip() {
        let s = scheme();
        for remote in ["T1", "86400", "a_b_c", "thread_9"] {
            let alias = s.room_alias(remote);
            assert_eq!(
                s.parse_room_alias(&alias),
                Some(("100012345".to_string(), remote.to_string())),
                "round trip failed for {}",
                remote
            );
        }
    }

    #[test]
    fn test_puppet_user_round_trip() {
        let s = scheme();
        let id = s.puppet_user_id("user_42");
        assert_eq!(
            s.parse_puppet_user_id(&id),
            Some(("100012345".to_string(), "user_42".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_foreign_domain() {
        assert_eq!(
            scheme().parse_room_alias("#msgr_100012345_T1:other.org"),
            None
        );
    }

    #[test]
    fn test_parse_rejects_foreign_prefix() {
        assert_eq!(
            scheme().parse_room_alias("#other_100012345_T1:example.org"),
            None
        );
    }

    #[test]
    fn test_parse_rejects_unrelated_alias() {
        assert_eq!(scheme().parse_room_alias("#general:example.org"), None);
        assert_eq!(scheme().parse_room_alias("not-an-alias"), None);
    }

    #[test]
    fn test_parse_rejects_empty_remote() {
        assert_eq!(
            scheme().parse_room_alias("#msgr_100012345_:example.org"),
            None
        );
        // The bot's own id carries no remote part at all.
        let bot = scheme().bot_user_id();
        assert_eq!(scheme().parse_puppet_user_id(&bot), None);
    }

    #[test]
    fn test_protocol_room_alias() {
        assert_eq!(
            scheme().protocol_room_alias(),
            "#msgr_100012345_protocol:example.org"
        );
    }
}
