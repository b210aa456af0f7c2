//! Appservice namespace matching.
//!
//! The bridge's puppet user ids and room aliases live in regex
//! namespaces registered with the homeserver. Matching against them
//! is how bridge-originated senders and bridge-owned rooms are
//! recognized.

use fancy_regex::Regex;
use tracing::warn;

use crate::identity::alias::IdScheme;

/// Compiled namespace patterns for users and aliases.
#[derive(Debug, Clone)]
pub struct NamespaceMatcher {
    user_patterns: Vec<CompiledPattern>,
    alias_patterns: Vec<CompiledPattern>,
}

/// A compiled regex pattern with its original string for debugging.
#[derive(Debug, Clone)]
struct CompiledPattern {
    original: String,
    regex: Regex,
}

impl NamespaceMatcher {
    /// Create a matcher from pattern strings.
    ///
    /// Invalid regex patterns are logged and skipped.
    pub fn new(users: Vec<String>, aliases: Vec<String>) -> Self {
        Self {
            user_patterns: compile_patterns(users),
            alias_patterns: compile_patterns(aliases),
        }
    }

    /// Patterns derived from the naming scheme, mirroring what the
    /// appservice registration claims: the bot, the puppets, and the
    /// bridged user; plus all bridge-owned aliases.
    ///
    /// Prefix and owner are validated to be separator- and
    /// metacharacter-free; only the domain and linked user need
    /// escaping.
    pub fn default_patterns(scheme: &IdScheme, linked_user: &str) -> (Vec<String>, Vec<String>) {
        let domain = regex_literal(scheme.domain());
        let users = vec![
            format!(
                "^@{}_{}(_.+)?:{}$",
                scheme.prefix(),
                scheme.owner_id(),
                domain
            ),
            format!("^{}$", regex_literal(linked_user)),
        ];
        let aliases = vec![format!(
            "^#{}_{}_.+:{}$",
            scheme.prefix(),
            scheme.owner_id(),
            domain
        )];
        (users, aliases)
    }

    /// Whether a user id falls inside the appservice user namespace.
    pub fn matches_user(&self, user_id: &str) -> bool {
        matches_any(&self.user_patterns, user_id)
    }

    /// Whether a room alias falls inside the appservice alias namespace.
    pub fn matches_alias(&self, alias: &str) -> bool {
        matches_any(&self.alias_patterns, alias)
    }
}

fn matches_any(patterns: &[CompiledPattern], input: &str) -> bool {
    patterns.iter().any(|p| {
        p.regex.is_match(input).unwrap_or_else(|e| {
            warn!("Regex match error for pattern '{}': {}", p.original, e);
            false
        })
    })
}

/// Compile a list of regex pattern strings, skipping invalid ones.
fn compile_patterns(patterns: Vec<String>) -> Vec<CompiledPattern> {
    patterns
        .into_iter()
        .filter_map(|pattern| match Regex::new(&pattern) {
            Ok(regex) => Some(CompiledPattern {
                original: pattern,
                regex,
            }),
            Err(e) => {
                warn!("Invalid namespace regex pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
}

/// Escape regex metacharacters in an id fragment.
fn regex_literal(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\.+*?()|[]{}^$#&-~".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
