//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    // Matrix side
    if config.matrix.base_url.is_empty() {
        errors.push("matrix.base_url is required".to_string());
    } else if !config.matrix.base_url.starts_with("http://")
        && !config.matrix.base_url.starts_with("https://")
    {
        errors.push(format!(
            "matrix.base_url must be an http(s) URL (got '{}')",
            config.matrix.base_url
        ));
    }
    if config.matrix.domain.is_empty() {
        errors.push("matrix.domain is required".to_string());
    }
    if config.matrix.as_token.is_empty() {
        errors.push("matrix.as_token is required".to_string());
    }
    if config.matrix.linked_user.is_empty() {
        errors.push("matrix.linked_user is required".to_string());
    }
    if config.matrix.linked_user.starts_with('@') || config.matrix.linked_user.contains(':') {
        errors.push(format!(
            "matrix.linked_user must be a bare localpart, not a full user id (got '{}')",
            config.matrix.linked_user
        ));
    }

    // Messenger side
    if config.messenger.base_url.is_empty() {
        errors.push("messenger.base_url is required".to_string());
    } else if !config.messenger.base_url.starts_with("http://")
        && !config.messenger.base_url.starts_with("https://")
    {
        errors.push(format!(
            "messenger.base_url must be an http(s) URL (got '{}')",
            config.messenger.base_url
        ));
    }
    if config.messenger.session_token.is_empty() {
        errors.push("messenger.session_token is required".to_string());
    }

    // The owner id and prefix are embedded in aliases and puppet user
    // ids as `<prefix>_<owner>_<remote>`; a separator inside either
    // would make the parse ambiguous after a restart.
    if config.messenger.owner_id.is_empty() {
        errors.push("messenger.owner_id is required".to_string());
    }
    if config.messenger.owner_id.contains('_') || config.messenger.owner_id.contains(':') {
        errors.push(format!(
            "messenger.owner_id must not contain '_' or ':' (got '{}')",
            config.messenger.owner_id
        ));
    }
    let prefix = config.prefix();
    if prefix.is_empty() {
        errors.push("bridge.prefix must not be empty".to_string());
    }
    if !prefix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        errors.push(format!(
            "bridge.prefix must be lowercase alphanumeric (got '{}')",
            prefix
        ));
    }

    // Namespace patterns must compile
    if let Some(ref ns) = config.namespaces {
        for (field, patterns) in [("users", &ns.users), ("aliases", &ns.aliases)] {
            if let Some(patterns) = patterns {
                for (i, pattern) in patterns.iter().enumerate() {
                    if fancy_regex::Regex::new(pattern).is_err() {
                        errors.push(format!(
                            "namespaces.{}[{}] is not a valid regex: '{}'",
                            field, i, pattern
                        ));
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

/// Load, apply env overrides, and validate in one step.
pub fn load_and_validate(path: &str) -> Result<Config, ConfigError> {
    let config = crate::config::parser::load_config(path)?;
    let config = crate::config::env::apply_env_overrides(config);
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_valid_config() -> Config {
        Config {
            matrix: MatrixConfig {
                base_url: "http://127.0.0.1:8008".to_string(),
                domain: "example.org".to_string(),
                as_token: "as_secret".to_string(),
                linked_user: "alice".to_string(),
            },
            messenger: MessengerConfig {
                base_url: "https://chat.example.com".to_string(),
                owner_id: "100012345".to_string(),
                session_token: "session_secret".to_string(),
                poll_timeout_secs: None,
            },
            bridge: None,
            namespaces: None,
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate_config(&make_valid_config()).is_ok());
    }

    #[test]
    fn test_empty_as_token_fails() {
        let mut config = make_valid_config();
        config.matrix.as_token = String::new();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("as_token"));
    }

    #[test]
    fn test_full_user_id_as_linked_user_fails() {
        let mut config = make_valid_config();
        config.matrix.linked_user = "@alice:example.org".to_string();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("localpart"));
    }

    #[test]
    fn test_owner_id_with_separator_fails() {
        let mut config = make_valid_config();
        config.messenger.owner_id = "100_012".to_string();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("owner_id"));
    }

    #[test]
    fn test_uppercase_prefix_fails() {
        let mut config = make_valid_config();
        config.bridge = Some(BridgeConfig {
            prefix: Some("Msgr".to_string()),
            call_timeout_secs: None,
            protocol_room: None,
        });

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("prefix"));
    }

    #[test]
    fn test_invalid_namespace_regex_fails() {
        let mut config = make_valid_config();
        config.namespaces = Some(NamespacesConfig {
            users: Some(vec!["[invalid".to_string()]),
            aliases: None,
        });

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("not a valid regex"));
    }

    #[test]
    fn test_bad_base_url_fails() {
        let mut config = make_valid_config();
        config.matrix.base_url = "127.0.0.1:8008".to_string();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("http"));
    }
}
