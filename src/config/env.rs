//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `DOORMAN_AS_TOKEN` - Matrix application service token
//! - `DOORMAN_SESSION_TOKEN` - remote messenger session token
//! - `DOORMAN_MATRIX_BASE_URL` - Matrix homeserver base URL
//! - `DOORMAN_MESSENGER_BASE_URL` - remote messenger base URL
//! - `DOORMAN_LINKED_USER` - localpart of the bridged Matrix user

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "DOORMAN";

/// Apply environment variable overrides to a config.
///
/// This allows sensitive values like tokens to be provided via
/// environment variables instead of the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_AS_TOKEN", ENV_PREFIX)) {
        config.matrix.as_token = token;
    }
    if let Ok(token) = env::var(format!("{}_SESSION_TOKEN", ENV_PREFIX)) {
        config.messenger.session_token = token;
    }
    if let Ok(url) = env::var(format!("{}_MATRIX_BASE_URL", ENV_PREFIX)) {
        config.matrix.base_url = url;
    }
    if let Ok(url) = env::var(format!("{}_MESSENGER_BASE_URL", ENV_PREFIX)) {
        config.messenger.base_url = url;
    }
    if let Ok(user) = env::var(format!("{}_LINKED_USER", ENV_PREFIX)) {
        config.matrix.linked_user = user;
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `DOORMAN_CONFIG`, otherwise returns "doorman.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "doorman.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_test_config() -> Config {
        Config {
            matrix: MatrixConfig {
                base_url: "http://127.0.0.1:8008".to_string(),
                domain: "example.org".to_string(),
                as_token: "original_token".to_string(),
                linked_user: "alice".to_string(),
            },
            messenger: MessengerConfig {
                base_url: "https://chat.example.com".to_string(),
                owner_id: "100012345".to_string(),
                session_token: "original_session".to_string(),
                poll_timeout_secs: None,
            },
            bridge: None,
            namespaces: None,
        }
    }

    #[test]
    fn test_get_config_path_default() {
        env::remove_var("DOORMAN_CONFIG");
        assert_eq!(get_config_path(), "doorman.conf");
    }

    #[test]
    fn test_apply_env_overrides_no_vars() {
        env::remove_var("DOORMAN_AS_TOKEN");
        env::remove_var("DOORMAN_SESSION_TOKEN");

        let result = apply_env_overrides(make_test_config());

        assert_eq!(result.matrix.as_token, "original_token");
        assert_eq!(result.messenger.session_token, "original_session");
    }
}
