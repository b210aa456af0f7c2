//! Matrix homeserver client.
//!
//! Implements [`LocalDirectory`] over the client-server API with
//! application-service `user_id` impersonation. Response statuses and
//! `errcode`s are mapped onto the directory error taxonomy at this
//! boundary; nothing above it sees HTTP.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::common::error::{DirectoryError, DirectoryResult};
use crate::directory::local::{LocalDirectory, RoomSpec, RoomVisibility};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    errcode: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoomIdBody {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct EventIdBody {
    event_id: String,
}

#[derive(Debug, Deserialize)]
struct CanonicalAliasBody {
    alias: Option<String>,
}

pub struct MatrixDirectory {
    http: Client,
    base_url: String,
    as_token: String,
    /// Transaction ids must be unique per access token; the startup
    /// stamp keeps them unique across restarts.
    txn_stamp: i64,
    txn_seq: AtomicU64,
}

impl MatrixDirectory {
    pub fn new(base_url: &str, as_token: &str) -> DirectoryResult<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DirectoryError::LocalUnavailable {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            as_token: as_token.to_string(),
            txn_stamp: Utc::now().timestamp_millis(),
            txn_seq: AtomicU64::new(0),
        })
    }

    fn request(&self, method: Method, path: &str, user_id: Option<&str>) -> RequestBuilder {
        let mut url = format!("{}{}", self.base_url, path);
        if let Some(user_id) = user_id {
            url.push_str("?user_id=");
            url.push_str(&encode_component(user_id));
        }
        self.http
            .request(method, url)
            .bearer_auth(&self.as_token)
    }

    fn next_txn_id(&self) -> String {
        let seq = self.txn_seq.fetch_add(1, Ordering::Relaxed);
        format!("doorman{}.{}", self.txn_stamp, seq)
    }

    async fn execute<T: for<'de> Deserialize<'de>>(
        &self,
        request: RequestBuilder,
    ) -> DirectoryResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| DirectoryError::LocalUnavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| DirectoryError::Malformed {
                    message: e.to_string(),
                });
        }

        let body = response.json::<ErrorBody>().await.unwrap_or(ErrorBody {
            errcode: None,
            error: None,
        });
        Err(classify_error(status, body))
    }

    async fn send_message(
        &self,
        user_id: Option<&str>,
        room_id: &str,
        text: &str,
    ) -> DirectoryResult<String> {
        let path = format!(
            "/_matrix/client/v3/rooms/{}/send/m.room.message/{}",
            encode_component(room_id),
            self.next_txn_id()
        );
        let body: EventIdBody = self
            .execute(
                self.request(Method::PUT, &path, user_id)
                    .json(&json!({ "msgtype": "m.text", "body": text })),
            )
            .await?;
        Ok(body.event_id)
    }
}

#[async_trait]
impl LocalDirectory for MatrixDirectory {
    async fn resolve_alias_to_id(&self, alias: &str) -> DirectoryResult<String> {
        let path = format!(
            "/_matrix/client/v3/directory/room/{}",
            encode_component(alias)
        );
        let body: RoomIdBody = self.execute(self.request(Method::GET, &path, None)).await?;
        debug!(alias = %alias, room = %body.room_id, "resolved alias");
        Ok(body.room_id)
    }

    async fn create_room(&self, spec: &RoomSpec) -> DirectoryResult<String> {
        let visibility = match spec.visibility {
            RoomVisibility::Private => "private",
            RoomVisibility::Public => "public",
        };
        let body: RoomIdBody = self
            .execute(
                self.request(Method::POST, "/_matrix/client/v3/createRoom", None)
                    .json(&json!({
                        "room_alias_name": spec.alias_localpart,
                        "visibility": visibility,
                        "preset": "private_chat",
                        "name": spec.display_name,
                        "topic": spec.topic,
                        "is_direct": spec.is_direct,
                        "invite": spec.invitee_ids,
                    })),
            )
            .await?;
        Ok(body.room_id)
    }

    async fn send_text(&self, room_id: &str, text: &str) -> DirectoryResult<String> {
        self.send_message(None, room_id, text).await
    }

    async fn send_text_as(
        &self,
        user_id: &str,
        room_id: &str,
        text: &str,
    ) -> DirectoryResult<String> {
        self.send_message(Some(user_id), room_id, text).await
    }

    async fn ensure_joined(&self, user_id: &str, room_id: &str) -> DirectoryResult<()> {
        let path = format!("/_matrix/client/v3/join/{}", encode_component(room_id));
        let _: serde_json::Value = self
            .execute(
                self.request(Method::POST, &path, Some(user_id))
                    .json(&json!({})),
            )
            .await?;
        Ok(())
    }

    async fn get_canonical_alias(&self, room_id: &str) -> DirectoryResult<String> {
        let path = format!(
            "/_matrix/client/v3/rooms/{}/state/m.room.canonical_alias",
            encode_component(room_id)
        );
        let body: CanonicalAliasBody =
            self.execute(self.request(Method::GET, &path, None)).await?;
        body.alias.ok_or_else(|| DirectoryError::NotFound {
            id: room_id.to_string(),
        })
    }
}

/// Map an error response onto the directory taxonomy. The `errcode`
/// is more precise than the status where present.
fn classify_error(status: StatusCode, body: ErrorBody) -> DirectoryError {
    let message = body.error.unwrap_or_else(|| status.to_string());
    match body.errcode.as_deref() {
        Some("M_NOT_FOUND") => return DirectoryError::NotFound { id: message },
        Some("M_ROOM_IN_USE") => {
            return DirectoryError::Conflict {
                alias: String::new(),
                message,
            }
        }
        Some("M_FORBIDDEN") | Some("M_UNKNOWN_TOKEN") => {
            return DirectoryError::Unauthorized { message }
        }
        Some("M_LIMIT_EXCEEDED") => return DirectoryError::LocalUnavailable { message },
        _ => {}
    }
    match status {
        StatusCode::NOT_FOUND => DirectoryError::NotFound { id: message },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            DirectoryError::Unauthorized { message }
        }
        StatusCode::CONFLICT => DirectoryError::Conflict {
            alias: String::new(),
            message,
        },
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            DirectoryError::LocalUnavailable { message }
        }
        _ => DirectoryError::Malformed {
            message: format!("{}: {}", status, message),
        },
    }
}

/// Percent-encode a path/query component. Matrix ids carry `#`, `!`,
/// `:` and friends, none of which may appear raw in a path segment.
fn encode_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_component() {
        assert_eq!(
            encode_component("#msgr_O_T1:example.org"),
            "%23msgr_O_T1%3Aexample.org"
        );
        assert_eq!(encode_component("@user:ex.org"), "%40user%3Aex.org");
        assert_eq!(encode_component("plain-id_1.x~y"), "plain-id_1.x~y");
    }

    #[test]
    fn test_classify_error_prefers_errcode() {
        let err = classify_error(
            StatusCode::BAD_REQUEST,
            ErrorBody {
                errcode: Some("M_ROOM_IN_USE".to_string()),
                error: Some("Room alias already taken".to_string()),
            },
        );
        assert!(matches!(err, DirectoryError::Conflict { .. }));
    }

    #[test]
    fn test_classify_error_by_status() {
        let not_found = classify_error(
            StatusCode::NOT_FOUND,
            ErrorBody {
                errcode: None,
                error: None,
            },
        );
        assert!(matches!(not_found, DirectoryError::NotFound { .. }));

        let unavailable = classify_error(
            StatusCode::BAD_GATEWAY,
            ErrorBody {
                errcode: None,
                error: None,
            },
        );
        assert!(matches!(
            unavailable,
            DirectoryError::LocalUnavailable { .. }
        ));

        let unauthorized = classify_error(
            StatusCode::FORBIDDEN,
            ErrorBody {
                errcode: None,
                error: None,
            },
        );
        assert!(matches!(unauthorized, DirectoryError::Unauthorized { .. }));
    }

    #[test]
    fn test_txn_ids_are_unique() {
        let dir = MatrixDirectory::new("http://127.0.0.1:8008", "tok").unwrap();
        let a = dir.next_txn_id();
        let b = dir.next_txn_id();
        assert_ne!(a, b);
        assert!(a.starts_with("doorman"));
    }
}
