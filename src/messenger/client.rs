//! Remote messenger clients.
//!
//! Two views of the same service: [`MessengerDirectory`] is the async
//! half used from the event loop (metadata fetches, outbound
//! hand-off), [`MessengerSession`] is the blocking, session-bound half
//! the worker thread drives (long-poll, actual sends). Wire kinds are
//! interpreted here and nowhere else.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;

use crate::common::error::{DirectoryError, DirectoryResult};
use crate::common::messages::RemoteSend;
use crate::common::types::{RemoteEvent, RemoteEventKind, ThreadKind};
use crate::directory::remote::{RemoteDirectory, RemoteSession, ThreadMetadata};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug, Deserialize)]
struct ThreadInfoBody {
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    participant_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EventsBody {
    #[serde(default)]
    cursor: Option<String>,
    #[serde(default)]
    events: Vec<WireEvent>,
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    kind: String,
    author_id: String,
    thread_id: String,
    #[serde(default)]
    thread_kind: Option<String>,
    timestamp_ms: i64,
    #[serde(default)]
    text: Option<String>,
}

impl WireEvent {
    fn into_event(self) -> RemoteEvent {
        RemoteEvent {
            kind: RemoteEventKind::from_wire(&self.kind),
            author_id: self.author_id,
            thread_id: self.thread_id,
            thread_kind: self.thread_kind.as_deref().and_then(ThreadKind::from_wire),
            timestamp: DateTime::<Utc>::from_timestamp_millis(self.timestamp_ms)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            text: self.text,
        }
    }
}

/// Async remote-network view for the event loop.
pub struct MessengerDirectory {
    http: reqwest::Client,
    base_url: String,
    session_token: String,
    outbound_tx: mpsc::UnboundedSender<RemoteSend>,
}

impl MessengerDirectory {
    pub fn new(
        base_url: &str,
        session_token: &str,
        outbound_tx: mpsc::UnboundedSender<RemoteSend>,
    ) -> DirectoryResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DirectoryError::RemoteUnavailable {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token: session_token.to_string(),
            outbound_tx,
        })
    }
}

#[async_trait]
impl RemoteDirectory for MessengerDirectory {
    async fn fetch_thread_metadata(&self, remote_id: &str) -> DirectoryResult<ThreadMetadata> {
        let url = format!("{}/v1/threads/{}", self.base_url, remote_id);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.session_token)
            .send()
            .await
            .map_err(|e| DirectoryError::RemoteUnavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_remote_status(status, remote_id));
        }
        let info: ThreadInfoBody =
            response
                .json()
                .await
                .map_err(|e| DirectoryError::Malformed {
                    message: e.to_string(),
                })?;

        // The one place thread kinds are interpreted.
        let kind =
            ThreadKind::from_wire(&info.kind).ok_or_else(|| DirectoryError::UnsupportedKind {
                kind: info.kind.clone(),
            })?;
        debug!(thread = remote_id, ?kind, "fetched thread metadata");

        Ok(ThreadMetadata {
            kind,
            display_name: info.name.unwrap_or_default(),
            topic: info.topic.unwrap_or_default(),
            participant_ids: info.participant_ids,
        })
    }

    async fn send_text(&self, thread_id: &str, text: &str) -> DirectoryResult<()> {
        // Sends go through the worker; the session client is bound to
        // its thread.
        self.outbound_tx
            .send(RemoteSend {
                thread_id: thread_id.to_string(),
                text: text.to_string(),
            })
            .map_err(|_| DirectoryError::RemoteUnavailable {
                message: "remote worker has stopped".to_string(),
            })
    }
}

/// Blocking session client owned by the worker thread.
pub struct MessengerSession {
    http: reqwest::blocking::Client,
    base_url: String,
    session_token: String,
    poll_timeout: Duration,
    cursor: Option<String>,
}

impl MessengerSession {
    pub fn new(
        base_url: &str,
        session_token: &str,
        poll_timeout: Option<Duration>,
    ) -> DirectoryResult<Self> {
        let poll_timeout = poll_timeout.unwrap_or(DEFAULT_POLL_TIMEOUT);
        let http = reqwest::blocking::Client::builder()
            .timeout(poll_timeout + REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DirectoryError::RemoteUnavailable {
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_token: session_token.to_string(),
            poll_timeout,
            cursor: None,
        })
    }
}

impl RemoteSession for MessengerSession {
    fn poll_events(&mut self) -> DirectoryResult<Vec<RemoteEvent>> {
        let mut url = format!(
            "{}/v1/events?timeout={}",
            self.base_url,
            self.poll_timeout.as_secs()
        );
        if let Some(cursor) = &self.cursor {
            url.push_str("&cursor=");
            url.push_str(cursor);
        }

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.session_token)
            .send()
            .map_err(|e| DirectoryError::RemoteUnavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_remote_status(status, "event stream"));
        }
        let body: EventsBody = response.json().map_err(|e| DirectoryError::Malformed {
            message: e.to_string(),
        })?;

        if body.cursor.is_some() {
            self.cursor = body.cursor;
        }
        Ok(body.events.into_iter().map(WireEvent::into_event).collect())
    }

    fn send_text(&mut self, thread_id: &str, text: &str) -> DirectoryResult<()> {
        let url = format!("{}/v1/threads/{}/messages", self.base_url, thread_id);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.session_token)
            .json(&json!({ "text": text }))
            .send()
            .map_err(|e| DirectoryError::RemoteUnavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_remote_status(status, thread_id));
        }
        Ok(())
    }
}

fn classify_remote_status(status: StatusCode, subject: &str) -> DirectoryError {
    match status {
        StatusCode::NOT_FOUND => DirectoryError::NotFound {
            id: subject.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DirectoryError::Unauthorized {
            message: format!("{} ({})", status, subject),
        },
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            DirectoryError::RemoteUnavailable {
                message: status.to_string(),
            }
        }
        _ => DirectoryError::Malformed {
            message: format!("{} ({})", status, subject),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_event_conversion() {
        let wire = WireEvent {
            kind: "message".to_string(),
            author_id: "A".to_string(),
            thread_id: "T1".to_string(),
            thread_kind: Some("group".to_string()),
            timestamp_ms: 1_700_000_000_000,
            text: Some("hi".to_string()),
        };
        let event = wire.into_event();
        assert_eq!(event.kind, RemoteEventKind::Message);
        assert_eq!(event.thread_kind, Some(ThreadKind::Group));
        assert_eq!(event.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_unknown_event_kind_is_other() {
        let wire = WireEvent {
            kind: "poke".to_string(),
            author_id: "A".to_string(),
            thread_id: "T1".to_string(),
            thread_kind: None,
            timestamp_ms: 0,
            text: None,
        };
        assert_eq!(wire.into_event().kind, RemoteEventKind::Other);
    }

    #[test]
    fn test_classify_remote_status() {
        assert!(matches!(
            classify_remote_status(StatusCode::NOT_FOUND, "T"),
            DirectoryError::NotFound { .. }
        ));
        assert!(matches!(
            classify_remote_status(StatusCode::SERVICE_UNAVAILABLE, "T"),
            DirectoryError::RemoteUnavailable { .. }
        ));
        assert!(matches!(
            classify_remote_status(StatusCode::UNAUTHORIZED, "T"),
            DirectoryError::Unauthorized { .. }
        ));
    }

    #[test]
    fn test_events_body_defaults() {
        let body: EventsBody = serde_json::from_str("{}").unwrap();
        assert!(body.cursor.is_none());
        assert!(body.events.is_empty());
    }
}
