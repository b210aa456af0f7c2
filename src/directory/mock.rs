//! In-memory directory doubles for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::common::error::{DirectoryError, DirectoryResult};
use crate::common::messages::RemoteSend;
use crate::directory::local::{LocalDirectory, RoomSpec};
use crate::directory::remote::{RemoteDirectory, ThreadMetadata};

/// Scripted remote directory.
pub struct MockRemoteDirectory {
    threads: Mutex<HashMap<String, DirectoryResult<ThreadMetadata>>>,
    metadata_calls: AtomicUsize,
    sent: Mutex<Vec<RemoteSend>>,
    /// Artificial await point so concurrent resolutions overlap.
    delay: Option<Duration>,
}

impl MockRemoteDirectory {
    pub fn new() -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            metadata_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert_thread(&self, id: &str, meta: ThreadMetadata) {
        self.threads
            .lock()
            .unwrap()
            .insert(id.to_string(), Ok(meta));
    }

    pub fn fail_thread(&self, id: &str, err: DirectoryError) {
        self.threads
            .lock()
            .unwrap()
            .insert(id.to_string(), Err(err));
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<RemoteSend> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteDirectory for MockRemoteDirectory {
    async fn fetch_thread_metadata(&self, remote_id: &str) -> DirectoryResult<ThreadMetadata> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.threads
            .lock()
            .unwrap()
            .get(remote_id)
            .cloned()
            .unwrap_or_else(|| {
                Err(DirectoryError::NotFound {
                    id: remote_id.to_string(),
                })
            })
    }

    async fn send_text(&self, thread_id: &str, text: &str) -> DirectoryResult<()> {
        self.sent.lock().unwrap().push(RemoteSend {
            thread_id: thread_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
struct LocalState {
    /// Full alias -> room id.
    aliases: HashMap<String, String>,
    /// Room id -> full alias.
    canonical: HashMap<String, String>,
    created: Vec<RoomSpec>,
    joined: Vec<(String, String)>,
    /// (sender or None for the bot, room id, body).
    sent: Vec<(Option<String>, String, String)>,
    room_seq: usize,
    event_seq: usize,
}

/// Scripted local directory with a tiny in-memory homeserver model.
pub struct MockLocalDirectory {
    domain: String,
    state: Mutex<LocalState>,
}

impl MockLocalDirectory {
    pub fn new(domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            state: Mutex::new(LocalState::default()),
        }
    }

    /// Pre-register an existing room under a full alias.
    pub fn insert_room(&self, alias: &str, room_id: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .aliases
            .insert(alias.to_string(), room_id.to_string());
        state
            .canonical
            .insert(room_id.to_string(), alias.to_string());
    }

    pub fn created(&self) -> Vec<RoomSpec> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn joined(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().joined.clone()
    }

    pub fn sent(&self) -> Vec<(Option<String>, String, String)> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl LocalDirectory for MockLocalDirectory {
    async fn resolve_alias_to_id(&self, alias: &str) -> DirectoryResult<String> {
        self.state
            .lock()
            .unwrap()
            .aliases
            .get(alias)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                id: alias.to_string(),
            })
    }

    async fn create_room(&self, spec: &RoomSpec) -> DirectoryResult<String> {
        let mut state = self.state.lock().unwrap();
        let alias = format!("#{}:{}", spec.alias_localpart, self.domain);
        if state.aliases.contains_key(&alias) {
            return Err(DirectoryError::Conflict {
                alias,
                message: "alias already mapped".to_string(),
            });
        }
        state.room_seq += 1;
        let room_id = format!("!room{}:{}", state.room_seq, self.domain);
        state.aliases.insert(alias.clone(), room_id.clone());
        state.canonical.insert(room_id.clone(), alias);
        state.created.push(spec.clone());
        Ok(room_id)
    }

    async fn send_text(&self, room_id: &str, text: &str) -> DirectoryResult<String> {
        let mut state = self.state.lock().unwrap();
        state.event_seq += 1;
        let event_id = format!("$ev{}:{}", state.event_seq, self.domain);
        state
            .sent
            .push((None, room_id.to_string(), text.to_string()));
        Ok(event_id)
    }

    async fn send_text_as(
        &self,
        user_id: &str,
        room_id: &str,
        text: &str,
    ) -> DirectoryResult<String> {
        let mut state = self.state.lock().unwrap();
        state.event_seq += 1;
        let event_id = format!("$ev{}:{}", state.event_seq, self.domain);
        state.sent.push((
            Some(user_id.to_string()),
            room_id.to_string(),
            text.to_string(),
        ));
        Ok(event_id)
    }

    async fn ensure_joined(&self, user_id: &str, room_id: &str) -> DirectoryResult<()> {
        self.state
            .lock()
            .unwrap()
            .joined
            .push((user_id.to_string(), room_id.to_string()));
        Ok(())
    }

    async fn get_canonical_alias(&self, room_id: &str) -> DirectoryResult<String> {
        self.state
            .lock()
            .unwrap()
            .canonical
            .get(room_id)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound {
                id: room_id.to_string(),
            })
    }
}
