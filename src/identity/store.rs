//! Canonical identity mapping tables.
//!
//! The store exclusively owns all `Person`/`Room` instances; every
//! other component holds `Arc` handles obtained through resolution.
//! Entries live for the process lifetime. There is no eviction: the
//! cardinality of contacts and threads is operationally bounded per
//! bridged account, which is the scaling boundary of this design.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::common::error::{DirectoryError, DirectoryResult};
use crate::common::types::{Person, Room};

/// Cache sizes, surfaced by the protocol-room status command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub people: usize,
    pub rooms: usize,
}

/// Access to the identities an entry should be registered under.
trait Keyed {
    fn remote_id(&self) -> Option<&str>;
    fn local_id(&self) -> Option<&str>;
}

impl Keyed for Person {
    fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }
    fn local_id(&self) -> Option<&str> {
        self.local_id.as_deref()
    }
}

impl Keyed for Room {
    fn remote_id(&self) -> Option<&str> {
        Some(&self.remote_id)
    }
    fn local_id(&self) -> Option<&str> {
        Some(&self.local_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Remote(String),
    Local(String),
}

type Waiter<T> = oneshot::Sender<DirectoryResult<Arc<T>>>;

struct Tables<T> {
    by_remote: HashMap<String, Arc<T>>,
    by_local: HashMap<String, Arc<T>>,
    in_flight: HashMap<Key, Vec<Waiter<T>>>,
}

impl<T> Default for Tables<T> {
    fn default() -> Self {
        Self {
            by_remote: HashMap::new(),
            by_local: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }
}

impl<T> Tables<T> {
    fn lookup(&self, key: &Key) -> Option<Arc<T>> {
        match key {
            Key::Remote(id) => self.by_remote.get(id).cloned(),
            Key::Local(id) => self.by_local.get(id).cloned(),
        }
    }
}

/// One dual-keyed table with per-key single-flight get-or-create.
///
/// The mutex is only ever held around table mutation, never across the
/// factory; the in-flight slot is what serializes concurrent resolvers
/// for the same key.
struct SlotTable<T> {
    inner: Mutex<Tables<T>>,
}

impl<T: Keyed> SlotTable<T> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(Tables::default()),
        }
    }

    fn peek(&self, key: &Key) -> Option<Arc<T>> {
        self.inner.lock().unwrap().lookup(key)
    }

    fn distinct_len(&self) -> usize {
        let tables = self.inner.lock().unwrap();
        let mut seen: HashSet<*const T> = HashSet::new();
        for arc in tables.by_remote.values().chain(tables.by_local.values()) {
            seen.insert(Arc::as_ptr(arc));
        }
        seen.len()
    }

    async fn get_or_create<F>(&self, key: Key, factory: F) -> DirectoryResult<Arc<T>>
    where
        F: Future<Output = DirectoryResult<T>>,
    {
        let waiter = {
            let mut tables = self.inner.lock().unwrap();
            if let Some(hit) = tables.lookup(&key) {
                return Ok(hit);
            }
            match tables.in_flight.entry(key.clone()) {
                Entry::Occupied(mut slot) => {
                    let (tx, rx) = oneshot::channel();
                    slot.get_mut().push(tx);
                    Some(rx)
                }
                Entry::Vacant(slot) => {
                    slot.insert(Vec::new());
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            return match rx.await {
                Ok(result) => result,
                // The leader was dropped mid-factory; its slot was
                // cleared, so a retry starts fresh.
                Err(_) => Err(DirectoryError::LocalUnavailable {
                    message: "resolution aborted before completion".to_string(),
                }),
            };
        }

        let flight = FlightGuard {
            table: self,
            key: Some(key),
        };
        let result = factory.await;
        flight.complete(result)
    }
}

/// Clears the in-flight slot if the leading future is dropped before
/// completion, waking waiters so the key can be retried.
struct FlightGuard<'a, T: Keyed> {
    table: &'a SlotTable<T>,
    key: Option<Key>,
}

impl<'a, T: Keyed> FlightGuard<'a, T> {
    fn complete(mut self, result: DirectoryResult<T>) -> DirectoryResult<Arc<T>> {
        let Some(key) = self.key.take() else {
            return Err(DirectoryError::LocalUnavailable {
                message: "resolution state lost".to_string(),
            });
        };

        let mut tables = self.table.inner.lock().unwrap();
        let waiters = tables.in_flight.remove(&key).unwrap_or_default();
        match result {
            Ok(value) => {
                // Never blind-insert: if either id is already mapped,
                // the existing instance wins and the new value is
                // discarded.
                let existing = value
                    .remote_id()
                    .and_then(|id| tables.by_remote.get(id).cloned())
                    .or_else(|| value.local_id().and_then(|id| tables.by_local.get(id).cloned()));
                let arc = match existing {
                    Some(arc) => arc,
                    None => Arc::new(value),
                };
                if let Some(id) = arc.remote_id().map(str::to_string) {
                    tables.by_remote.entry(id).or_insert_with(|| arc.clone());
                }
                if let Some(id) = arc.local_id().map(str::to_string) {
                    tables.by_local.entry(id).or_insert_with(|| arc.clone());
                }
                for waiter in waiters {
                    let _ = waiter.send(Ok(arc.clone()));
                }
                Ok(arc)
            }
            Err(err) => {
                for waiter in waiters {
                    let _ = waiter.send(Err(err.clone()));
                }
                Err(err)
            }
        }
    }
}

impl<'a, T: Keyed> Drop for FlightGuard<'a, T> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            // Dropping the waiters' senders wakes them with an error.
            self.table.inner.lock().unwrap().in_flight.remove(&key);
        }
    }
}

/// Canonical, process-scoped identity cache for one bridge session.
///
/// Constructed at startup, injected into the components that resolve
/// identities, dropped at shutdown.
pub struct IdentityStore {
    people: SlotTable<Person>,
    rooms: SlotTable<Room>,
}

impl IdentityStore {
    pub fn new() -> Self {
        Self {
            people: SlotTable::new(),
            rooms: SlotTable::new(),
        }
    }

    pub async fn get_or_create_person_by_remote<F>(
        &self,
        remote_id: &str,
        factory: F,
    ) -> DirectoryResult<Arc<Person>>
    where
        F: Future<Output = DirectoryResult<Person>>,
    {
        self.people
            .get_or_create(Key::Remote(remote_id.to_string()), factory)
            .await
    }

    pub async fn get_or_create_person_by_local<F>(
        &self,
        local_id: &str,
        factory: F,
    ) -> DirectoryResult<Arc<Person>>
    where
        F: Future<Output = DirectoryResult<Person>>,
    {
        self.people
            .get_or_create(Key::Local(local_id.to_string()), factory)
            .await
    }

    pub async fn get_or_create_room_by_remote<F>(
        &self,
        remote_id: &str,
        factory: F,
    ) -> DirectoryResult<Arc<Room>>
    where
        F: Future<Output = DirectoryResult<Room>>,
    {
        self.rooms
            .get_or_create(Key::Remote(remote_id.to_string()), factory)
            .await
    }

    pub async fn get_or_create_room_by_local<F>(
        &self,
        local_id: &str,
        factory: F,
    ) -> DirectoryResult<Arc<Room>>
    where
        F: Future<Output = DirectoryResult<Room>>,
    {
        self.rooms
            .get_or_create(Key::Local(local_id.to_string()), factory)
            .await
    }

    pub fn person_by_remote(&self, remote_id: &str) -> Option<Arc<Person>> {
        self.people.peek(&Key::Remote(remote_id.to_string()))
    }

    pub fn person_by_local(&self, local_id: &str) -> Option<Arc<Person>> {
        self.people.peek(&Key::Local(local_id.to_string()))
    }

    pub fn room_by_remote(&self, remote_id: &str) -> Option<Arc<Room>> {
        self.rooms.peek(&Key::Remote(remote_id.to_string()))
    }

    pub fn room_by_local(&self, local_id: &str) -> Option<Arc<Room>> {
        self.rooms.peek(&Key::Local(local_id.to_string()))
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            people: self.people.distinct_len(),
            rooms: self.rooms.distinct_len(),
        }
    }
}

impl Default for IdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    fn person(remote: &str, local: &str) -> Person {
        Person::linked(remote, local)
    }

    #[tokio::test]
    async fn test_get_or_create_caches() {
        let store = IdentityStore::new();
        let calls = AtomicUsize::new(0);

        let first = store
            .get_or_create_person_by_remote("42", async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(person("42", "@msgr_1_42:example.org"))
            })
            .await
            .unwrap();

        let second = store
            .get_or_create_person_by_remote("42", async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(person("42", "@msgr_1_42:example.org"))
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_registered_under_both_keys() {
        let store = IdentityStore::new();
        let created = store
            .get_or_create_person_by_remote("42", async {
                Ok(person("42", "@msgr_1_42:example.org"))
            })
            .await
            .unwrap();

        let by_local = store.person_by_local("@msgr_1_42:example.org").unwrap();
        assert!(Arc::ptr_eq(&created, &by_local));

        // The by-local path hits the cache without running its factory.
        let hit = store
            .get_or_create_person_by_local("@msgr_1_42:example.org", async {
                panic!("factory must not run on a cache hit")
            })
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&created, &hit));
    }

    #[tokio::test]
    async fn test_concurrent_same_key_single_flight() {
        let store = Arc::new(IdentityStore::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                store
                    .get_or_create_room_by_remote("T1", async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(Room {
                            remote_id: "T1".to_string(),
                            local_id: "!room1:example.org".to_string(),
                            local_alias: "#msgr_1_T1:example.org".to_string(),
                            display_name: "T1".to_string(),
                            topic: String::new(),
                            is_direct: false,
                            participants: Default::default(),
                        })
                    })
                    .await
            }));
        }

        let mut rooms = Vec::new();
        for handle in handles {
            rooms.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for room in &rooms[1..] {
            assert!(Arc::ptr_eq(&rooms[0], room));
        }
    }

    #[tokio::test]
    async fn test_factory_failure_not_cached() {
        let store = IdentityStore::new();

        let err = store
            .get_or_create_room_by_remote("T9", async {
                Err(DirectoryError::UnsupportedKind {
                    kind: "marketplace".to_string(),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::UnsupportedKind { .. }));
        assert!(store.room_by_remote("T9").is_none());

        // A later attempt runs a fresh factory rather than hitting a
        // poisoned entry.
        let room = store
            .get_or_create_room_by_remote("T9", async {
                Ok(Room {
                    remote_id: "T9".to_string(),
                    local_id: "!room9:example.org".to_string(),
                    local_alias: "#msgr_1_T9:example.org".to_string(),
                    display_name: "T9".to_string(),
                    topic: String::new(),
                    is_direct: true,
                    participants: Default::default(),
                })
            })
            .await
            .unwrap();
        assert_eq!(room.remote_id, "T9");
    }

    #[tokio::test]
    async fn test_failure_propagates_to_waiters() {
        let store = Arc::new(IdentityStore::new());

        let leader = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .get_or_create_person_by_remote("7", async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Err(DirectoryError::RemoteUnavailable {
                            message: "poll failed".to_string(),
                        })
                    })
                    .await
            })
        };

        // Give the leader time to claim the flight.
        tokio::time::sleep(Duration::from_millis(5)).await;

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .get_or_create_person_by_remote("7", async {
                        panic!("waiter must not run a second factory")
                    })
                    .await
            })
        };

        let leader_err = leader.await.unwrap().unwrap_err();
        let waiter_err = waiter.await.unwrap().unwrap_err();
        assert_eq!(leader_err, waiter_err);
        assert!(store.person_by_remote("7").is_none());
    }

    #[tokio::test]
    async fn test_stats_counts_distinct_entries() {
        let store = IdentityStore::new();
        store
            .get_or_create_person_by_remote("1", async { Ok(person("1", "@a:x")) })
            .await
            .unwrap();
        store
            .get_or_create_person_by_remote("2", async { Ok(person("2", "@b:x")) })
            .await
            .unwrap();

        let stats = store.stats();
        assert_eq!(stats.people, 2);
        assert_eq!(stats.rooms, 0);
    }
}
