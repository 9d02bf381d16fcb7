//! In-process document store.
//!
//! # Responsibility
//! - Back tests, demos and offline sessions without a database file.
//! - Simulate other writers and feed failures for listener-side code.
//!
//! # Invariants
//! - Snapshot order is insertion order per collection.
//! - Removing a document or appending one bumps the collection revision and
//!   triggers a snapshot broadcast.

use super::listeners::ListenerSet;
use super::{
    CollectionPath, Document, DocumentId, DocumentStore, ErrorListener, Fields, Snapshot,
    SnapshotListener, StoreError, StoreResult, SubscriptionId,
};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct Collection {
    documents: Vec<Document>,
    /// Bumped on every append and removal.
    revision: u64,
}

impl Collection {
    fn snapshot(&self) -> Snapshot {
        Snapshot::at_revision(self.revision, self.documents.clone())
    }
}

/// Memory-backed [`DocumentStore`].
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<CollectionPath, Collection>>,
    read_only: Mutex<HashSet<CollectionPath>>,
    listeners: ListenerSet,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current contents of one collection.
    pub fn snapshot(&self, path: &CollectionPath) -> Snapshot {
        self.collections()
            .get(path)
            .map(Collection::snapshot)
            .unwrap_or_default()
    }

    /// Number of documents currently stored in one collection.
    pub fn len(&self, path: &CollectionPath) -> usize {
        self.collections()
            .get(path)
            .map_or(0, |collection| collection.documents.len())
    }

    pub fn is_empty(&self, path: &CollectionPath) -> bool {
        self.len(path) == 0
    }

    /// Number of listeners registered for one collection.
    pub fn listener_count(&self, path: &CollectionPath) -> usize {
        self.listeners.count_for(path)
    }

    /// Deletes one document on behalf of another writer.
    ///
    /// Returns `false` when no document with `id` exists.
    pub fn remove(&self, path: &CollectionPath, id: &DocumentId) -> bool {
        let snapshot = {
            let mut collections = self.collections();
            let Some(collection) = collections.get_mut(path) else {
                return false;
            };
            let before = collection.documents.len();
            collection.documents.retain(|document| &document.id != id);
            if collection.documents.len() == before {
                return false;
            }
            collection.revision += 1;
            collection.snapshot()
        };

        debug!(
            "event=store_remove module=store status=ok backend=memory collection={} size={}",
            path,
            snapshot.len()
        );
        self.listeners.broadcast(path, &snapshot);
        true
    }

    /// Rejects future appends to `path` with `PermissionDenied`.
    pub fn deny_writes(&self, path: &CollectionPath) {
        self.read_only().insert(path.clone());
    }

    /// Re-enables appends to `path`.
    pub fn allow_writes(&self, path: &CollectionPath) {
        self.read_only().remove(path);
    }

    /// Breaks every live feed on `path`.
    ///
    /// Each listener receives one error and is removed; stored documents are
    /// untouched. Returns the number of feeds that failed.
    pub fn fail_subscriptions(&self, path: &CollectionPath, reason: &str) -> usize {
        let failed = self
            .listeners
            .fail_all(path, || StoreError::Unavailable(reason.to_string()));
        warn!(
            "event=store_feed_failed module=store status=error backend=memory collection={} listeners={}",
            path, failed
        );
        failed
    }

    fn collections(&self) -> MutexGuard<'_, HashMap<CollectionPath, Collection>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_only(&self) -> MutexGuard<'_, HashSet<CollectionPath>> {
        self.read_only.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn subscribe(
        &self,
        path: &CollectionPath,
        on_snapshot: SnapshotListener,
        on_error: ErrorListener,
    ) -> StoreResult<SubscriptionId> {
        let id = self.listeners.register(path, on_snapshot, on_error);
        debug!(
            "event=store_subscribe module=store status=ok backend=memory collection={} subscription={}",
            path,
            id.get()
        );
        self.listeners.deliver_to(id, self.snapshot(path));
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if self.listeners.remove(id) {
            debug!(
                "event=store_unsubscribe module=store status=ok backend=memory subscription={}",
                id.get()
            );
        }
    }

    fn append(&self, path: &CollectionPath, fields: Fields) -> StoreResult<DocumentId> {
        if self.read_only().contains(path) {
            return Err(StoreError::PermissionDenied(path.to_string()));
        }

        let id = DocumentId::generate();
        let snapshot = {
            let mut collections = self.collections();
            let collection = collections.entry(path.clone()).or_default();
            collection.documents.push(Document {
                id: id.clone(),
                fields,
            });
            collection.revision += 1;
            collection.snapshot()
        };

        debug!(
            "event=store_append module=store status=ok backend=memory collection={} size={}",
            path,
            snapshot.len()
        );
        self.listeners.broadcast(path, &snapshot);
        Ok(id)
    }
}
