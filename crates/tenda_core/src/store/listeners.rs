//! Listener bookkeeping shared by store backends.

use super::{CollectionPath, ErrorListener, Snapshot, SnapshotListener, StoreError, SubscriptionId};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct Listener {
    path: CollectionPath,
    on_snapshot: SnapshotListener,
    on_error: ErrorListener,
}

/// Registered listeners keyed by subscription id.
///
/// Callbacks are cloned out under the lock and invoked after it is released.
#[derive(Default)]
pub(crate) struct ListenerSet {
    inner: Mutex<ListenerTable>,
}

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    listeners: BTreeMap<SubscriptionId, Listener>,
}

impl ListenerSet {
    pub(crate) fn register(
        &self,
        path: &CollectionPath,
        on_snapshot: SnapshotListener,
        on_error: ErrorListener,
    ) -> SubscriptionId {
        let mut table = self.lock();
        table.next_id += 1;
        let id = SubscriptionId::from_raw(table.next_id);
        table.listeners.insert(
            id,
            Listener {
                path: path.clone(),
                on_snapshot,
                on_error,
            },
        );
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        self.lock().listeners.remove(&id).is_some()
    }

    pub(crate) fn count_for(&self, path: &CollectionPath) -> usize {
        self.lock()
            .listeners
            .values()
            .filter(|listener| &listener.path == path)
            .count()
    }

    /// Delivers `snapshot` to one listener if it is still registered.
    pub(crate) fn deliver_to(&self, id: SubscriptionId, snapshot: Snapshot) {
        let callback = self
            .lock()
            .listeners
            .get(&id)
            .map(|listener| listener.on_snapshot.clone());
        if let Some(callback) = callback {
            callback(snapshot);
        }
    }

    /// Delivers `snapshot` to every listener of `path`.
    pub(crate) fn broadcast(&self, path: &CollectionPath, snapshot: &Snapshot) {
        let callbacks = self
            .lock()
            .listeners
            .values()
            .filter(|listener| &listener.path == path)
            .map(|listener| listener.on_snapshot.clone())
            .collect::<Vec<_>>();
        for callback in callbacks {
            callback(snapshot.clone());
        }
    }

    /// Removes every listener of `path` and hands each one an error.
    pub(crate) fn fail_all(&self, path: &CollectionPath, make_error: impl Fn() -> StoreError) -> usize {
        let failed = {
            let mut table = self.lock();
            let ids = table
                .listeners
                .iter()
                .filter(|(_, listener)| &listener.path == path)
                .map(|(id, _)| *id)
                .collect::<Vec<_>>();
            ids.into_iter()
                .filter_map(|id| table.listeners.remove(&id))
                .map(|listener| listener.on_error)
                .collect::<Vec<_>>()
        };
        let count = failed.len();
        for on_error in failed {
            on_error(make_error());
        }
        count
    }

    /// Reports a non-fatal read failure to every listener of `path`.
    pub(crate) fn notify_error(&self, path: &CollectionPath, make_error: impl Fn() -> StoreError) {
        let callbacks = self
            .lock()
            .listeners
            .values()
            .filter(|listener| &listener.path == path)
            .map(|listener| listener.on_error.clone())
            .collect::<Vec<_>>();
        for on_error in callbacks {
            on_error(make_error());
        }
    }

    fn lock(&self) -> MutexGuard<'_, ListenerTable> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::ListenerSet;
    use crate::store::{CollectionPath, Snapshot, StoreError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn path(raw: &str) -> CollectionPath {
        CollectionPath::new(raw).unwrap()
    }

    #[test]
    fn broadcast_only_reaches_listeners_of_the_same_path() {
        let set = ListenerSet::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        set.register(
            &path("a"),
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(|_| {}),
        );
        set.register(&path("b"), Arc::new(|_| panic!("wrong path")), Arc::new(|_| {}));

        set.broadcast(&path("a"), &Snapshot::default());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fail_all_removes_listeners_after_reporting() {
        let set = ListenerSet::default();
        let errors = Arc::new(AtomicUsize::new(0));
        let counter = errors.clone();
        set.register(
            &path("a"),
            Arc::new(|_| {}),
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let failed = set.fail_all(&path("a"), || StoreError::Unavailable("offline".into()));
        assert_eq!(failed, 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(set.count_for(&path("a")), 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let set = ListenerSet::default();
        let id = set.register(&path("a"), Arc::new(|_| {}), Arc::new(|_| {}));
        assert!(set.remove(id));
        assert!(!set.remove(id));
    }
}
