//! Live donation/request listings over one exchange collection.
//!
//! # Responsibility
//! - Subscribe to the exchange collection and rebuild both lists from every
//!   full snapshot.
//! - Append new submissions; the resulting change arrives through the
//!   subscription, never through the write's return value.
//!
//! # Invariants
//! - Each snapshot is partitioned into donations, requests and dropped ids;
//!   the three are disjoint and together cover the snapshot.
//! - Snapshot order is preserved inside each list.
//! - After unsubscribe or a feed failure, lists keep their last state.
//! - A snapshot older than the one already applied is discarded, so
//!   re-entrant or concurrent writers cannot roll the lists back.
//! - Appends never mutate local lists.

use crate::identity::IdentityProvider;
use crate::model::exchange_item::{
    ExchangeItem, ExchangeKind, ExchangeValidationError, ItemDecodeError, NewExchangeItemInput,
};
use crate::model::now_epoch_ms;
use crate::store::{
    CollectionPath, DocumentId, DocumentStore, Snapshot, StoreError, SubscriptionId,
};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Client-side view of one exchange snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listings {
    pub donations: Vec<ExchangeItem>,
    pub requests: Vec<ExchangeItem>,
    /// Documents present in the snapshot but shown in neither list.
    pub dropped: Vec<DocumentId>,
}

impl Listings {
    pub fn is_empty(&self) -> bool {
        self.donations.is_empty() && self.requests.is_empty()
    }
}

/// Splits a snapshot into donations and requests.
///
/// Only documents without a known `type` are dropped; incomplete documents
/// of a known kind are listed with empty fields.
pub fn partition_snapshot(snapshot: &Snapshot) -> Listings {
    let mut listings = Listings::default();

    for document in &snapshot.documents {
        match ExchangeItem::from_document(document) {
            Ok(item) => match item.kind {
                ExchangeKind::Donation => listings.donations.push(item),
                ExchangeKind::Request => listings.requests.push(item),
            },
            Err(ItemDecodeError::UnknownKind(_)) => listings.dropped.push(document.id.clone()),
        }
    }

    listings
}

/// Live feed failure. Lists stay frozen at their last known state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionError {
    pub collection: String,
    pub message: String,
}

impl SubscriptionError {
    fn new(collection: &CollectionPath, err: &StoreError) -> Self {
        Self {
            collection: collection.to_string(),
            message: err.to_string(),
        }
    }
}

impl Display for SubscriptionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "subscription to `{}` failed: {}",
            self.collection, self.message
        )
    }
}

impl Error for SubscriptionError {}

/// Append rejected before or by the store.
#[derive(Debug)]
pub enum WriteError {
    /// No user id has been established yet.
    IdentityUnavailable,
    Validation(ExchangeValidationError),
    Store(StoreError),
}

impl Display for WriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdentityUnavailable => write!(f, "user identity is not established yet"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "write rejected: {err}"),
        }
    }
}

impl Error for WriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IdentityUnavailable => None,
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ExchangeValidationError> for WriteError {
    fn from(value: ExchangeValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for WriteError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Token for one active subscription of a [`ListingSynchronizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    generation: u64,
}

impl SubscriptionHandle {
    pub fn subscription_id(&self) -> SubscriptionId {
        self.id
    }
}

#[derive(Debug, Default)]
struct SyncState {
    listings: Listings,
    /// Generation whose snapshots are accepted; `None` when detached.
    live_generation: Option<u64>,
    /// Revision of the last snapshot applied for the live generation.
    applied_revision: Option<u64>,
    last_error: Option<SubscriptionError>,
    snapshot_count: u64,
}

/// Keeps donation and request lists in step with a shared collection.
///
/// Store and identity are passed in explicitly so tests can substitute fakes.
pub struct ListingSynchronizer {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    state: Arc<Mutex<SyncState>>,
    active: Option<SubscriptionHandle>,
    next_generation: u64,
}

impl ListingSynchronizer {
    pub fn new(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            state: Arc::new(Mutex::new(SyncState::default())),
            active: None,
            next_generation: 0,
        }
    }

    /// Starts listening to `collection`.
    ///
    /// Any previous subscription of this synchronizer is released first; the
    /// lists keep their contents until the first new snapshot arrives.
    pub fn subscribe(
        &mut self,
        collection: &CollectionPath,
    ) -> Result<SubscriptionHandle, SubscriptionError> {
        if let Some(previous) = self.active {
            self.unsubscribe(previous);
        }

        self.next_generation += 1;
        let generation = self.next_generation;
        {
            let mut state = lock(&self.state);
            state.live_generation = Some(generation);
            state.applied_revision = None;
            state.last_error = None;
        }

        let on_snapshot = snapshot_listener(Arc::downgrade(&self.state), generation);
        let on_error = error_listener(Arc::downgrade(&self.state), generation, collection.clone());

        match self.store.subscribe(collection, on_snapshot, on_error) {
            Ok(id) => {
                let handle = SubscriptionHandle { id, generation };
                self.active = Some(handle);
                info!(
                    "event=exchange_subscribe module=sync status=ok collection={} subscription={}",
                    collection,
                    id.get()
                );
                Ok(handle)
            }
            Err(err) => {
                let failure = SubscriptionError::new(collection, &err);
                error!(
                    "event=exchange_subscribe module=sync status=error collection={} error={}",
                    collection, err
                );
                let mut state = lock(&self.state);
                state.live_generation = None;
                state.last_error = Some(failure.clone());
                Err(failure)
            }
        }
    }

    /// Stops applying snapshots from `handle`.
    ///
    /// Safe to call repeatedly, with stale handles, and during teardown.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) {
        {
            let mut state = lock(&self.state);
            if state.live_generation == Some(handle.generation) {
                state.live_generation = None;
            }
        }
        self.store.unsubscribe(handle.id);

        if self.active == Some(handle) {
            self.active = None;
            info!(
                "event=exchange_unsubscribe module=sync status=ok subscription={}",
                handle.id.get()
            );
        }
    }

    /// Releases the active subscription, if any.
    pub fn close(&mut self) {
        if let Some(handle) = self.active {
            self.unsubscribe(handle);
        }
    }

    /// Writes a new donation or request owned by the current user.
    ///
    /// The new record shows up in the lists only once the store redelivers a
    /// snapshot containing it. No retry is attempted on failure.
    pub fn append(
        &self,
        collection: &CollectionPath,
        input: &NewExchangeItemInput,
    ) -> Result<DocumentId, WriteError> {
        let Some(owner_id) = self.identity.current_user_id() else {
            warn!(
                "event=exchange_append module=sync status=error kind={} error_code=identity_unavailable",
                input.kind
            );
            return Err(WriteError::IdentityUnavailable);
        };

        let fields = input.to_fields(&owner_id, now_epoch_ms())?;
        match self.store.append(collection, fields) {
            Ok(id) => {
                info!(
                    "event=exchange_append module=sync status=ok kind={} collection={}",
                    input.kind, collection
                );
                Ok(id)
            }
            Err(err) => {
                error!(
                    "event=exchange_append module=sync status=error kind={} collection={} error={}",
                    input.kind, collection, err
                );
                Err(WriteError::Store(err))
            }
        }
    }

    /// Copy of the current lists.
    pub fn listings(&self) -> Listings {
        lock(&self.state).listings.clone()
    }

    pub fn donations(&self) -> Vec<ExchangeItem> {
        lock(&self.state).listings.donations.clone()
    }

    pub fn requests(&self) -> Vec<ExchangeItem> {
        lock(&self.state).listings.requests.clone()
    }

    /// Most recent feed failure since the last successful subscribe.
    pub fn last_error(&self) -> Option<SubscriptionError> {
        lock(&self.state).last_error.clone()
    }

    /// Whether snapshots are currently being applied.
    pub fn is_subscribed(&self) -> bool {
        lock(&self.state).live_generation.is_some()
    }

    /// Number of snapshots applied over this synchronizer's lifetime.
    pub fn snapshot_count(&self) -> u64 {
        lock(&self.state).snapshot_count
    }
}

impl Drop for ListingSynchronizer {
    fn drop(&mut self) {
        self.close();
    }
}

fn snapshot_listener(
    state: Weak<Mutex<SyncState>>,
    generation: u64,
) -> Arc<dyn Fn(Snapshot) + Send + Sync> {
    Arc::new(move |snapshot: Snapshot| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let listings = partition_snapshot(&snapshot);

        let mut state = lock(&state);
        if state.live_generation != Some(generation) {
            debug!("event=exchange_snapshot module=sync status=ignored generation={generation}");
            return;
        }
        if matches!(state.applied_revision, Some(applied) if snapshot.revision < applied) {
            debug!(
                "event=exchange_snapshot module=sync status=stale revision={}",
                snapshot.revision
            );
            return;
        }
        debug!(
            "event=exchange_snapshot module=sync status=ok size={} donations={} requests={} dropped={}",
            snapshot.len(),
            listings.donations.len(),
            listings.requests.len(),
            listings.dropped.len()
        );
        state.applied_revision = Some(snapshot.revision);
        state.listings = listings;
        state.snapshot_count += 1;
    })
}

fn error_listener(
    state: Weak<Mutex<SyncState>>,
    generation: u64,
    collection: CollectionPath,
) -> Arc<dyn Fn(StoreError) + Send + Sync> {
    Arc::new(move |err: StoreError| {
        let Some(state) = state.upgrade() else {
            return;
        };
        let mut state = lock(&state);
        if state.live_generation != Some(generation) {
            return;
        }
        error!(
            "event=exchange_feed module=sync status=error collection={} error={}",
            collection, err
        );
        state.live_generation = None;
        state.last_error = Some(SubscriptionError::new(&collection, &err));
    })
}

fn lock(state: &Mutex<SyncState>) -> MutexGuard<'_, SyncState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
