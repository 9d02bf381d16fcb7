//! Equipment exchange use-case service.
//!
//! # Responsibility
//! - Own the synchronizer bound to one deployment's exchange collection.
//! - Map submit outcomes to the exchange page's status messages.
//!
//! # Invariants
//! - Submits never touch the lists directly.
//! - Failures are reported once per attempt; nothing is retried or queued.

use crate::config::TendaConfig;
use crate::identity::IdentityProvider;
use crate::model::exchange_item::{ExchangeKind, ExchangeValidationError, NewExchangeItemInput};
use crate::service::form_status::FormStatus;
use crate::store::{CollectionPath, DocumentId, DocumentStore, StoreResult};
use crate::sync::listing_sync::{
    Listings, ListingSynchronizer, SubscriptionError, SubscriptionHandle, WriteError,
};
use std::sync::Arc;

pub const IDENTITY_PENDING_MESSAGE: &str = "Please wait for user authentication to complete.";
pub const BLANK_LABEL_MESSAGE: &str = "Please enter the name of the item.";
pub const FEED_FAILED_MESSAGE: &str =
    "Live updates are unavailable right now. Showing the last known listings.";

/// Exchange page facade over a [`ListingSynchronizer`].
pub struct ExchangeService {
    sync: ListingSynchronizer,
    collection: CollectionPath,
}

impl ExchangeService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        collection: CollectionPath,
    ) -> Self {
        Self {
            sync: ListingSynchronizer::new(store, identity),
            collection,
        }
    }

    /// Builds a service for the configured deployment's exchange collection.
    pub fn for_config(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        config: &TendaConfig,
    ) -> StoreResult<Self> {
        Ok(Self::new(store, identity, config.exchange_collection()?))
    }

    /// Starts live listings.
    pub fn open(&mut self) -> Result<SubscriptionHandle, SubscriptionError> {
        let collection = self.collection.clone();
        self.sync.subscribe(&collection)
    }

    /// Stops live listings; current lists are kept.
    pub fn close(&mut self) {
        self.sync.close();
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn listings(&self) -> Listings {
        self.sync.listings()
    }

    pub fn is_live(&self) -> bool {
        self.sync.is_subscribed()
    }

    pub fn synchronizer(&self) -> &ListingSynchronizer {
        &self.sync
    }

    /// Appends one submission, returning the store-assigned id.
    pub fn add(&self, input: &NewExchangeItemInput) -> Result<DocumentId, WriteError> {
        self.sync.append(&self.collection, input)
    }

    /// Offers a piece of equipment.
    pub fn submit_donation(&self, label: &str, condition: Option<String>) -> FormStatus {
        self.submit(&NewExchangeItemInput::donation(label, condition))
    }

    /// Asks for a piece of equipment.
    pub fn submit_request(&self, label: &str, disability_context: Option<String>) -> FormStatus {
        self.submit(&NewExchangeItemInput::request(label, disability_context))
    }

    /// Submits any exchange input and reports the outcome as a form status.
    pub fn submit(&self, input: &NewExchangeItemInput) -> FormStatus {
        describe_outcome(input.kind, &self.add(input))
    }

    /// Error status while the live feed is down, `None` otherwise.
    pub fn subscription_status(&self) -> Option<FormStatus> {
        self.sync
            .last_error()
            .map(|_| FormStatus::error(FEED_FAILED_MESSAGE))
    }
}

/// Maps one append outcome to the status shown under the exchange form.
pub fn describe_outcome(
    kind: ExchangeKind,
    outcome: &Result<DocumentId, WriteError>,
) -> FormStatus {
    match outcome {
        Ok(id) => FormStatus::success(success_message(kind, id)),
        Err(WriteError::IdentityUnavailable) => FormStatus::error(IDENTITY_PENDING_MESSAGE),
        Err(WriteError::Validation(ExchangeValidationError::BlankLabel)) => {
            FormStatus::error(BLANK_LABEL_MESSAGE)
        }
        Err(WriteError::Validation(err)) => FormStatus::error(format!("{err}.")),
        Err(WriteError::Store(_)) => FormStatus::error(failure_message(kind)),
    }
}

fn success_message(kind: ExchangeKind, id: &DocumentId) -> String {
    match kind {
        ExchangeKind::Donation => {
            format!("Donation added! ID: {id}. Check the available list below.")
        }
        ExchangeKind::Request => {
            format!("Request submitted! ID: {id}. We will notify you when a match is found.")
        }
    }
}

fn failure_message(kind: ExchangeKind) -> &'static str {
    match kind {
        ExchangeKind::Donation => "Failed to submit donation due to a database error.",
        ExchangeKind::Request => "Failed to submit request due to a database error.",
    }
}

#[cfg(test)]
mod tests {
    use super::{ExchangeService, BLANK_LABEL_MESSAGE, FEED_FAILED_MESSAGE, IDENTITY_PENDING_MESSAGE};
    use crate::identity::IdentitySlot;
    use crate::service::form_status::StatusKind;
    use crate::store::{CollectionPath, MemoryDocumentStore};
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryDocumentStore>, Arc<IdentitySlot>, ExchangeService) {
        let store = Arc::new(MemoryDocumentStore::new());
        let identity = Arc::new(IdentitySlot::new());
        let service = ExchangeService::new(
            store.clone(),
            identity.clone(),
            CollectionPath::exchange("test-app").unwrap(),
        );
        (store, identity, service)
    }

    #[test]
    fn donation_success_message_carries_new_id() {
        let (_store, identity, mut service) = setup();
        identity.establish("donor-1").unwrap();
        service.open().unwrap();

        let status = service.submit_donation("Manual Wheelchair", Some("Excellent".into()));
        assert_eq!(status.kind, StatusKind::Success);
        let listings = service.listings();
        let id = &listings.donations[0].id;
        assert_eq!(
            status.message,
            format!("Donation added! ID: {id}. Check the available list below.")
        );
        assert_eq!(listings.donations[0].status, "Available");
    }

    #[test]
    fn request_defaults_to_pending() {
        let (_store, identity, mut service) = setup();
        identity.establish("applicant-1").unwrap();
        service.open().unwrap();

        let status = service.submit_request("Speech-to-Text License", Some("Hearing".into()));
        assert!(status.is_success());
        assert!(status.message.starts_with("Request submitted! ID: "));
        assert_eq!(service.listings().requests[0].status, "Pending");
    }

    #[test]
    fn missing_identity_and_blank_label_map_to_form_errors() {
        let (store, identity, service) = setup();
        let status = service.submit_donation("Walker", None);
        assert_eq!(status.kind, StatusKind::Error);
        assert_eq!(status.message, IDENTITY_PENDING_MESSAGE);

        identity.establish("u1").unwrap();
        let status = service.submit_request("   ", None);
        assert_eq!(status.message, BLANK_LABEL_MESSAGE);
        assert!(store.is_empty(service.collection()));
    }

    #[test]
    fn store_rejection_maps_to_database_error_message() {
        let (store, identity, service) = setup();
        identity.establish("u1").unwrap();
        store.deny_writes(service.collection());

        let status = service.submit_request("Braille display", None);
        assert_eq!(
            status.message,
            "Failed to submit request due to a database error."
        );
    }

    #[test]
    fn feed_failure_surfaces_subscription_status() {
        let (store, _identity, mut service) = setup();
        service.open().unwrap();
        assert!(service.subscription_status().is_none());

        store.fail_subscriptions(service.collection(), "connection lost");
        let status = service.subscription_status().expect("feed failure status");
        assert_eq!(status.message, FEED_FAILED_MESSAGE);
        assert!(!service.is_live());
    }
}
