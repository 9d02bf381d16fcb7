//! Core client logic for the Tenda Care site.
//! Owns the equipment exchange listings and the community signup write path;
//! UI shells (FFI, CLI) stay thin on top of it.

pub mod config;
pub mod db;
pub mod identity;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod sync;

pub use config::{ConfigError, TendaConfig};
pub use identity::{IdentityError, IdentityProvider, IdentitySlot, UserId};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::contact::{ContactRole, ContactSignup, ContactValidationError};
pub use model::exchange_item::{
    ExchangeItem, ExchangeKind, ExchangeValidationError, ItemDecodeError, NewExchangeItemInput,
};
pub use service::contact_service::{ContactError, ContactService};
pub use service::exchange_service::ExchangeService;
pub use service::form_status::{FormStatus, StatusKind};
pub use store::{
    CollectionPath, Document, DocumentId, DocumentStore, Fields, MemoryDocumentStore, Snapshot,
    SqliteDocumentStore, StoreError, StoreResult, SubscriptionId,
};
pub use sync::listing_sync::{
    partition_snapshot, ListingSynchronizer, Listings, SubscriptionError, SubscriptionHandle,
    WriteError,
};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
