//! Document store contract and in-process backends.
//!
//! # Responsibility
//! - Define the collaborator boundary the exchange features read and write.
//! - Provide memory and SQLite backends that honor snapshot delivery.
//!
//! # Invariants
//! - Every change to a collection is followed by a full snapshot (not a diff)
//!   to each listener of that collection.
//! - A new listener receives the current snapshot on registration.
//! - Snapshot revisions of one collection never decrease across changes;
//!   delivery order between concurrent changes is not guaranteed.
//! - Listener callbacks run outside store locks.
//! - Document ids are assigned by the store and never reused.

use crate::db::DbError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

mod listeners;
pub mod memory;
pub mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// Raw document body as stored in a collection.
pub type Fields = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Called with the full current contents of a collection.
pub type SnapshotListener = Arc<dyn Fn(Snapshot) + Send + Sync>;

/// Called once when a live feed fails; no snapshots follow it.
pub type ErrorListener = Arc<dyn Fn(StoreError) + Send + Sync>;

/// Opaque store-assigned document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generates a fresh identifier for a new document.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wraps an identifier that already exists in a backend.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DocumentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One addressable record in a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

/// Full point-in-time listing of a collection, in store-defined order.
///
/// `revision` grows with every change to the collection, so a listener that
/// receives two snapshots out of order can keep the newer one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub revision: u64,
    pub documents: Vec<Document>,
}

impl Snapshot {
    /// Snapshot at revision `0`, for sources that do not track revisions.
    pub fn new(documents: Vec<Document>) -> Self {
        Self::at_revision(0, documents)
    }

    pub fn at_revision(revision: u64, documents: Vec<Document>) -> Self {
        Self {
            revision,
            documents,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Handle to one registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wraps a backend-specific listener number.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Slash-separated name of one logical collection.
///
/// Segments are non-blank and never contain `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Parses and validates a raw collection path.
    pub fn new(raw: &str) -> StoreResult<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() || trimmed.split('/').any(|segment| segment.trim().is_empty()) {
            return Err(StoreError::InvalidPath(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Shared equipment exchange collection for one deployment.
    pub fn exchange(app_id: &str) -> StoreResult<Self> {
        let app_id = path_segment(app_id)?;
        Self::new(&format!("artifacts/{app_id}/public/data/equipmentExchange"))
    }

    /// Private contact signup collection for one user of a deployment.
    pub fn contacts(app_id: &str, user_id: &str) -> StoreResult<Self> {
        let app_id = path_segment(app_id)?;
        let user_id = path_segment(user_id)?;
        Self::new(&format!("artifacts/{app_id}/users/{user_id}/contacts"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CollectionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn path_segment(value: &str) -> StoreResult<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.contains('/') {
        return Err(StoreError::InvalidPath(value.to_string()));
    }
    Ok(trimmed)
}

/// Backend failure for reads, writes and live feeds.
#[derive(Debug)]
pub enum StoreError {
    InvalidPath(String),
    PermissionDenied(String),
    Unavailable(String),
    Encoding(String),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPath(path) => write!(f, "invalid collection path: `{path}`"),
            Self::PermissionDenied(path) => write!(f, "permission denied for `{path}`"),
            Self::Unavailable(reason) => write!(f, "store unavailable: {reason}"),
            Self::Encoding(message) => write!(f, "document encoding failed: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encoding(value.to_string())
    }
}

/// Live document store used by the exchange and contact features.
pub trait DocumentStore: Send + Sync {
    /// Registers a listener and delivers the current snapshot to it.
    fn subscribe(
        &self,
        path: &CollectionPath,
        on_snapshot: SnapshotListener,
        on_error: ErrorListener,
    ) -> StoreResult<SubscriptionId>;

    /// Removes a listener. Unknown or already removed ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Appends a new document and returns its assigned id.
    fn append(&self, path: &CollectionPath, fields: Fields) -> StoreResult<DocumentId>;
}

#[cfg(test)]
mod tests {
    use super::{CollectionPath, DocumentId, StoreError};

    #[test]
    fn exchange_path_uses_public_data_namespace() {
        let path = CollectionPath::exchange("tenda-care-default").unwrap();
        assert_eq!(
            path.as_str(),
            "artifacts/tenda-care-default/public/data/equipmentExchange"
        );
    }

    #[test]
    fn contacts_path_is_scoped_per_user() {
        let path = CollectionPath::contacts("app", " u1 ").unwrap();
        assert_eq!(path.as_str(), "artifacts/app/users/u1/contacts");
    }

    #[test]
    fn rejects_blank_or_nested_segments() {
        assert!(matches!(
            CollectionPath::exchange("a/b"),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            CollectionPath::contacts("app", "  "),
            Err(StoreError::InvalidPath(_))
        ));
        assert!(matches!(
            CollectionPath::new("artifacts//x"),
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(DocumentId::generate(), DocumentId::generate());
    }
}
