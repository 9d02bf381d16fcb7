//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist collections across sessions in one `documents` table.
//! - Fan snapshots out to in-process listeners after each write.
//!
//! # Invariants
//! - Snapshot order is the insertion sequence (`seq ASC`); the snapshot
//!   revision is the highest `seq` in the collection.
//! - Document bodies are stored as JSON objects. A body that is not one reads
//!   as empty fields, so one bad row never hides the rest of the collection.
//! - Appends to a read-only collection fail with `PermissionDenied`.

use super::listeners::ListenerSet;
use super::{
    CollectionPath, Document, DocumentId, DocumentStore, ErrorListener, Fields, Snapshot,
    SnapshotListener, StoreError, StoreResult, SubscriptionId,
};
use crate::db::{open_db, open_db_in_memory};
use log::{debug, error, warn};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Persistent [`DocumentStore`] over a single SQLite connection.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
    listeners: ListenerSet,
}

impl SqliteDocumentStore {
    /// Opens (or creates) a store at `path`, applying migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    /// Opens a throwaway in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps an already migrated connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            listeners: ListenerSet::default(),
        }
    }

    /// Reads the current contents of one collection.
    pub fn snapshot(&self, path: &CollectionPath) -> StoreResult<Snapshot> {
        load_snapshot(&self.conn(), path)
    }

    /// Marks a collection read-only (`true`) or writable (`false`).
    pub fn set_read_only(&self, path: &CollectionPath, read_only: bool) -> StoreResult<()> {
        let conn = self.conn();
        if read_only {
            conn.execute(
                "INSERT OR IGNORE INTO read_only_collections (collection) VALUES (?1);",
                [path.as_str()],
            )?;
        } else {
            conn.execute(
                "DELETE FROM read_only_collections WHERE collection = ?1;",
                [path.as_str()],
            )?;
        }
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for SqliteDocumentStore {
    fn subscribe(
        &self,
        path: &CollectionPath,
        on_snapshot: SnapshotListener,
        on_error: ErrorListener,
    ) -> StoreResult<SubscriptionId> {
        // Registering under the connection lock keeps concurrent appends from
        // slipping between the initial read and the first broadcast.
        let (id, initial) = {
            let conn = self.conn();
            let initial = load_snapshot(&conn, path)?;
            (self.listeners.register(path, on_snapshot, on_error), initial)
        };
        debug!(
            "event=store_subscribe module=store status=ok backend=sqlite collection={} subscription={} size={}",
            path,
            id.get(),
            initial.len()
        );
        self.listeners.deliver_to(id, initial);
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if self.listeners.remove(id) {
            debug!(
                "event=store_unsubscribe module=store status=ok backend=sqlite subscription={}",
                id.get()
            );
        }
    }

    fn append(&self, path: &CollectionPath, fields: Fields) -> StoreResult<DocumentId> {
        let id = DocumentId::generate();
        let body = serde_json::to_string(&Value::Object(fields))?;

        let refreshed = {
            let conn = self.conn();
            if is_read_only(&conn, path)? {
                return Err(StoreError::PermissionDenied(path.to_string()));
            }
            conn.execute(
                "INSERT INTO documents (collection, doc_id, data) VALUES (?1, ?2, ?3);",
                params![path.as_str(), id.as_str(), body],
            )?;
            load_snapshot(&conn, path)
        };

        match refreshed {
            Ok(snapshot) => {
                debug!(
                    "event=store_append module=store status=ok backend=sqlite collection={} size={}",
                    path,
                    snapshot.len()
                );
                self.listeners.broadcast(path, &snapshot);
            }
            Err(err) => {
                // The write is committed; only the refresh failed.
                error!(
                    "event=store_refresh module=store status=error backend=sqlite collection={} error={}",
                    path, err
                );
                let message = err.to_string();
                self.listeners
                    .notify_error(path, || StoreError::Unavailable(message.clone()));
            }
        }

        Ok(id)
    }
}

fn is_read_only(conn: &Connection, path: &CollectionPath) -> StoreResult<bool> {
    let hit = conn
        .query_row(
            "SELECT 1 FROM read_only_collections WHERE collection = ?1;",
            [path.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

fn load_snapshot(conn: &Connection, path: &CollectionPath) -> StoreResult<Snapshot> {
    let mut stmt = conn.prepare(
        "SELECT seq, doc_id, data
         FROM documents
         WHERE collection = ?1
         ORDER BY seq ASC;",
    )?;
    let mut rows = stmt.query([path.as_str()])?;
    let mut documents = Vec::new();
    let mut revision = 0_u64;

    while let Some(row) = rows.next()? {
        let seq: i64 = row.get("seq")?;
        let doc_id: String = row.get("doc_id")?;
        let data: String = row.get("data")?;
        revision = revision.max(u64::try_from(seq).unwrap_or(0));
        documents.push(Document {
            fields: decode_body(path, &doc_id, &data),
            id: DocumentId::from_raw(doc_id),
        });
    }

    Ok(Snapshot::at_revision(revision, documents))
}

/// Parses a stored body; anything but a JSON object reads as empty fields.
fn decode_body(path: &CollectionPath, doc_id: &str, data: &str) -> Fields {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => {
            warn!(
                "event=store_decode module=store status=error backend=sqlite collection={} doc_id={} error_code=not_an_object",
                path, doc_id
            );
            Fields::new()
        }
        Err(err) => {
            warn!(
                "event=store_decode module=store status=error backend=sqlite collection={} doc_id={} error_code=invalid_json error={}",
                path, doc_id, err
            );
            Fields::new()
        }
    }
}
