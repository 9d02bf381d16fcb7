use std::sync::{Arc, Mutex};
use tenda_core::{
    CollectionPath, DocumentStore, IdentitySlot, ListingSynchronizer, NewExchangeItemInput,
    Snapshot, SqliteDocumentStore, StoreError, WriteError,
};

fn path() -> CollectionPath {
    CollectionPath::exchange("sqlite-test").unwrap()
}

#[test]
fn appended_documents_survive_reopen_in_insertion_order() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tenda.sqlite3");
    let identity = Arc::new(IdentitySlot::new());
    identity.establish("u1").unwrap();

    {
        let store = Arc::new(SqliteDocumentStore::open(&db_path).unwrap());
        let sync = ListingSynchronizer::new(store, identity.clone());
        sync.append(&path(), &NewExchangeItemInput::donation("Walker", None))
            .unwrap();
        sync.append(&path(), &NewExchangeItemInput::request("Ramp", None))
            .unwrap();
        sync.append(&path(), &NewExchangeItemInput::donation("Crutches", None))
            .unwrap();
    }

    let store = Arc::new(SqliteDocumentStore::open(&db_path).unwrap());
    let mut sync = ListingSynchronizer::new(store, identity);
    sync.subscribe(&path()).unwrap();

    let listings = sync.listings();
    let donations = listings
        .donations
        .iter()
        .map(|item| item.label.as_str())
        .collect::<Vec<_>>();
    assert_eq!(donations, vec!["Walker", "Crutches"]);
    assert_eq!(listings.requests[0].label, "Ramp");
}

#[test]
fn listeners_receive_snapshot_after_each_append() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sink = sizes.clone();
    store
        .subscribe(
            &path(),
            Arc::new(move |snapshot: Snapshot| sink.lock().unwrap().push(snapshot.len())),
            Arc::new(|_| {}),
        )
        .unwrap();

    let mut fields = tenda_core::Fields::new();
    fields.insert("type".into(), "donation".into());
    store.append(&path(), fields.clone()).unwrap();
    store.append(&path(), fields).unwrap();

    assert_eq!(*sizes.lock().unwrap(), vec![0, 1, 2]);
}

#[test]
fn collections_are_isolated() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let other = CollectionPath::exchange("another-app").unwrap();
    store.append(&path(), tenda_core::Fields::new()).unwrap();

    assert_eq!(store.snapshot(&path()).unwrap().len(), 1);
    assert!(store.snapshot(&other).unwrap().is_empty());
}

#[test]
fn read_only_collection_rejects_append_without_mutation() {
    let store = Arc::new(SqliteDocumentStore::open_in_memory().unwrap());
    store.set_read_only(&path(), true).unwrap();
    let identity = Arc::new(IdentitySlot::new());
    identity.establish("u1").unwrap();
    let sync = ListingSynchronizer::new(store.clone(), identity);

    let err = sync
        .append(&path(), &NewExchangeItemInput::donation("Walker", None))
        .unwrap_err();
    assert!(matches!(
        err,
        WriteError::Store(StoreError::PermissionDenied(_))
    ));
    assert!(store.snapshot(&path()).unwrap().is_empty());

    store.set_read_only(&path(), false).unwrap();
    sync.append(&path(), &NewExchangeItemInput::donation("Walker", None))
        .unwrap();
    assert_eq!(store.snapshot(&path()).unwrap().len(), 1);
}

#[test]
fn unsubscribe_on_sqlite_store_is_idempotent() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    let calls = Arc::new(Mutex::new(0));
    let sink = calls.clone();
    let id = store
        .subscribe(
            &path(),
            Arc::new(move |_| *sink.lock().unwrap() += 1),
            Arc::new(|_| {}),
        )
        .unwrap();

    store.unsubscribe(id);
    store.unsubscribe(id);
    store.append(&path(), tenda_core::Fields::new()).unwrap();
    assert_eq!(*calls.lock().unwrap(), 1);
}

#[test]
fn unreadable_body_does_not_hide_the_rest_of_the_collection() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tenda.sqlite3");
    let identity = Arc::new(IdentitySlot::new());
    identity.establish("u1").unwrap();
    {
        let store = Arc::new(SqliteDocumentStore::open(&db_path).unwrap());
        let sync = ListingSynchronizer::new(store, identity.clone());
        sync.append(&path(), &NewExchangeItemInput::donation("Walker", None))
            .unwrap();
        sync.append(&path(), &NewExchangeItemInput::donation("Crutches", None))
            .unwrap();
    }

    let raw = rusqlite::Connection::open(&db_path).unwrap();
    raw.execute("UPDATE documents SET data = '\"x\"' WHERE seq = 1;", [])
        .unwrap();
    drop(raw);

    let store = Arc::new(SqliteDocumentStore::open(&db_path).unwrap());
    let snapshot = store.snapshot(&path()).unwrap();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.documents[0].fields.is_empty());

    let mut sync = ListingSynchronizer::new(store, identity);
    sync.subscribe(&path()).unwrap();
    let listings = sync.listings();
    assert_eq!(listings.donations.len(), 1);
    assert_eq!(listings.donations[0].label, "Crutches");
    assert_eq!(listings.dropped.len(), 1);
}

#[test]
fn snapshot_revision_follows_the_latest_write() {
    let store = SqliteDocumentStore::open_in_memory().unwrap();
    assert_eq!(store.snapshot(&path()).unwrap().revision, 0);

    store.append(&path(), tenda_core::Fields::new()).unwrap();
    let first = store.snapshot(&path()).unwrap().revision;
    store
        .append(&CollectionPath::exchange("elsewhere").unwrap(), tenda_core::Fields::new())
        .unwrap();
    store.append(&path(), tenda_core::Fields::new()).unwrap();

    assert!(store.snapshot(&path()).unwrap().revision > first);
}
