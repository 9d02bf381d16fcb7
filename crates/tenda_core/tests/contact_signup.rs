use std::sync::Arc;
use tenda_core::service::contact_service::{
    AUTH_NOT_READY_MESSAGE, INVALID_EMAIL_MESSAGE, NO_CONTACT_METHOD_MESSAGE,
    SUBMIT_FAILED_MESSAGE,
};
use tenda_core::{
    CollectionPath, ContactError, ContactRole, ContactService, ContactSignup,
    ContactValidationError, IdentitySlot, MemoryDocumentStore, StatusKind,
};

const APP_ID: &str = "contact-test";

fn setup(user: Option<&str>) -> (Arc<MemoryDocumentStore>, ContactService) {
    let store = Arc::new(MemoryDocumentStore::new());
    let identity = Arc::new(IdentitySlot::new());
    if let Some(user) = user {
        identity.establish(user).unwrap();
    }
    let service = ContactService::new(store.clone(), identity, APP_ID);
    (store, service)
}

fn contacts_path(user: &str) -> CollectionPath {
    CollectionPath::contacts(APP_ID, user).unwrap()
}

#[test]
fn signup_is_stored_under_the_users_private_collection() {
    let (store, service) = setup(Some("u1"));
    let mut signup = ContactSignup::new(ContactRole::Caregiver);
    signup.email = " carer@example.org ".into();

    let id = service.sign_up(&signup).unwrap();

    let snapshot = store.snapshot(&contacts_path("u1"));
    assert_eq!(snapshot.len(), 1);
    let stored = &snapshot.documents[0];
    assert_eq!(stored.id, id);
    assert_eq!(stored.fields["role"], "Caregiver");
    assert_eq!(stored.fields["email"], "carer@example.org");
    assert_eq!(stored.fields["phone"], "");
    assert_eq!(stored.fields["user_id"], "u1");
    assert!(stored.fields["created_at"].is_i64());
}

#[test]
fn submit_success_clears_contact_fields_and_keeps_role() {
    let (_store, service) = setup(Some("u1"));
    let mut signup = ContactSignup::new(ContactRole::Pwd);
    signup.phone = "+256 700 000000".into();
    signup.address = "Kampala".into();

    let status = service.submit(&mut signup);

    assert_eq!(status.kind, StatusKind::Success);
    assert_eq!(
        status.message,
        "Thank you for signing up as a PWD! We'll be in touch."
    );
    assert_eq!(signup, ContactSignup::new(ContactRole::Pwd));
}

#[test]
fn signup_requires_at_least_one_contact_method() {
    let (store, service) = setup(Some("u1"));
    let mut signup = ContactSignup::new(ContactRole::Pwd);
    signup.email = "   ".into();

    assert!(matches!(
        service.sign_up(&signup),
        Err(ContactError::Validation(
            ContactValidationError::NoContactMethod
        ))
    ));
    let status = service.submit(&mut signup);
    assert_eq!(status.message, NO_CONTACT_METHOD_MESSAGE);
    assert!(store.is_empty(&contacts_path("u1")));
}

#[test]
fn malformed_email_is_rejected_even_with_other_methods() {
    let (store, service) = setup(Some("u1"));
    let mut signup = ContactSignup::new(ContactRole::Caregiver);
    signup.email = "not-an-email".into();
    signup.phone = "0700".into();

    let status = service.submit(&mut signup);

    assert_eq!(status.kind, StatusKind::Error);
    assert_eq!(status.message, INVALID_EMAIL_MESSAGE);
    assert_eq!(signup.phone, "0700");
    assert!(store.is_empty(&contacts_path("u1")));
}

#[test]
fn signup_waits_for_identity() {
    let (_store, service) = setup(None);
    let mut signup = ContactSignup::new(ContactRole::Pwd);
    signup.email = "a@b.co".into();

    let status = service.submit(&mut signup);

    assert_eq!(status.message, AUTH_NOT_READY_MESSAGE);
    assert_eq!(signup.email, "a@b.co");
}

#[test]
fn store_rejection_keeps_form_contents() {
    let (store, service) = setup(Some("u1"));
    store.deny_writes(&contacts_path("u1"));
    let mut signup = ContactSignup::new(ContactRole::Pwd);
    signup.email = "a@b.co".into();

    let status = service.submit(&mut signup);

    assert_eq!(status.message, SUBMIT_FAILED_MESSAGE);
    assert_eq!(signup.email, "a@b.co");
}

#[test]
fn role_labels_parse_case_insensitively() {
    assert_eq!(ContactRole::parse("pwd"), Some(ContactRole::Pwd));
    assert_eq!(ContactRole::parse(" CAREGIVER "), Some(ContactRole::Caregiver));
    assert_eq!(ContactRole::parse("Volunteer"), None);
    assert_eq!(ContactRole::default(), ContactRole::Pwd);
}
