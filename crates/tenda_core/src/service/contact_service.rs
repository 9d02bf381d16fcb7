//! "Get Involved" signup use-case service.
//!
//! # Responsibility
//! - Validate signups and append them to the user's private contacts
//!   collection.
//!
//! # Invariants
//! - Nothing is written while identity is pending or the form is invalid.
//! - Contact details are never logged.

use crate::identity::IdentityProvider;
use crate::model::contact::{ContactRole, ContactSignup, ContactValidationError};
use crate::model::now_epoch_ms;
use crate::service::form_status::FormStatus;
use crate::store::{CollectionPath, DocumentId, DocumentStore, StoreError};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub const AUTH_NOT_READY_MESSAGE: &str = "Authentication not ready. Please wait a moment.";
pub const NO_CONTACT_METHOD_MESSAGE: &str =
    "Please provide at least one contact method (Email, Phone, or Address).";
pub const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address.";
pub const SUBMIT_FAILED_MESSAGE: &str = "Submission failed due to a database error.";

#[derive(Debug)]
pub enum ContactError {
    IdentityUnavailable,
    Validation(ContactValidationError),
    Store(StoreError),
}

impl Display for ContactError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdentityUnavailable => write!(f, "user identity is not established yet"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "signup rejected: {err}"),
        }
    }
}

impl Error for ContactError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::IdentityUnavailable => None,
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ContactValidationError> for ContactError {
    fn from(value: ContactValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for ContactError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Signup form facade over the document store.
pub struct ContactService {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    app_id: String,
}

impl ContactService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        app_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            identity,
            app_id: app_id.into(),
        }
    }

    /// Stores one signup under the current user's contacts collection.
    pub fn sign_up(&self, signup: &ContactSignup) -> Result<DocumentId, ContactError> {
        let user_id = self
            .identity
            .current_user_id()
            .ok_or(ContactError::IdentityUnavailable)?;
        let fields = signup.to_fields(&user_id, now_epoch_ms())?;
        let collection = CollectionPath::contacts(&self.app_id, user_id.as_str())?;

        match self.store.append(&collection, fields) {
            Ok(id) => {
                info!(
                    "event=contact_sign_up module=service status=ok role={}",
                    signup.role
                );
                Ok(id)
            }
            Err(err) => {
                error!(
                    "event=contact_sign_up module=service status=error role={} error={}",
                    signup.role, err
                );
                Err(ContactError::Store(err))
            }
        }
    }

    /// Submits the form and reports the outcome as a status message.
    ///
    /// On success the contact fields are cleared and the role is kept.
    pub fn submit(&self, signup: &mut ContactSignup) -> FormStatus {
        let outcome = self.sign_up(signup);
        let status = describe_outcome(signup.role, &outcome);
        if outcome.is_ok() {
            signup.reset_contact_fields();
        }
        status
    }
}

/// Maps one signup outcome to the status shown under the signup form.
pub fn describe_outcome(
    role: ContactRole,
    outcome: &Result<DocumentId, ContactError>,
) -> FormStatus {
    match outcome {
        Ok(_) => FormStatus::success(format!(
            "Thank you for signing up as a {role}! We'll be in touch."
        )),
        Err(ContactError::IdentityUnavailable) => FormStatus::error(AUTH_NOT_READY_MESSAGE),
        Err(ContactError::Validation(ContactValidationError::NoContactMethod)) => {
            FormStatus::error(NO_CONTACT_METHOD_MESSAGE)
        }
        Err(ContactError::Validation(ContactValidationError::InvalidEmail(_))) => {
            FormStatus::error(INVALID_EMAIL_MESSAGE)
        }
        Err(ContactError::Store(_)) => FormStatus::error(SUBMIT_FAILED_MESSAGE),
    }
}
