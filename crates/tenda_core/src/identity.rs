//! Current-user identity as seen by write paths.
//!
//! # Responsibility
//! - Model the identity provider as an explicit collaborator.
//! - Hold the stable user id once authentication has completed elsewhere.
//!
//! # Invariants
//! - A `UserId` is never blank.
//! - No authentication happens here; callers push ids in.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

/// Stable opaque identifier of an authenticated (or anonymous) user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Validates and wraps a provider-issued id.
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentityError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::BlankUserId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Random id for sessions where the provider never came up.
    pub fn anonymous() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    BlankUserId,
}

impl Display for IdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankUserId => write!(f, "user id cannot be blank"),
        }
    }
}

impl Error for IdentityError {}

/// Supplies the current user id, or `None` while authentication is pending.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<UserId>;
}

/// Settable identity shared between the auth glue and the core.
#[derive(Debug, Default)]
pub struct IdentitySlot {
    current: RwLock<Option<UserId>>,
}

impl IdentitySlot {
    /// Creates an empty slot (identity not yet established).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot that already holds `user_id`.
    pub fn with_user(user_id: UserId) -> Self {
        Self {
            current: RwLock::new(Some(user_id)),
        }
    }

    /// Records the id delivered by the identity provider.
    pub fn establish(&self, raw: impl Into<String>) -> Result<UserId, IdentityError> {
        let user_id = UserId::new(raw)?;
        self.set(Some(user_id.clone()));
        Ok(user_id)
    }

    /// Records a fresh random id when the provider is unavailable.
    pub fn establish_anonymous(&self) -> UserId {
        let user_id = UserId::anonymous();
        self.set(Some(user_id.clone()));
        user_id
    }

    /// Forgets the current id (for example after sign-out).
    pub fn clear(&self) {
        self.set(None);
    }

    pub fn is_established(&self) -> bool {
        self.current_user_id().is_some()
    }

    fn set(&self, value: Option<UserId>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl IdentityProvider for IdentitySlot {
    fn current_user_id(&self) -> Option<UserId> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{IdentityError, IdentityProvider, IdentitySlot, UserId};

    #[test]
    fn slot_starts_empty_and_accepts_trimmed_ids() {
        let slot = IdentitySlot::new();
        assert!(!slot.is_established());

        let user_id = slot.establish("  u1 ").expect("id should be accepted");
        assert_eq!(user_id.as_str(), "u1");
        assert_eq!(slot.current_user_id(), Some(user_id));
    }

    #[test]
    fn blank_ids_are_rejected_and_leave_slot_untouched() {
        let slot = IdentitySlot::with_user(UserId::new("u1").unwrap());
        assert_eq!(slot.establish("   "), Err(IdentityError::BlankUserId));
        assert_eq!(slot.current_user_id().unwrap().as_str(), "u1");
    }

    #[test]
    fn anonymous_ids_are_unique_and_clear_resets() {
        let slot = IdentitySlot::new();
        let first = slot.establish_anonymous();
        let second = UserId::anonymous();
        assert_ne!(first, second);

        slot.clear();
        assert!(slot.current_user_id().is_none());
    }
}
