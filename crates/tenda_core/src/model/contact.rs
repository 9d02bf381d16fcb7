//! "Get Involved" contact signup model.
//!
//! # Invariants
//! - At least one contact method (email, phone, address) is non-blank.
//! - A non-blank email has a `local@domain.tld` shape.

use crate::identity::UserId;
use crate::store::Fields;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// How the person signing up relates to the community.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactRole {
    /// Person with a disability.
    #[default]
    #[serde(rename = "PWD")]
    Pwd,
    #[serde(rename = "Caregiver")]
    Caregiver,
}

impl ContactRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pwd => "PWD",
            Self::Caregiver => "Caregiver",
        }
    }

    /// Parses a role label case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pwd" => Some(Self::Pwd),
            "caregiver" => Some(Self::Caregiver),
            _ => None,
        }
    }
}

impl Display for ContactRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Form contents submitted by someone joining the community.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSignup {
    pub role: ContactRole,
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactValidationError {
    /// Email, phone and address are all blank.
    NoContactMethod,
    InvalidEmail(String),
}

impl Display for ContactValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoContactMethod => write!(f, "at least one contact method is required"),
            Self::InvalidEmail(value) => write!(f, "invalid email address: `{value}`"),
        }
    }
}

impl Error for ContactValidationError {}

impl ContactSignup {
    pub fn new(role: ContactRole) -> Self {
        Self {
            role,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ContactValidationError> {
        let email = self.email.trim();
        if email.is_empty() && self.phone.trim().is_empty() && self.address.trim().is_empty() {
            return Err(ContactValidationError::NoContactMethod);
        }
        if !email.is_empty() && !EMAIL_RE.is_match(email) {
            return Err(ContactValidationError::InvalidEmail(email.to_string()));
        }
        Ok(())
    }

    /// Builds the stored document body, trimming every contact field.
    pub fn to_fields(
        &self,
        user_id: &UserId,
        created_at: i64,
    ) -> Result<Fields, ContactValidationError> {
        self.validate()?;

        let mut fields = Fields::new();
        fields.insert("role".into(), Value::from(self.role.as_str()));
        fields.insert("email".into(), Value::from(self.email.trim()));
        fields.insert("phone".into(), Value::from(self.phone.trim()));
        fields.insert("address".into(), Value::from(self.address.trim()));
        fields.insert("user_id".into(), Value::from(user_id.as_str()));
        fields.insert("created_at".into(), Value::from(created_at));
        Ok(fields)
    }

    /// Clears contact fields after a successful submit, keeping the role.
    pub fn reset_contact_fields(&mut self) {
        self.email.clear();
        self.phone.clear();
        self.address.clear();
    }
}
