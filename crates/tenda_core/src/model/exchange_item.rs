//! Equipment exchange record model.
//!
//! # Responsibility
//! - Define donation/request records shared by every exchange view.
//! - Decode store documents into records and encode new submissions.
//!
//! # Invariants
//! - `id` is assigned by the store and never reused.
//! - `kind` and `created_at` are fixed at write time.
//! - Documents whose `type` is neither `donation` nor `request` decode to
//!   `ItemDecodeError::UnknownKind` and are filtered out by callers. Any
//!   document with a known `type` decodes.

use crate::identity::UserId;
use crate::store::{Document, DocumentId, Fields};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Status given to donations when the submitter does not choose one.
pub const DEFAULT_DONATION_STATUS: &str = "Available";
/// Status given to requests when the submitter does not choose one.
pub const DEFAULT_REQUEST_STATUS: &str = "Pending";

/// Discriminates which exchange list an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
    /// Equipment offered by a donor.
    Donation,
    /// Equipment asked for by an applicant.
    Request,
}

impl ExchangeKind {
    /// Wire tag stored in the document `type` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Donation => "donation",
            Self::Request => "request",
        }
    }

    /// Parses a wire tag. Unknown tags yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "donation" => Some(Self::Donation),
            "request" => Some(Self::Request),
            _ => None,
        }
    }

    pub fn default_status(self) -> &'static str {
        match self {
            Self::Donation => DEFAULT_DONATION_STATUS,
            Self::Request => DEFAULT_REQUEST_STATUS,
        }
    }
}

impl Display for ExchangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One donation or request as rendered by the exchange lists.
///
/// Only `kind` is required of a stored document; every other field falls
/// back to an empty value when it is absent or not of the expected type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeItem {
    pub id: DocumentId,
    pub kind: ExchangeKind,
    /// Equipment name (donation) or desired item (request).
    pub label: String,
    /// Meaningful only when `kind == ExchangeKind::Donation`.
    pub condition: Option<String>,
    /// Meaningful only when `kind == ExchangeKind::Request`.
    pub disability_context: Option<String>,
    /// Free-text lifecycle label; any value may replace any other.
    pub status: String,
    pub owner_id: Option<String>,
    /// Unix epoch milliseconds.
    pub created_at: Option<i64>,
}

/// Why a store document is not shown in either exchange list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemDecodeError {
    /// `type` missing or not a known exchange kind.
    UnknownKind(Option<String>),
}

impl Display for ItemDecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKind(Some(tag)) => write!(f, "unknown exchange kind `{tag}`"),
            Self::UnknownKind(None) => write!(f, "exchange kind is missing"),
        }
    }
}

impl Error for ItemDecodeError {}

impl ExchangeItem {
    /// Decodes one store document.
    ///
    /// Legacy field names written by the first version of the site
    /// (`name`/`item`, `disabilityType`, `donorId`/`applicantId`) are read
    /// when the current names are absent.
    pub fn from_document(document: &Document) -> Result<Self, ItemDecodeError> {
        let fields = &document.fields;
        let kind = match fields.get("type") {
            Some(Value::String(tag)) => ExchangeKind::parse(tag)
                .ok_or_else(|| ItemDecodeError::UnknownKind(Some(tag.clone())))?,
            Some(other) => return Err(ItemDecodeError::UnknownKind(Some(other.to_string()))),
            None => return Err(ItemDecodeError::UnknownKind(None)),
        };

        let legacy_label = match kind {
            ExchangeKind::Donation => "name",
            ExchangeKind::Request => "item",
        };
        let legacy_owner = match kind {
            ExchangeKind::Donation => "donorId",
            ExchangeKind::Request => "applicantId",
        };

        Ok(Self {
            id: document.id.clone(),
            kind,
            label: text(fields, &["label", legacy_label]).unwrap_or_default(),
            condition: text(fields, &["condition"]),
            disability_context: text(fields, &["disability_context", "disabilityType"]),
            status: text(fields, &["status"]).unwrap_or_default(),
            owner_id: text(fields, &["owner_id", legacy_owner]),
            created_at: fields.get("created_at").and_then(Value::as_i64),
        })
    }
}

/// First string value among `keys`.
fn text(fields: &Fields, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| fields.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

impl NewExchangeItemInput {
    /// Offer of equipment with a free-text condition.
    pub fn donation(label: impl Into<String>, condition: Option<String>) -> Self {
        Self {
            kind: ExchangeKind::Donation,
            label: label.into(),
            condition,
            disability_context: None,
            status: None,
        }
    }

    /// Ask for equipment with a free-text disability context.
    pub fn request(label: impl Into<String>, disability_context: Option<String>) -> Self {
        Self {
            kind: ExchangeKind::Request,
            label: label.into(),
            condition: None,
            disability_context,
            status: None,
        }
    }

    /// Overrides the default status.
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn validate(&self) -> Result<(), ExchangeValidationError> {
        if self.label.trim().is_empty() {
            return Err(ExchangeValidationError::BlankLabel);
        }
        if matches!(&self.status, Some(status) if status.trim().is_empty()) {
            return Err(ExchangeValidationError::BlankStatus);
        }
        Ok(())
    }

    /// Builds the stored document body for this submission.
    ///
    /// Blank optional descriptors are dropped rather than stored empty.
    pub fn to_fields(
        &self,
        owner_id: &UserId,
        created_at: i64,
    ) -> Result<Fields, ExchangeValidationError> {
        self.validate()?;

        let status = self
            .status
            .as_deref()
            .map(str::trim)
            .unwrap_or(self.kind.default_status());

        let mut fields = Fields::new();
        fields.insert("type".into(), Value::from(self.kind.as_str()));
        fields.insert("label".into(), Value::from(self.label.trim()));
        if let Some(condition) = non_blank(self.condition.as_deref()) {
            fields.insert("condition".into(), Value::from(condition));
        }
        if let Some(context) = non_blank(self.disability_context.as_deref()) {
            fields.insert("disability_context".into(), Value::from(context));
        }
        fields.insert("status".into(), Value::from(status));
        fields.insert("owner_id".into(), Value::from(owner_id.as_str()));
        fields.insert("created_at".into(), Value::from(created_at));
        Ok(fields)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
