//! Use-case services behind the exchange and signup forms.
//!
//! # Responsibility
//! - Orchestrate synchronizer and store calls into form-level operations.
//! - Translate failures into the inline status messages users see.

pub mod contact_service;
pub mod exchange_service;
pub mod form_status;
