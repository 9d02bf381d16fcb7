//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose the exchange and signup flows to Dart via FRB.
//! - Own the one process-wide session a UI bridge needs.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every outcome is returned as a plain envelope; nothing is thrown.
//! - The session store is opened lazily from `TendaConfig::from_env`.

use log::{error, info};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tenda_core::service::{contact_service, exchange_service};
use tenda_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    ContactRole, ContactService, ContactSignup, ExchangeItem, ExchangeService, IdentitySlot,
    NewExchangeItemInput, SqliteDocumentStore, TendaConfig,
};

static IDENTITY: OnceLock<Arc<IdentitySlot>> = OnceLock::new();
static SESSION: Mutex<Option<Session>> = Mutex::new(None);

const EXCHANGE_NOT_OPEN_MESSAGE: &str = "Exchange is not open.";

struct Session {
    exchange: ExchangeService,
    contacts: ContactService,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// One exchange listing row in display form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeItemView {
    pub id: String,
    /// `donation|request`.
    pub kind: String,
    pub label: String,
    pub condition: Option<String>,
    pub disability_context: Option<String>,
    pub status: String,
    pub owner_id: Option<String>,
    pub created_at_ms: Option<i64>,
}

/// Current exchange lists plus a status line for the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeListingsResponse {
    pub donations: Vec<ExchangeItemView>,
    pub requests: Vec<ExchangeItemView>,
    /// Whether live updates are flowing.
    pub live: bool,
    pub message: String,
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Created document or established user id, when there is one.
    pub id: Option<String>,
    /// Human-readable response message for UI.
    pub message: String,
}

impl EntryActionResponse {
    fn success(message: impl Into<String>, id: Option<String>) -> Self {
        Self {
            ok: true,
            id,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

/// Sets the signed-in user id.
///
/// # FFI contract
/// - Blank ids are rejected and leave the current identity untouched.
#[flutter_rust_bridge::frb(sync)]
pub fn identity_establish(user_id: String) -> EntryActionResponse {
    match identity().establish(user_id) {
        Ok(user_id) => EntryActionResponse::success("Signed in.", Some(user_id.to_string())),
        Err(err) => EntryActionResponse::failure(format!("identity_establish failed: {err}")),
    }
}

/// Signs in with a freshly generated anonymous id.
#[flutter_rust_bridge::frb(sync)]
pub fn identity_establish_anonymous() -> EntryActionResponse {
    let user_id = identity().establish_anonymous();
    EntryActionResponse::success("Signed in anonymously.", Some(user_id.to_string()))
}

/// Starts live exchange listings, opening the session store if needed.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Calling again replaces the previous subscription.
#[flutter_rust_bridge::frb(sync)]
pub fn exchange_open() -> EntryActionResponse {
    let mut guard = lock_session();
    let session = match ensure_session(&mut guard) {
        Ok(session) => session,
        Err(message) => return EntryActionResponse::failure(message),
    };
    match session.exchange.open() {
        Ok(_) => EntryActionResponse::success("Exchange listings are live.", None),
        Err(err) => EntryActionResponse::failure(format!("exchange_open failed: {err}")),
    }
}

/// Returns the current donation and request lists.
///
/// # FFI contract
/// - Never opens the session; returns empty lists until `exchange_open`.
#[flutter_rust_bridge::frb(sync)]
pub fn exchange_listings() -> ExchangeListingsResponse {
    let guard = lock_session();
    let Some(session) = guard.as_ref() else {
        return ExchangeListingsResponse {
            donations: Vec::new(),
            requests: Vec::new(),
            live: false,
            message: EXCHANGE_NOT_OPEN_MESSAGE.to_string(),
        };
    };

    let listings = session.exchange.listings();
    let message = match session.exchange.subscription_status() {
        Some(status) => status.message,
        None => format!(
            "{} donation(s), {} request(s).",
            listings.donations.len(),
            listings.requests.len()
        ),
    };
    ExchangeListingsResponse {
        donations: listings.donations.iter().map(to_item_view).collect(),
        requests: listings.requests.iter().map(to_item_view).collect(),
        live: session.exchange.is_live(),
        message,
    }
}

/// Offers a piece of equipment.
#[flutter_rust_bridge::frb(sync)]
pub fn exchange_add_donation(label: String, condition: Option<String>) -> EntryActionResponse {
    exchange_submit(NewExchangeItemInput::donation(label, condition))
}

/// Asks for a piece of equipment.
#[flutter_rust_bridge::frb(sync)]
pub fn exchange_add_request(
    label: String,
    disability_context: Option<String>,
) -> EntryActionResponse {
    exchange_submit(NewExchangeItemInput::request(label, disability_context))
}

/// Stops live listings; the last lists stay readable.
#[flutter_rust_bridge::frb(sync)]
pub fn exchange_close() -> EntryActionResponse {
    if let Some(session) = lock_session().as_mut() {
        session.exchange.close();
    }
    EntryActionResponse::success("Exchange listings stopped.", None)
}

/// Submits the "Get Involved" signup form.
///
/// Input semantics:
/// - `role`: `PWD` or `Caregiver` (case-insensitive).
/// - At least one of `email`, `phone`, `address` must be non-blank.
#[flutter_rust_bridge::frb(sync)]
pub fn contact_sign_up(
    role: String,
    email: String,
    phone: String,
    address: String,
) -> EntryActionResponse {
    let Some(role) = ContactRole::parse(&role) else {
        return EntryActionResponse::failure(format!(
            "Unknown role `{}`; expected PWD or Caregiver.",
            role.trim()
        ));
    };
    let signup = ContactSignup {
        role,
        email,
        phone,
        address,
    };

    let mut guard = lock_session();
    let session = match ensure_session(&mut guard) {
        Ok(session) => session,
        Err(message) => return EntryActionResponse::failure(message),
    };
    let outcome = session.contacts.sign_up(&signup);
    let status = contact_service::describe_outcome(role, &outcome);
    EntryActionResponse {
        ok: status.is_success(),
        id: outcome.ok().map(|id| id.to_string()),
        message: status.message,
    }
}

fn exchange_submit(input: NewExchangeItemInput) -> EntryActionResponse {
    let mut guard = lock_session();
    let session = match ensure_session(&mut guard) {
        Ok(session) => session,
        Err(message) => return EntryActionResponse::failure(message),
    };
    let outcome = session.exchange.add(&input);
    let status = exchange_service::describe_outcome(input.kind, &outcome);
    EntryActionResponse {
        ok: status.is_success(),
        id: outcome.ok().map(|id| id.to_string()),
        message: status.message,
    }
}

fn identity() -> &'static Arc<IdentitySlot> {
    IDENTITY.get_or_init(|| Arc::new(IdentitySlot::new()))
}

fn lock_session() -> MutexGuard<'static, Option<Session>> {
    SESSION.lock().unwrap_or_else(PoisonError::into_inner)
}

fn ensure_session(slot: &mut Option<Session>) -> Result<&mut Session, String> {
    if slot.is_none() {
        *slot = Some(open_session()?);
    }
    slot.as_mut()
        .ok_or_else(|| "session unavailable".to_string())
}

fn open_session() -> Result<Session, String> {
    let config = TendaConfig::from_env().map_err(|err| format!("invalid configuration: {err}"))?;
    let store = SqliteDocumentStore::open(&config.db_path).map_err(|err| {
        error!("event=ffi_session_open module=ffi status=error error={err}");
        format!("store open failed: {err}")
    })?;
    let store = Arc::new(store);
    let exchange = ExchangeService::for_config(store.clone(), identity().clone(), &config)
        .map_err(|err| format!("invalid exchange collection: {err}"))?;
    let contacts = ContactService::new(store, identity().clone(), config.app_id.clone());

    info!(
        "event=ffi_session_open module=ffi status=ok app_id={}",
        config.app_id
    );
    Ok(Session { exchange, contacts })
}

fn to_item_view(item: &ExchangeItem) -> ExchangeItemView {
    ExchangeItemView {
        id: item.id.to_string(),
        kind: item.kind.as_str().to_string(),
        label: item.label.clone(),
        condition: item.condition.clone(),
        disability_context: item.disability_context.clone(),
        status: item.status.clone(),
        owner_id: item.owner_id.clone(),
        created_at_ms: item.created_at,
    }
}
