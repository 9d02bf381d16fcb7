//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `tenda_core` linkage and the configured document store.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `tenda_cli [--seed]`. `--seed` appends one sample donation and one
//! sample request before the counts are printed.

use std::process::ExitCode;
use std::sync::Arc;
use tenda_core::{
    ExchangeService, IdentitySlot, NewExchangeItemInput, SqliteDocumentStore, TendaConfig,
};

fn main() -> ExitCode {
    println!("tenda_core ping={}", tenda_core::ping());
    println!("tenda_core version={}", tenda_core::core_version());

    let seed = std::env::args().skip(1).any(|arg| arg == "--seed");
    match run(seed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("tenda_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(seed: bool) -> Result<(), String> {
    let config = TendaConfig::from_env().map_err(|err| err.to_string())?;
    println!("app_id={} db_path={}", config.app_id, config.db_path.display());

    let store =
        Arc::new(SqliteDocumentStore::open(&config.db_path).map_err(|err| err.to_string())?);
    let identity = Arc::new(IdentitySlot::new());
    let mut exchange = ExchangeService::for_config(store, identity.clone(), &config)
        .map_err(|err| err.to_string())?;
    exchange.open().map_err(|err| err.to_string())?;

    if seed {
        let user_id = identity.establish_anonymous();
        println!("seed_user={user_id}");
        for input in [
            NewExchangeItemInput::donation("Manual Wheelchair", Some("Good".to_string())),
            NewExchangeItemInput::request("Speech-to-Text License", Some("Hearing".to_string())),
        ] {
            let status = exchange.submit(&input);
            if !status.is_success() {
                return Err(status.message);
            }
            println!("{status}");
        }
    }

    let listings = exchange.listings();
    println!("donations={}", listings.donations.len());
    println!("requests={}", listings.requests.len());
    if !listings.dropped.is_empty() {
        println!("dropped={}", listings.dropped.len());
    }
    exchange.close();
    Ok(())
}
