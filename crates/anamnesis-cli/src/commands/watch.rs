//! Watch command: print a value every time it changes in game memory.

use std::sync::Arc;
use std::time::Duration;

use anamnesis_core::{Error, ShutdownSignal};
use anyhow::Result;
use chrono::Local;
use owo_colors::OwoColorize;
use tracing::info;

use super::hex_utils::parse_chain;
use super::value::{CliValue, with_value_kind};
use crate::cli::ValueKind;
use crate::session::Session;

pub fn run(session: &Session, chain: &str, kind: ValueKind) -> Result<()> {
    with_value_kind!(kind, watch_value(session, chain))
}

fn watch_value<T: CliValue>(session: &Session, chain: &str) -> Result<()> {
    let chain = parse_chain(chain, &session.table)?;

    let shutdown = Arc::new(ShutdownSignal::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal, stopping...");
        shutdown_ctrlc.trigger();
    })?;

    let service = session.open_service()?;

    let shutdown_error = Arc::clone(&shutdown);
    service.on_error(move |error| {
        eprintln!("{} {}", timestamp(), error.red());
        if matches!(error, Error::ProcessExited | Error::MarshalerFaulted { .. }) {
            shutdown_error.trigger();
        }
    });

    let marshaler = service.marshaler::<T>(chain)?;
    println!("{} {} = {}", timestamp(), marshaler.name(), marshaler.value()?.bold());

    let name = marshaler.name();
    marshaler.on_value_changed(move |value: &T| {
        println!("{} {} = {}", timestamp(), name, value.green());
    });

    service.start()?;
    eprintln!("Watching 0x{:X} (Ctrl+C to stop)", marshaler.address());

    while !shutdown.wait(Duration::from_secs(1)) {}

    service.shutdown();
    Ok(())
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S%.3f").dimmed().to_string()
}
