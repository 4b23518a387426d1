//! Write command: stage a value, flush it and confirm it on the next tick.

use std::time::Duration;

use anyhow::{Result, bail};

use super::hex_utils::parse_chain;
use super::value::{CliValue, with_value_kind};
use crate::cli::ValueKind;
use crate::session::Session;

const CONFIRM_TIMEOUT: Duration = Duration::from_secs(5);

pub fn run(session: &Session, chain: &str, kind: ValueKind, value: &str) -> Result<()> {
    with_value_kind!(kind, write_value(session, chain, value))
}

fn write_value<T: CliValue>(session: &Session, chain: &str, text: &str) -> Result<()> {
    let value = T::parse_value(text)?;
    let chain = parse_chain(chain, &session.table)?;
    let service = session.open_service()?;

    let marshaler = service.marshaler::<T>(chain)?;
    let previous = marshaler.value()?;

    service.start()?;
    marshaler.set_value(value, true)?;
    if !service.wait_for_tick_timeout(CONFIRM_TIMEOUT)? {
        bail!("Timed out waiting for the marshaler service to tick");
    }

    println!(
        "{} (0x{:X}): {} -> {}",
        marshaler.name(),
        marshaler.address(),
        previous,
        marshaler.value()?
    );

    service.shutdown();
    Ok(())
}
