//! Read command: bind a marshaler and print its value once.

use anyhow::Result;

use super::hex_utils::parse_chain;
use super::value::{CliValue, with_value_kind};
use crate::cli::ValueKind;
use crate::session::Session;

pub fn run(session: &Session, chain: &str, kind: ValueKind) -> Result<()> {
    with_value_kind!(kind, read_value(session, chain))
}

fn read_value<T: CliValue>(session: &Session, chain: &str) -> Result<()> {
    let chain = parse_chain(chain, &session.table)?;
    let service = session.open_service()?;

    let marshaler = service.marshaler::<T>(chain)?;
    println!("{} (0x{:X}) = {}", marshaler.name(), marshaler.address(), marshaler.value()?);

    service.shutdown();
    Ok(())
}
