//! Resolve command: follow an offset chain to its final address.

use anamnesis_core::{OffsetChain, OffsetTable, resolve};
use anyhow::Result;

use super::hex_utils::parse_chain;
use crate::session::Session;

pub fn run(session: &Session, chain: &str, base: Option<&str>) -> Result<()> {
    let chain = build_chain(&session.table, chain, base)?;
    let process = session.open_process()?;

    let address = resolve(&process, &chain)?;
    println!("{}: {} -> 0x{:X}", chain.name(), chain, address);
    Ok(())
}

fn build_chain(table: &OffsetTable, chain: &str, base: Option<&str>) -> Result<OffsetChain> {
    let relative = parse_chain(chain, table)?;
    let Some(base) = base else {
        return Ok(relative);
    };

    let mut offsets = vec![table.get(base)?];
    offsets.extend(relative.offsets().iter().cloned());
    Ok(OffsetChain::from_offsets(offsets)?)
}
