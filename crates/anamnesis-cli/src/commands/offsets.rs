//! Offsets command: list or export the offset table.

use std::path::Path;

use anamnesis_core::offset::{OffsetEntry, format_flag_bytes};
use anamnesis_core::{OffsetTable, save_offset_table};
use anyhow::Result;
use owo_colors::OwoColorize;

pub fn run(table: &OffsetTable, export: Option<&Path>) -> Result<()> {
    if let Some(path) = export {
        save_offset_table(path, table)?;
        eprintln!("Exported {} offsets to {}", table.offsets.len(), path.display());
        return Ok(());
    }

    println!("Offsets version: {}", table.version.bold());
    println!();

    let width = table.offsets.keys().map(String::len).max().unwrap_or(0);
    for line in describe(table, width) {
        println!("{}", line);
    }
    Ok(())
}

fn describe(table: &OffsetTable, width: usize) -> Vec<String> {
    table
        .offsets
        .iter()
        .map(|(name, entry)| match entry {
            OffsetEntry::Basic(offset) => format!("{:<width$}  {}", name, offset),
            OffsetEntry::Flag(flag) => format!(
                "{:<width$}  {}  on [{}] off [{}]",
                name,
                flag.offsets,
                format_flag_bytes(&flag.on),
                format_flag_bytes(&flag.off),
            ),
        })
        .collect()
}
