//! Scan command: relocate offset table entries from code signatures.

use std::path::Path;

use anamnesis_core::offset::ScanReport;
use anamnesis_core::{
    SignatureSet, apply_signatures, builtin_signatures, load_signatures, save_offset_table,
};
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing::info;

use crate::session::Session;

pub fn run(session: &Session, signatures: Option<&Path>, export: Option<&Path>) -> Result<()> {
    let set = load_set(signatures)?;
    let process = session.open_process()?;

    let mut table = session.table.clone();
    let report = apply_signatures(&process, &set, &mut table)?;
    for line in summarize(&report) {
        println!("{}", line);
    }

    if let Some(path) = export {
        save_offset_table(path, &table)?;
        eprintln!("Exported {} offsets to {}", table.offsets.len(), path.display());
    }
    Ok(())
}

fn load_set(path: Option<&Path>) -> Result<SignatureSet> {
    let Some(path) = path else {
        return Ok(builtin_signatures());
    };
    let set = load_signatures(path)
        .with_context(|| format!("Failed to load signatures from {}", path.display()))?;
    info!("Loaded signatures version: {}", set.version);
    Ok(set)
}

fn summarize(report: &ScanReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .found
        .iter()
        .map(|name| format!("{} {}", "found  ".green(), name))
        .collect();
    lines.extend(
        report
            .missing
            .iter()
            .map(|(name, error)| format!("{} {}: {}", "missing".red(), name, error)),
    );
    lines
}
