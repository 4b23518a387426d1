use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod session;

use cli::{Cli, Command};
use session::Session;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("anamnesis=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let offsets = match &cli.command {
        Command::Offsets { file: Some(file), .. } => Some(file.as_path()),
        _ => cli.offsets.as_deref(),
    };
    let session = Session::load(&cli.config, offsets, cli.pid, cli.process.clone())?;

    match cli.command {
        Command::Offsets { export, .. } => commands::offsets::run(&session.table, export.as_deref()),
        Command::Scan { signatures, export } => {
            commands::scan::run(&session, signatures.as_deref(), export.as_deref())
        }
        Command::Resolve { chain, base } => commands::resolve::run(&session, &chain, base.as_deref()),
        Command::Read { chain, kind } => commands::read::run(&session, &chain, kind),
        Command::Watch { chain, kind } => commands::watch::run(&session, &chain, kind),
        Command::Write { chain, kind, value } => {
            commands::write::run(&session, &chain, kind, &value)
        }
        Command::Hexdump {
            chain,
            size,
            no_ascii,
        } => commands::hexdump::run(&session, &chain, size, !no_ascii),
    }
}
