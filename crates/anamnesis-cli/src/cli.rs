//! Command line definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "anamnesis")]
#[command(version, about = "Inspect and edit live game memory")]
pub struct Cli {
    /// Service configuration (TOML)
    #[arg(short, long, global = true, default_value = "anamnesis.toml")]
    pub config: PathBuf,

    /// Offset table (JSON); the built-in table is used when omitted
    #[arg(short, long, global = true, env = "ANAMNESIS_OFFSETS")]
    pub offsets: Option<PathBuf>,

    /// Attach to this process id instead of searching by name
    #[arg(long, global = true)]
    pub pid: Option<u32>,

    /// Process name fragment to search for (overrides the config)
    #[arg(long, global = true)]
    pub process: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the offset table
    Offsets {
        /// Offset table to list instead of `--offsets`
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Export the table as JSON to this path
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Relocate table entries by scanning the game's code for signatures
    Scan {
        /// Signature set (JSON); the built-in set is used when omitted
        #[arg(short, long)]
        signatures: Option<PathBuf>,

        /// Export the updated table as JSON to this path
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Resolve an offset chain to an address
    Resolve {
        /// Comma separated table names and/or 0x values, e.g. "Target,Position"
        chain: String,

        /// Table entry to prepend as the base offset
        #[arg(short, long)]
        base: Option<String>,
    },

    /// Read one value
    Read {
        chain: String,

        #[arg(short = 't', long = "type", value_enum)]
        kind: ValueKind,
    },

    /// Print every change of a value until interrupted
    Watch {
        chain: String,

        #[arg(short = 't', long = "type", value_enum)]
        kind: ValueKind,
    },

    /// Write a value and wait for it to land
    Write {
        chain: String,

        #[arg(short = 't', long = "type", value_enum)]
        kind: ValueKind,

        /// New value: a number, a comma separated vector, a flag state, text or JSON
        value: String,
    },

    /// Dump raw bytes at the resolved address
    Hexdump {
        chain: String,

        /// Number of bytes to dump
        #[arg(short, long, default_value = "64")]
        size: usize,

        /// Hide the ASCII column
        #[arg(long)]
        no_ascii: bool,
    },
}

/// Value types a marshaler can be bound to from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueKind {
    Bool,
    U8,
    I16,
    U16,
    I32,
    F32,
    Vector2d,
    Vector,
    Quaternion,
    Transform,
    Color,
    Color4,
    Flag,
    String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read_command() {
        let cli = Cli::try_parse_from([
            "anamnesis",
            "read",
            "Target,Position",
            "--type",
            "vector",
            "--pid",
            "42",
        ])
        .unwrap();

        assert_eq!(cli.pid, Some(42));
        match cli.command {
            Command::Read { chain, kind } => {
                assert_eq!(chain, "Target,Position");
                assert_eq!(kind, ValueKind::Vector);
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn test_parse_write_command() {
        let cli = Cli::try_parse_from([
            "anamnesis",
            "write",
            "0x1C641D0,0xF0,0x26C",
            "-t",
            "f32",
            "1.5",
        ])
        .unwrap();

        match cli.command {
            Command::Write { kind, value, .. } => {
                assert_eq!(kind, ValueKind::F32);
                assert_eq!(value, "1.5");
            }
            _ => panic!("expected write"),
        }
    }

    #[test]
    fn test_parse_scan_command() {
        let cli = Cli::try_parse_from(["anamnesis", "scan", "-e", "offsets.json"]).unwrap();
        match cli.command {
            Command::Scan { signatures, export } => {
                assert!(signatures.is_none());
                assert_eq!(export, Some(PathBuf::from("offsets.json")));
            }
            _ => panic!("expected scan"),
        }
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
