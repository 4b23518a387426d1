//! Hexdump command: raw bytes at the end of an offset chain.
//!
//! Useful for checking that a chain lands on the structure you expect
//! before binding a typed marshaler to it.
//!
//! # Output Format
//!
//! ```text
//! 0x000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|
//! ```

use std::fmt::Write;

use anamnesis_core::{ProcessMemory, resolve};
use anyhow::Result;

use super::hex_utils::parse_chain;
use crate::session::Session;

const BYTES_PER_LINE: usize = 16;

pub fn run(session: &Session, chain: &str, size: usize, ascii: bool) -> Result<()> {
    let chain = parse_chain(chain, &session.table)?;
    let process = session.open_process()?;

    let address = resolve(&process, &chain)?;
    let bytes = process.read_bytes(address, size)?;

    println!("Hexdump of {} at 0x{:X} ({} bytes):", chain.name(), address, size);
    println!();
    for line in format_lines(&bytes, ascii) {
        println!("{}", line);
    }
    Ok(())
}

fn format_lines(bytes: &[u8], ascii: bool) -> Vec<String> {
    bytes
        .chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(i, chunk)| format_line(i * BYTES_PER_LINE, chunk, ascii))
        .collect()
}

fn format_line(offset: usize, chunk: &[u8], ascii: bool) -> String {
    let mut line = format!("0x{:03X}: ", offset);

    for j in 0..BYTES_PER_LINE {
        if j == 8 {
            line.push(' ');
        }
        match chunk.get(j) {
            Some(byte) => {
                let _ = write!(line, "{:02X} ", byte);
            }
            None => line.push_str("   "),
        }
    }

    if ascii {
        line.push_str(" |");
        for byte in chunk {
            line.push(if (0x20..0x7F).contains(byte) {
                *byte as char
            } else {
                '.'
            });
        }
        line.extend(std::iter::repeat_n(' ', BYTES_PER_LINE - chunk.len()));
        line.push('|');
    }

    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_line() {
        let lines = format_lines(b"Hello World\0\0\0\0\0", true);
        assert_eq!(
            lines,
            vec!["0x000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|"]
        );
    }

    #[test]
    fn test_partial_line_is_padded() {
        let lines = format_lines(&[0u8; 18], true);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], format!("0x010: 00 00 {}  |..{}|", "   ".repeat(14), " ".repeat(14)));
    }

    #[test]
    fn test_without_ascii() {
        let lines = format_lines(&[0xAB; 4], false);
        assert_eq!(lines[0], format!("0x000: AB AB AB AB {}", "   ".repeat(12) + " "));
    }
}
