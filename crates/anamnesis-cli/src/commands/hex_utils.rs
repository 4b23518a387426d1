//! Offset chain parsing for command arguments.

use anamnesis_core::{Offset, OffsetChain, OffsetTable};
use anyhow::{Context, Result, anyhow};

/// Parse a hex value with a `0x` prefix.
pub fn parse_hex_value(s: &str) -> Result<u64> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| anyhow!("Hex values must start with '0x': '{}'", s))?;
    u64::from_str_radix(digits, 16).map_err(|e| anyhow!("Invalid hex value '{}': {}", s, e))
}

/// Build an offset chain from comma separated tokens.
///
/// Each token is either a `0x` value (one single-value offset) or the name
/// of an offset table entry, e.g. `Target,Position` or `0x1C641D0,0xF0,0x50`.
pub fn parse_chain(text: &str, table: &OffsetTable) -> Result<OffsetChain> {
    let offsets = text
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| parse_token(token, table))
        .collect::<Result<Vec<_>>>()?;

    OffsetChain::from_offsets(offsets).with_context(|| format!("Invalid offset chain '{}'", text))
}

fn parse_token(token: &str, table: &OffsetTable) -> Result<Offset> {
    if token.starts_with("0x") || token.starts_with("0X") {
        return Ok(Offset::from(parse_hex_value(token)?));
    }
    Ok(table.get(token)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnesis_core::builtin_offsets;

    #[test]
    fn test_parse_hex_value() {
        assert_eq!(parse_hex_value("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_hex_value("0X1431B08A0").unwrap(), 0x1431B08A0);
        assert!(parse_hex_value("1000").is_err());
        assert!(parse_hex_value("0xZZZ").is_err());
    }

    #[test]
    fn test_parse_raw_chain() {
        let chain = parse_chain("0x1C641D0, 0xF0,0x50", &OffsetTable::default()).unwrap();
        assert_eq!(chain.flatten(), vec![0x1C641D0, 0xF0, 0x50]);
        assert_eq!(chain.offsets().len(), 3);
    }

    #[test]
    fn test_parse_named_chain() {
        let mut table = OffsetTable::default();
        table.insert("Target", [0x1C641D0, 0xF0]);
        table.insert("Position", 0x50);

        let chain = parse_chain("target,Position", &table).unwrap();
        assert_eq!(chain.flatten(), vec![0x1C641D0, 0xF0, 0x50]);
        assert_eq!(chain.name(), "Target, Position");
    }

    #[test]
    fn test_parse_mixed_chain_with_builtin_table() {
        let table = builtin_offsets();
        let name = table.offsets.keys().next().unwrap().clone();
        let chain = parse_chain(&format!("{},0x10", name), &table).unwrap();
        assert_eq!(chain.offsets().len(), 2);
        assert_eq!(chain.offsets()[1].values(), &[0x10]);
    }

    #[test]
    fn test_parse_chain_errors() {
        let table = OffsetTable::default();
        assert!(parse_chain("", &table).is_err());
        assert!(parse_chain("Missing", &table).is_err());
    }
}
