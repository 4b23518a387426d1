use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::offset::{format_offsets, parse_offsets};

/// One segment of a pointer-chasing path: a list of byte displacements.
///
/// In table files an offset is written as a comma separated list of hex
/// values, e.g. `"0xF0, 0x50"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Offset {
    values: Vec<u64>,
    name: Option<String>,
    flag: Option<FlagPattern>,
}

impl Offset {
    pub fn new(values: impl Into<Vec<u64>>) -> Self {
        Self {
            values: values.into(),
            name: None,
            flag: None,
        }
    }

    /// An offset pointing at a code patch toggled between two byte patterns.
    pub fn flag(values: impl Into<Vec<u64>>, on: Vec<u8>, off: Vec<u8>) -> Result<Self> {
        Ok(Self {
            values: values.into(),
            name: None,
            flag: Some(FlagPattern::new(on, off)?),
        })
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn values(&self) -> &[u64] {
        &self.values
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn flag_pattern(&self) -> Option<&FlagPattern> {
        self.flag.as_ref()
    }

    /// The same location shifted by `delta` bytes (applied to the first value).
    pub fn shifted(&self, delta: u64) -> Self {
        let mut shifted = self.clone();
        if let Some(first) = shifted.values.first_mut() {
            *first = first.wrapping_add(delta);
        }
        shifted
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_offsets(&self.values))
    }
}

impl From<u64> for Offset {
    fn from(value: u64) -> Self {
        Self::new(vec![value])
    }
}

impl From<&[u64]> for Offset {
    fn from(values: &[u64]) -> Self {
        Self::new(values.to_vec())
    }
}

impl<const N: usize> From<[u64; N]> for Offset {
    fn from(values: [u64; N]) -> Self {
        Self::new(values.to_vec())
    }
}

impl TryFrom<String> for Offset {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        parse_offsets(&value).map(Self::new)
    }
}

impl From<Offset> for String {
    fn from(offset: Offset) -> Self {
        offset.to_string()
    }
}

/// The exact bytes that switch a code patch on or off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagPattern {
    on: Vec<u8>,
    off: Vec<u8>,
}

impl FlagPattern {
    pub fn new(on: Vec<u8>, off: Vec<u8>) -> Result<Self> {
        if on.is_empty() {
            return Err(Error::InvalidOffset(
                "flag patterns must not be empty".to_string(),
            ));
        }
        if on.len() != off.len() {
            return Err(Error::InvalidOffset(format!(
                "flag patterns differ in length: on {} bytes, off {} bytes",
                on.len(),
                off.len()
            )));
        }
        Ok(Self { on, off })
    }

    pub fn on(&self) -> &[u8] {
        &self.on
    }

    pub fn off(&self) -> &[u8] {
        &self.off
    }

    pub fn width(&self) -> usize {
        self.on.len()
    }
}

/// Ordered offsets from the module base to a final address.
///
/// The first offset is the base offset; its first value is relative to the
/// main module, everything after it is relative to the pointer read at the
/// previous step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetChain {
    offsets: Vec<Offset>,
}

impl OffsetChain {
    pub fn new(base: impl Into<Offset>) -> Self {
        Self {
            offsets: vec![base.into()],
        }
    }

    pub fn from_offsets(offsets: Vec<Offset>) -> Result<Self> {
        if offsets.is_empty() {
            return Err(Error::InvalidOffset(
                "offset chain needs a base offset".to_string(),
            ));
        }
        Ok(Self { offsets })
    }

    /// Append a relative offset.
    pub fn then(mut self, offset: impl Into<Offset>) -> Self {
        self.offsets.push(offset.into());
        self
    }

    pub fn base(&self) -> &Offset {
        &self.offsets[0]
    }

    pub fn offsets(&self) -> &[Offset] {
        &self.offsets
    }

    /// The same chain with its base offset swapped.
    pub fn with_base(&self, base: Offset) -> Self {
        let mut offsets = self.offsets.clone();
        offsets[0] = base;
        Self { offsets }
    }

    /// Every displacement of every offset, in order.
    pub fn flatten(&self) -> Vec<u64> {
        self.offsets
            .iter()
            .flat_map(|o| o.values.iter().copied())
            .collect()
    }

    pub fn name(&self) -> String {
        self.offsets
            .iter()
            .map(|o| o.name().unwrap_or("[Unknown]"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Flag pattern of the last offset that carries one.
    pub fn flag_pattern(&self) -> Option<&FlagPattern> {
        self.offsets.iter().rev().find_map(|o| o.flag_pattern())
    }
}

impl fmt::Display for OffsetChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_offsets(&self.flatten()))
    }
}

impl From<Offset> for OffsetChain {
    fn from(base: Offset) -> Self {
        Self::new(base)
    }
}
