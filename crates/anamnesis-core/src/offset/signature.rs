use std::fs;
use std::path::Path;

use memchr::memchr_iter;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::memory::ProcessMemory;
use crate::offset::{Offset, OffsetEntry, OffsetTable};

const PE_HEADER_POINTER: u64 = 0x3C;
const PE_SECTION_COUNT: u64 = 6;
// Signature, file header and the 64-bit optional header.
const PE_SECTION_TABLE: u64 = 4 + 20 + 240;
const PE_SECTION_HEADER_SIZE: usize = 40;

const TEXT_SECTION: &[u8; 8] = b".text\0\0\0";
const DATA_SECTION: &[u8; 8] = b".data\0\0\0";

const CALL_OPCODE: u8 = 0xE8;
/// How far past the match a static address operand is searched for.
const STATIC_SEARCH_STEPS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// The address of the match itself, e.g. an instruction to patch.
    Text,
    /// The `.data` address referenced by a RIP-relative operand after the match.
    Static,
}

/// A byte pattern locating one offset table entry in the game's code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSignature {
    pub name: String,
    pub pattern: String,
    pub kind: SignatureKind,
    /// Bytes to skip past the match before searching for the operand.
    #[serde(default)]
    pub skip: u64,
    #[serde(default)]
    pub addend: i64,
}

impl CodeSignature {
    pub fn text(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            kind: SignatureKind::Text,
            skip: 0,
            addend: 0,
        }
    }

    pub fn static_address(name: impl Into<String>, pattern: impl Into<String>, skip: u64) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            kind: SignatureKind::Static,
            skip,
            addend: 0,
        }
    }

    pub fn pattern_bytes(&self) -> Result<Vec<Option<u8>>> {
        parse_pattern(&self.pattern)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureSet {
    pub version: String,
    pub signatures: Vec<CodeSignature>,
}

impl SignatureSet {
    pub fn get(&self, name: &str) -> Option<&CodeSignature> {
        self.signatures
            .iter()
            .find(|signature| signature.name.eq_ignore_ascii_case(name))
    }
}

pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<SignatureSet> {
    let content = fs::read_to_string(&path)?;
    let set: SignatureSet = serde_json::from_str(&content)?;
    for signature in &set.signatures {
        signature
            .pattern_bytes()
            .map_err(|e| Error::InvalidOffset(format!("{}: {}", signature.name, e)))?;
    }
    Ok(set)
}

pub fn save_signatures<P: AsRef<Path>>(path: P, set: &SignatureSet) -> Result<()> {
    let content = serde_json::to_string_pretty(set)?;
    fs::write(path, content)?;
    Ok(())
}

/// Parse `"48 8D 0D ?? ?? ?? ??"`; `??` and `?` are wildcards.
pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }

        let value = u8::from_str_radix(token, 16)
            .map_err(|e| Error::InvalidOffset(format!("Invalid signature token '{}': {}", token, e)))?;
        bytes.push(Some(value));
    }

    if bytes.is_empty() {
        return Err(Error::InvalidOffset("Signature pattern is empty".to_string()));
    }
    if bytes.iter().all(Option::is_none) {
        return Err(Error::InvalidOffset(format!(
            "Signature pattern has no fixed bytes: '{}'",
            pattern
        )));
    }

    Ok(bytes)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Position of the first match of `pattern` in `haystack`.
///
/// Candidates come from a `memchr` scan for the first fixed byte of the
/// pattern; wildcards match anything.
pub fn find_pattern(haystack: &[u8], pattern: &[Option<u8>]) -> Option<usize> {
    let (anchor, first) = pattern
        .iter()
        .enumerate()
        .find_map(|(i, b)| b.map(|b| (i, b)))?;

    memchr_iter(first, haystack)
        .filter_map(|pos| pos.checked_sub(anchor))
        .find(|&start| matches_at(haystack, start, pattern))
}

fn matches_at(haystack: &[u8], start: usize, pattern: &[Option<u8>]) -> bool {
    let Some(window) = haystack.get(start..start + pattern.len()) else {
        return false;
    };
    window
        .iter()
        .zip(pattern)
        .all(|(actual, expected)| expected.is_none_or(|b| b == *actual))
}

/// A PE section, relative to the module base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Section {
    pub offset: u64,
    pub size: u64,
}

impl Section {
    fn contains(&self, relative: u64) -> bool {
        relative >= self.offset && relative <= self.offset + self.size
    }
}

/// Finds signatures in the `.text` section of the main module.
pub struct SignatureScanner<'a, P: ProcessMemory + ?Sized> {
    process: &'a P,
    base: u64,
    text: Section,
    data: Section,
    code: Vec<u8>,
}

impl<'a, P: ProcessMemory + ?Sized> SignatureScanner<'a, P> {
    /// Locate the code and data sections and load the code.
    pub fn new(process: &'a P) -> Result<Self> {
        let base = process.base_address()?;
        let (text, data) = read_sections(process, base)?;
        if text.size == 0 || data.size == 0 {
            return Err(Error::InvalidModule(format!(
                "missing .text or .data section (text {:#x} bytes, data {:#x} bytes)",
                text.size, data.size
            )));
        }

        let code = process.read_bytes(base + text.offset, text.size as usize)?;
        info!(
            "Signature scanner ready: text {:#x}+{:#x}, data {:#x}+{:#x}",
            text.offset, text.size, data.offset, data.size
        );
        Ok(Self {
            process,
            base,
            text,
            data,
            code,
        })
    }

    pub fn text_section(&self) -> Section {
        self.text
    }

    pub fn data_section(&self) -> Section {
        self.data
    }

    /// Absolute address of the pattern in code. A match on a `call` resolves
    /// to the call target.
    pub fn scan_text(&self, pattern: &[Option<u8>]) -> Result<u64> {
        let position = find_pattern(&self.code, pattern).ok_or_else(|| Error::SignatureNotFound {
            pattern: format_pattern(pattern),
        })?;

        let address = self.base + self.text.offset + position as u64;
        if self.code[position] == CALL_OPCODE {
            let jump = self.process.read_i32(address + 1)?;
            return Ok((address + 5).wrapping_add_signed(i64::from(jump)));
        }
        Ok(address)
    }

    /// Absolute address of the first RIP-relative operand past the match
    /// (and `skip` bytes) that points into `.data`.
    pub fn static_address(&self, pattern: &[Option<u8>], skip: u64) -> Result<u64> {
        let mut instruction = self.scan_text(pattern)? + skip;
        for _ in 0..STATIC_SEARCH_STEPS {
            instruction += 1;
            let displacement = self.process.read_i32(instruction)?;
            let target = (instruction + 4).wrapping_add_signed(i64::from(displacement));
            if self.data.contains(target.wrapping_sub(self.base)) {
                return Ok(target);
            }
        }

        Err(Error::InvalidOffset(format!(
            "No static address within {} bytes of '{}'",
            STATIC_SEARCH_STEPS,
            format_pattern(pattern)
        )))
    }

    /// Absolute address a signature points at.
    pub fn resolve(&self, signature: &CodeSignature) -> Result<u64> {
        let pattern = signature.pattern_bytes()?;
        let address = match signature.kind {
            SignatureKind::Text => self.scan_text(&pattern)? + signature.skip,
            SignatureKind::Static => self.static_address(&pattern, signature.skip)?,
        };
        Ok(address.wrapping_add_signed(signature.addend))
    }

    /// A module-relative offset for a signature, named after it.
    pub fn offset(&self, signature: &CodeSignature) -> Result<Offset> {
        let address = self.resolve(signature)?;
        debug!("Signature {} found at {:#x}", signature.name, address);
        Ok(Offset::from(address.wrapping_sub(self.base)).named(signature.name.clone()))
    }
}

fn read_sections<P: ProcessMemory + ?Sized>(process: &P, base: u64) -> Result<(Section, Section)> {
    let nt_header = base.wrapping_add_signed(i64::from(process.read_i32(base + PE_HEADER_POINTER)?));
    let mut count = [0u8; 2];
    process.read_into(nt_header + PE_SECTION_COUNT, &mut count)?;
    let count = u16::from_le_bytes(count) as usize;

    let headers = process.read_bytes(nt_header + PE_SECTION_TABLE, count * PE_SECTION_HEADER_SIZE)?;
    let mut text = Section::default();
    let mut data = Section::default();
    for header in headers.chunks_exact(PE_SECTION_HEADER_SIZE) {
        let section = Section {
            size: u64::from(le_u32(&header[8..12])),
            offset: u64::from(le_u32(&header[12..16])),
        };
        match &header[..8] {
            name if name == TEXT_SECTION => text = section,
            name if name == DATA_SECTION => data = section,
            _ => {}
        }
    }
    Ok((text, data))
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(bytes);
    u32::from_le_bytes(raw)
}

/// Outcome of [`apply_signatures`].
#[derive(Debug, Default)]
pub struct ScanReport {
    pub found: Vec<String>,
    pub missing: Vec<(String, Error)>,
}

/// Scan for every signature and move the matching table entries to where
/// they were found. Flag entries keep their byte patterns.
///
/// A signature that cannot be found leaves its entry untouched.
pub fn apply_signatures<P: ProcessMemory + ?Sized>(
    process: &P,
    set: &SignatureSet,
    table: &mut OffsetTable,
) -> Result<ScanReport> {
    let scanner = SignatureScanner::new(process)?;
    let mut report = ScanReport::default();

    for signature in &set.signatures {
        match scanner.offset(signature) {
            Ok(offset) => {
                relocate(table, &signature.name, offset);
                report.found.push(signature.name.clone());
            }
            Err(e) => {
                warn!("Failed to scan memory for signature {}: {}", signature.name, e);
                report.missing.push((signature.name.clone(), e));
            }
        }
    }

    info!(
        "Signature scan: {} found, {} missing",
        report.found.len(),
        report.missing.len()
    );
    Ok(report)
}

fn relocate(table: &mut OffsetTable, name: &str, offset: Offset) {
    let existing = table
        .offsets
        .iter_mut()
        .find(|(key, _)| key.eq_ignore_ascii_case(name));

    match existing {
        Some((_, OffsetEntry::Flag(flag))) => flag.offsets = Offset::new(offset.values()),
        Some((_, OffsetEntry::Basic(basic))) => *basic = Offset::new(offset.values()),
        None => table.insert(name, Offset::new(offset.values())),
    }
}

/// Signatures for the base offsets and code patches of the built-in table.
pub fn builtin_signatures() -> SignatureSet {
    SignatureSet {
        version: "2020.12.29.0000.0000".to_string(),
        signatures: vec![
            CodeSignature::static_address("ActorTable", "48 8D 0D ?? ?? ?? ?? E8 ?? ?? ?? ?? 44 0F B6 83", 0),
            CodeSignature::static_address("GposeFilters", "48 85 D2 4C 8B 05 ?? ?? ?? ??", 0),
            CodeSignature::static_address("GposeCheck", "0F 84 ?? ?? ?? ?? 8B 15 ?? ?? ?? ?? 48 89 6C 24 ??", 0),
            CodeSignature::static_address(
                "GposeCheck2",
                "8D 48 FF 48 8D 05 ?? ?? ?? ?? 8B 04 88 83 F8 04 49 8B CA",
                3,
            ),
            CodeSignature::text("Skeleton1Flag", "41 0F 29 5C 12 10"),
            CodeSignature::text("Skeleton2Flag", "43 0F 29 5C 18 10"),
            CodeSignature::text("Skeleton3Flag", "0F 29 5E 10 49 8B 73 28"),
            CodeSignature::text("Skeleton4Flag", "41 0F 29 44 12 20"),
            CodeSignature::text("Skeleton5Flag", "41 0F 29 24 12"),
            CodeSignature::text("Skeleton6Flag", "43 0F 29 44 18 20"),
        ],
    }
}
