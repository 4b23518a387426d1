use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::offset::Offset;

/// Versioned table of named memory locations for one game build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffsetTable {
    pub version: String,
    pub offsets: BTreeMap<String, OffsetEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OffsetEntry {
    Flag(FlagEntry),
    Basic(Offset),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagEntry {
    pub offsets: Offset,
    #[serde(with = "flag_bytes")]
    pub on: Vec<u8>,
    #[serde(with = "flag_bytes")]
    pub off: Vec<u8>,
}

impl OffsetTable {
    /// Look up an entry by name (case-insensitive), named after its key.
    pub fn get(&self, name: &str) -> Result<Offset> {
        let (key, entry) = self
            .offsets
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::InvalidOffset(format!("no offset named '{}'", name)))?;

        let offset = match entry {
            OffsetEntry::Basic(offset) => offset.clone(),
            OffsetEntry::Flag(flag) => {
                Offset::flag(flag.offsets.values(), flag.on.clone(), flag.off.clone())?
            }
        };
        Ok(offset.named(key.clone()))
    }

    pub fn insert(&mut self, name: impl Into<String>, offset: impl Into<Offset>) {
        self.offsets
            .insert(name.into(), OffsetEntry::Basic(offset.into()));
    }

    pub fn insert_flag(&mut self, name: impl Into<String>, offset: impl Into<Offset>, on: &[u8], off: &[u8]) {
        self.offsets.insert(
            name.into(),
            OffsetEntry::Flag(FlagEntry {
                offsets: offset.into(),
                on: on.to_vec(),
                off: off.to_vec(),
            }),
        );
    }
}

pub fn load_offset_table<P: AsRef<Path>>(path: P) -> Result<OffsetTable> {
    let content = fs::read_to_string(&path)?;
    let table: OffsetTable = serde_json::from_str(&content)?;
    for (name, entry) in &table.offsets {
        if let OffsetEntry::Flag(flag) = entry {
            crate::offset::FlagPattern::new(flag.on.clone(), flag.off.clone())
                .map_err(|e| Error::InvalidOffset(format!("{}: {}", name, e)))?;
        }
    }
    Ok(table)
}

pub fn save_offset_table<P: AsRef<Path>>(path: P, table: &OffsetTable) -> Result<()> {
    let content = serde_json::to_string_pretty(table)?;
    fs::write(path, content)?;
    Ok(())
}

/// Parse `"0x1C65570, 0xF0"` into displacement values.
pub fn parse_offsets(text: &str) -> Result<Vec<u64>> {
    parse_hex_list(text, "Offset")?
        .into_iter()
        .map(|digits| {
            u64::from_str_radix(digits, 16)
                .map_err(|e| Error::InvalidOffset(format!("Invalid offset value '0x{}': {}", digits, e)))
        })
        .collect()
}

pub fn format_offsets(values: &[u64]) -> String {
    values
        .iter()
        .map(|v| format!("0x{:X}", v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse `"0x90, 0x90"` into raw bytes.
pub fn parse_flag_bytes(text: &str) -> Result<Vec<u8>> {
    parse_hex_list(text, "Flag byte")?
        .into_iter()
        .map(|digits| {
            u8::from_str_radix(digits, 16)
                .map_err(|e| Error::InvalidOffset(format!("Invalid flag byte '0x{}': {}", digits, e)))
        })
        .collect()
}

pub fn format_flag_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_hex_list<'a>(text: &'a str, what: &str) -> Result<Vec<&'a str>> {
    let mut digits = Vec::new();
    for token in text.split(',') {
        let token = token.trim();
        let hex = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .ok_or_else(|| Error::InvalidOffset(format!("{} values must start with '0x': '{}'", what, token)))?;
        digits.push(hex);
    }

    if digits.is_empty() {
        return Err(Error::InvalidOffset(format!("{} list is empty", what)));
    }
    Ok(digits)
}

mod flag_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_flag_bytes(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_flag_bytes(&text).map_err(serde::de::Error::custom)
    }
}

/// Offsets compiled in for the supported game build.
pub fn builtin_offsets() -> OffsetTable {
    let mut table = OffsetTable {
        version: "2020.12.29.0000.0000".to_string(),
        ..Default::default()
    };

    // Base offsets, relative to the main module
    table.insert("ActorTable", 0x1C65570);
    table.insert("GposeActorTable", 0x1C67000);
    table.insert("Gpose", 0x1C64168);
    table.insert("GposeCheck", 0x1CB4C9A);
    table.insert("GposeCheck2", 0x1C67D50);
    table.insert("Target", 0x1C641D0);
    table.insert("CameraOffset", 0x1C63F80);
    table.insert("Time", 0x1C44AF8);
    table.insert("WeatherOffset", 0x1C1B858);
    table.insert("TerritoryOffset", 0x1C42430);
    table.insert("GposeFilters", 0x1C42BB8);
    table.insert("MusicOffset", 0x1C81CA8);

    // Code patches
    let nop6 = [0x90; 6];
    let nop5 = [0x90; 5];
    let nop4 = [0x90; 4];
    let nop3 = [0x90; 3];
    table.insert_flag("Skeleton1Flag", 0x1382290, &nop6, &[0x41, 0x0F, 0x29, 0x5C, 0x12, 0x10]);
    table.insert_flag("Skeleton2Flag", 0x13833BD, &nop6, &[0x43, 0x0F, 0x29, 0x5C, 0x18, 0x10]);
    table.insert_flag("Skeleton3Flag", 0x1391024, &nop4, &[0x0F, 0x29, 0x5E, 0x10]);
    table.insert_flag("Skeleton4Flag", 0x13822A0, &nop6, &[0x41, 0x0F, 0x29, 0x44, 0x12, 0x20]);
    table.insert_flag("Skeleton5Flag", 0x138221B, &nop5, &[0x41, 0x0F, 0x29, 0x24, 0x12]);
    table.insert_flag("Skeleton6Flag", 0x13833CD, &nop6, &[0x43, 0x0F, 0x29, 0x44, 0x18, 0x20]);
    table.insert_flag("Physics1Flag", 0x37AA48, &nop4, &[0x0F, 0x29, 0x48, 0x10]);
    table.insert_flag("Physics2Flag", 0x37AA3F, &nop3, &[0x0F, 0x29, 0x00]);
    table.insert_flag("Physics3Flag", 0x37AA52, &nop4, &[0x0F, 0x29, 0x40, 0x20]);

    // Actor fields, relative to an actor pointer
    table.insert("Name", 0x30);
    table.insert("ActorId", 0x34);
    table.insert("ActorType", 0x8C);
    table.insert("ActorRender", 0x104);
    table.insert("Transparency", 0x1704);
    table.insert("ModelChara", 0x1888);
    table.insert("FreezeFacial", 0xCDC);
    table.insert("Position", [0xF0, 0x50]);
    table.insert("Rotation", [0xF0, 0x60]);
    table.insert("Scale", [0xF0, 0x70]);
    table.insert("Height", [0xF0, 0x26C]);
    table.insert("Wetness", [0xF0, 0x2B0]);
    table.insert("Drenched", [0xF0, 0x2BC]);
    table.insert("BustScale", [0xF0, 0x148, 0x68]);
    table.insert("UniqueFeatureScale", [0xF0, 0x148, 0x74]);
    table.insert("MuscleTone", [0xF0, 0x240, 0x28, 0x20, 0x0C]);
    table.insert("MainHandScale", [0xF0, 0x30, 0x70]);
    table.insert("MainHandColor", [0xF0, 0x30, 0x258]);
    table.insert("OffhandScale", [0xF0, 0x30, 0x28, 0x70]);
    table.insert("OffhandColor", [0xF0, 0x30, 0x28, 0x258]);
    table.insert("SkinColor", [0xF0, 0x240, 0x28, 0x20, 0x00]);
    table.insert("SkinGloss", [0xF0, 0x240, 0x28, 0x20, 0x10]);
    table.insert("MouthColor", [0xF0, 0x240, 0x28, 0x20, 0x20]);
    table.insert("MouthGloss", [0xF0, 0x240, 0x28, 0x20, 0x2C]);
    table.insert("HairColor", [0xF0, 0x240, 0x28, 0x20, 0x30]);
    table.insert("HairGloss", [0xF0, 0x240, 0x28, 0x20, 0x40]);
    table.insert("HairHighlight", [0xF0, 0x240, 0x28, 0x20, 0x50]);
    table.insert("LeftEyeColor", [0xF0, 0x240, 0x28, 0x20, 0x60]);
    table.insert("RightEyeColor", [0xF0, 0x240, 0x28, 0x20, 0x70]);
    table.insert("LimbalColor", [0xF0, 0x240, 0x28, 0x20, 0x80]);

    // Camera fields, relative to CameraOffset
    table.insert("Camera", 0xA0);
    table.insert("CameraCurrentZoom", 0x114);
    table.insert("CameraMinZoom", 0x118);
    table.insert("CameraMaxZoom", 0x11C);
    table.insert("FovCurrent", 0x120);
    table.insert("CameraAngleX", 0x130);
    table.insert("CameraAngleY", 0x134);
    table.insert("CameraRotation", 0x164);
    table.insert("CameraView", 0x180);

    // World state
    table.insert("TimeControl", [0x10, 0x08, 0x28, 0x80]);
    table.insert("Territory", [0x00, 0x134C]);
    table.insert("Weather", 0x20);
    table.insert("ForceWeather", 0x26);
    table.insert("Music", [0xC0, 0x114]);

    table
}
