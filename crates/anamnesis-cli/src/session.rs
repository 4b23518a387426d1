//! Configuration, offset table and process selection shared by all commands.

use std::path::Path;
use std::sync::Arc;

use anamnesis_core::{
    MarshalerService, OffsetTable, ProcessHandle, ServiceConfig, builtin_offsets,
    load_offset_table,
};
use anyhow::{Context, Result};
use tracing::{info, warn};

pub struct Session {
    pub config: ServiceConfig,
    pub table: OffsetTable,
    pub pid: Option<u32>,
}

impl Session {
    pub fn load(
        config_path: &Path,
        offsets_path: Option<&Path>,
        pid: Option<u32>,
        process_name: Option<String>,
    ) -> Result<Self> {
        let mut config = load_config(config_path);
        if let Some(name) = process_name {
            config.process_name = name;
        }
        let table = load_table(offsets_path)?;
        Ok(Self { config, table, pid })
    }

    pub fn open_process(&self) -> Result<ProcessHandle> {
        let process = match self.pid {
            Some(pid) => ProcessHandle::open(pid)?,
            None => ProcessHandle::find_by_name(&self.config.process_name)
                .with_context(|| format!("Is {} running?", self.config.process_name))?,
        };
        eprintln!(
            "Attached to process {} ({})",
            process.pid(),
            process.executable_path().display()
        );
        Ok(process)
    }

    pub fn open_service(&self) -> Result<MarshalerService> {
        let process = self.open_process()?;
        Ok(MarshalerService::new(Arc::new(process), self.config.clone()))
    }
}

fn load_config(path: &Path) -> ServiceConfig {
    match ServiceConfig::load(path) {
        Ok(config) => {
            info!("Loaded config from {:?}", path);
            config
        }
        Err(e) if e.is_not_found() => {
            warn!("No config at {:?}, using defaults", path);
            ServiceConfig::default()
        }
        Err(e) => {
            warn!("Failed to load config: {}, using defaults", e);
            ServiceConfig::default()
        }
    }
}

fn load_table(path: Option<&Path>) -> Result<OffsetTable> {
    let Some(path) = path else {
        return Ok(builtin_offsets());
    };
    let table = load_offset_table(path)
        .with_context(|| format!("Failed to load offsets from {}", path.display()))?;
    info!("Loaded offsets version: {}", table.version);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnesis_core::save_offset_table;
    use tempfile::tempdir;

    #[test]
    fn test_missing_files_fall_back() {
        let dir = tempdir().unwrap();
        let session = Session::load(&dir.path().join("missing.toml"), None, None, None).unwrap();
        assert_eq!(session.config.process_name, ServiceConfig::default().process_name);
        assert_eq!(session.table.version, builtin_offsets().version);
    }

    #[test]
    fn test_process_name_override() {
        let dir = tempdir().unwrap();
        let session = Session::load(
            &dir.path().join("missing.toml"),
            None,
            Some(7),
            Some("game.exe".to_string()),
        )
        .unwrap();
        assert_eq!(session.config.process_name, "game.exe");
        assert_eq!(session.pid, Some(7));
    }

    #[test]
    fn test_offsets_file_is_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("offsets.json");
        let mut table = OffsetTable {
            version: "test".to_string(),
            ..Default::default()
        };
        table.insert("Target", [0x10, 0x20]);
        save_offset_table(&path, &table).unwrap();

        let session = Session::load(&dir.path().join("missing.toml"), Some(&path), None, None).unwrap();
        assert_eq!(session.table.version, "test");
        assert!(session.table.get("target").is_ok());
    }

    #[test]
    fn test_broken_offsets_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("offsets.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(Session::load(&dir.path().join("missing.toml"), Some(&path), None, None).is_err());
    }
}
