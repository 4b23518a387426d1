//! Linux process access through `/proc/<pid>/mem`.
//!
//! Covers games running under Wine/Proton, where the PE image is mapped from
//! its `.exe` file and shows up in `/proc/<pid>/maps` like any other module.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::memory::ProcessMemory;

/// An open handle to the game process.
pub struct ProcessHandle {
    mem: File,
    pid: u32,
    base_address: u64,
    executable_path: PathBuf,
    modules: HashMap<String, u64>,
}

impl ProcessHandle {
    /// Find the single running process whose name contains `name`
    /// (case-insensitive) and open it.
    pub fn find_by_name(name: &str) -> Result<Self> {
        let needle = name.to_lowercase();
        let mut matches = Vec::new();

        for entry in fs::read_dir("/proc")? {
            let entry = entry?;
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|s| s.parse::<u32>().ok())
            else {
                continue;
            };
            let Ok(comm) = fs::read_to_string(entry.path().join("comm")) else {
                continue;
            };
            if comm.trim().to_lowercase().contains(&needle) {
                matches.push(pid);
            }
        }

        match matches.as_slice() {
            [] => Err(Error::ProcessNotFound(name.to_string())),
            [pid] => {
                debug!("Found {} (pid {})", name, pid);
                Self::open(*pid)
            }
            _ => Err(Error::Attach(format!(
                "multiple processes match '{}': {:?}",
                name, matches
            ))),
        }
    }

    /// Open the process memory for reading and writing.
    pub fn open(pid: u32) -> Result<Self> {
        let proc_dir = PathBuf::from(format!("/proc/{}", pid));
        let executable_path = fs::read_link(proc_dir.join("exe"))
            .map_err(|e| Error::Attach(format!("process {}: {}", pid, e)))?;
        let mem = OpenOptions::new()
            .read(true)
            .write(true)
            .open(proc_dir.join("mem"))
            .map_err(|e| Error::Attach(format!("cannot open memory of process {}: {}", pid, e)))?;
        let maps = fs::read_to_string(proc_dir.join("maps"))
            .map_err(|e| Error::Attach(format!("cannot read maps of process {}: {}", pid, e)))?;

        let modules = parse_module_bases(&maps);
        let base_address = main_module_base(&maps, &executable_path, &modules).ok_or_else(|| {
            Error::Attach(format!("no modules found for process {}", pid))
        })?;

        info!(
            "Attached to {} (pid {}, base: {:#x})",
            executable_path.display(),
            pid,
            base_address
        );

        Ok(Self {
            mem,
            pid,
            base_address,
            executable_path,
            modules,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn executable_path(&self) -> &Path {
        &self.executable_path
    }

    /// Load address of a module by file name (case-insensitive).
    pub fn module_base(&self, name: &str) -> Option<u64> {
        self.modules.get(&name.to_lowercase()).copied()
    }
}

impl ProcessMemory for ProcessHandle {
    fn base_address(&self) -> Result<u64> {
        Ok(self.base_address)
    }

    fn read_into(&self, address: u64, buffer: &mut [u8]) -> Result<()> {
        match self.mem.read_at(buffer, address) {
            // A short read means the tail of the range was unmapped mid-read.
            Ok(_) => Ok(()),
            Err(e) => Err(Error::MemoryReadFailed {
                address,
                message: e.to_string(),
            }),
        }
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<usize> {
        self.mem
            .write_at(bytes, address)
            .map_err(|e| Error::MemoryWriteFailed {
                address,
                message: e.to_string(),
            })
    }

    fn is_alive(&self) -> bool {
        match fs::read_to_string(format!("/proc/{}/stat", self.pid)) {
            Ok(stat) => !matches!(process_state(&stat), Some('Z') | Some('X')),
            Err(_) => false,
        }
    }
}

/// State letter from `/proc/<pid>/stat`; the command name may contain spaces
/// and parentheses, so parse from the last `)`.
fn process_state(stat: &str) -> Option<char> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.trim_start().chars().next()
}

/// First mapping of each file-backed module, keyed by lowercase file name.
fn parse_module_bases(maps: &str) -> HashMap<String, u64> {
    let mut modules = HashMap::new();
    for line in maps.lines() {
        let Some((start, path)) = parse_maps_line(line) else {
            continue;
        };
        let Some(name) = Path::new(path).file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        modules.entry(name.to_lowercase()).or_insert(start);
    }
    modules
}

fn main_module_base(maps: &str, executable: &Path, modules: &HashMap<String, u64>) -> Option<u64> {
    // Under Wine the executable is the loader; prefer the first .exe image.
    let exe_image = maps
        .lines()
        .filter_map(parse_maps_line)
        .find(|(_, path)| path.to_lowercase().ends_with(".exe"))
        .map(|(start, _)| start);

    exe_image.or_else(|| {
        executable
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| modules.get(&n.to_lowercase()).copied())
    })
}

fn parse_maps_line(line: &str) -> Option<(u64, &str)> {
    let mut fields = line.splitn(6, char::is_whitespace);
    let range = fields.next()?;
    let path = fields.nth(4)?.trim();
    if !path.starts_with('/') {
        return None;
    }
    let start = range.split('-').next()?;
    let start = u64::from_str_radix(start, 16).ok()?;
    Some((start, path))
}
