use std::convert::Infallible;
use std::path::Path;

use crate::error::{Error, Result};
use crate::memory::ProcessMemory;

/// Process access is only implemented for Windows and Linux; this handle
/// cannot be constructed elsewhere.
pub struct ProcessHandle {
    never: Infallible,
}

impl ProcessHandle {
    pub fn find_by_name(_name: &str) -> Result<Self> {
        Err(Error::Attach(
            "process access is only supported on Windows and Linux".to_string(),
        ))
    }

    pub fn open(_pid: u32) -> Result<Self> {
        Err(Error::Attach(
            "process access is only supported on Windows and Linux".to_string(),
        ))
    }

    pub fn pid(&self) -> u32 {
        match self.never {}
    }

    pub fn executable_path(&self) -> &Path {
        match self.never {}
    }

    pub fn module_base(&self, _name: &str) -> Option<u64> {
        match self.never {}
    }
}

impl ProcessMemory for ProcessHandle {
    fn base_address(&self) -> Result<u64> {
        match self.never {}
    }

    fn read_into(&self, _address: u64, _buffer: &mut [u8]) -> Result<()> {
        match self.never {}
    }

    fn write_bytes(&self, _address: u64, _bytes: &[u8]) -> Result<usize> {
        match self.never {}
    }

    fn is_alive(&self) -> bool {
        match self.never {}
    }
}
