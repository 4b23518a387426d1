//! In-memory stand-in for a game process.
//!
//! Memory is a sparse byte map: any access touching an unmapped byte fails
//! the way a read of an unmapped page would.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::memory::ProcessMemory;

pub struct MockProcess {
    base_address: u64,
    memory: Mutex<HashMap<u64, u8>>,
    alive: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    write_limit: Mutex<Option<usize>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MockProcess {
    pub fn builder() -> MockProcessBuilder {
        MockProcessBuilder::default()
    }

    /// Change memory the way the game would, without counting as a write.
    pub fn poke(&self, address: u64, bytes: &[u8]) {
        let mut memory = self.memory.lock();
        for (i, byte) in bytes.iter().enumerate() {
            memory.insert(address + i as u64, *byte);
        }
    }

    pub fn poke_f32s(&self, address: u64, values: &[f32]) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.poke(address, &bytes);
    }

    /// Inspect memory without counting as a read. Unmapped bytes read as 0.
    pub fn peek(&self, address: u64, size: usize) -> Vec<u8> {
        let memory = self.memory.lock();
        (0..size as u64)
            .map(|i| memory.get(&(address + i)).copied().unwrap_or(0))
            .collect()
    }

    pub fn peek_f32s(&self, address: u64, count: usize) -> Vec<f32> {
        self.peek(address, count * 4)
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Cap every write at `limit` bytes, like a partial `write_at`.
    pub fn set_write_limit(&self, limit: Option<usize>) {
        *self.write_limit.lock() = limit;
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ProcessMemory for MockProcess {
    fn base_address(&self) -> Result<u64> {
        Ok(self.base_address)
    }

    fn read_into(&self, address: u64, buffer: &mut [u8]) -> Result<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::MemoryReadFailed {
                address,
                message: "injected read failure".to_string(),
            });
        }

        let memory = self.memory.lock();
        for (i, slot) in buffer.iter_mut().enumerate() {
            let addr = address + i as u64;
            *slot = *memory.get(&addr).ok_or_else(|| Error::MemoryReadFailed {
                address,
                message: format!("address {:#x} is not mapped", addr),
            })?;
        }
        Ok(())
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<usize> {
        self.writes.fetch_add(1, Ordering::SeqCst);

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::MemoryWriteFailed {
                address,
                message: "injected write failure".to_string(),
            });
        }

        let mut memory = self.memory.lock();
        let mapped = (0..bytes.len() as u64).all(|i| memory.contains_key(&(address + i)));
        if !mapped {
            return Err(Error::MemoryWriteFailed {
                address,
                message: "range is not mapped".to_string(),
            });
        }
        let written = self.write_limit.lock().map_or(bytes.len(), |l| l.min(bytes.len()));
        for (i, byte) in bytes[..written].iter().enumerate() {
            memory.insert(address + i as u64, *byte);
        }
        Ok(written)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Builder for [`MockProcess`] memory images.
#[derive(Debug, Default)]
pub struct MockProcessBuilder {
    base_address: u64,
    memory: HashMap<u64, u8>,
}

impl MockProcessBuilder {
    pub fn base_address(mut self, base: u64) -> Self {
        self.base_address = base;
        self
    }

    /// Map `size` zeroed bytes at `address`.
    pub fn map(mut self, address: u64, size: usize) -> Self {
        for i in 0..size as u64 {
            self.memory.entry(address + i).or_insert(0);
        }
        self
    }

    pub fn write_bytes(mut self, address: u64, bytes: &[u8]) -> Self {
        for (i, byte) in bytes.iter().enumerate() {
            self.memory.insert(address + i as u64, *byte);
        }
        self
    }

    pub fn write_u64(self, address: u64, value: u64) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_i32(self, address: u64, value: i32) -> Self {
        self.write_bytes(address, &value.to_le_bytes())
    }

    pub fn write_f32s(self, address: u64, values: &[f32]) -> Self {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.write_bytes(address, &bytes)
    }

    pub fn build(self) -> MockProcess {
        MockProcess {
            base_address: self.base_address,
            memory: Mutex::new(self.memory),
            alive: AtomicBool::new(true),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            write_limit: Mutex::new(None),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }
}
