use std::sync::Arc;

use crate::error::Result;

/// Raw access to the memory of an attached process.
///
/// Implementations must be safe to call from several threads at once: the
/// tick thread, the liveness thread and any caller forcing an immediate
/// write share a single handle.
pub trait ProcessMemory: Send + Sync {
    /// Load address of the main module.
    fn base_address(&self) -> Result<u64>;

    /// Fill `buffer` with the bytes at `address`.
    ///
    /// Results the OS reports for a read racing against teardown (a partial
    /// copy, or an access to a region freed mid-read) are not errors; the
    /// buffer is left as the OS filled it.
    fn read_into(&self, address: u64, buffer: &mut [u8]) -> Result<()>;

    /// Write `bytes` at `address`, returning the number of bytes written.
    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<usize>;

    /// True while the process exists and is responding.
    fn is_alive(&self) -> bool;

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        self.read_into(address, &mut buffer)?;
        Ok(buffer)
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        let mut buffer = [0u8; 8];
        self.read_into(address, &mut buffer)?;
        Ok(u64::from_le_bytes(buffer))
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        let mut buffer = [0u8; 4];
        self.read_into(address, &mut buffer)?;
        Ok(i32::from_le_bytes(buffer))
    }

    fn read_f32(&self, address: u64) -> Result<f32> {
        let mut buffer = [0u8; 4];
        self.read_into(address, &mut buffer)?;
        Ok(f32::from_le_bytes(buffer))
    }
}

impl<P: ProcessMemory + ?Sized> ProcessMemory for Arc<P> {
    fn base_address(&self) -> Result<u64> {
        (**self).base_address()
    }

    fn read_into(&self, address: u64, buffer: &mut [u8]) -> Result<()> {
        (**self).read_into(address, buffer)
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<usize> {
        (**self).write_bytes(address, bytes)
    }

    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }
}
