use tracing::trace;

use crate::error::{Error, Result};
use crate::memory::ProcessMemory;
use crate::offset::OffsetChain;

/// Walk `chain` through process memory and return the final address.
///
/// The first displacement is relative to the main module. Every later one is
/// added to the pointer read at the previous step; the last displacement is
/// never dereferenced. A chain with a single displacement is a direct
/// address and performs no reads.
pub fn resolve<P: ProcessMemory + ?Sized>(process: &P, chain: &OffsetChain) -> Result<u64> {
    let displacements = chain.flatten();
    let Some((&first, rest)) = displacements.split_first() else {
        return Err(invalid_address(chain));
    };

    let mut address = process.base_address()?.wrapping_add(first);

    for &displacement in rest {
        let pointer = process.read_u64(address)?;
        if pointer == 0 {
            return Err(invalid_address(chain));
        }
        address = pointer.wrapping_add(displacement);
    }

    if address == 0 {
        return Err(invalid_address(chain));
    }

    trace!("Resolved {} ({}) to {:#x}", chain.name(), chain, address);
    Ok(address)
}

fn invalid_address(chain: &OffsetChain) -> Error {
    Error::InvalidAddress {
        name: chain.name(),
        chain: chain.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockProcess;
    use crate::offset::Offset;

    fn process() -> MockProcess {
        MockProcess::builder()
            .base_address(0x1000)
            .write_u64(0x10F0, 0x2000)
            .write_u64(0x2148, 0x3000)
            .map(0x2000, 0x200)
            .map(0x3000, 0x100)
            .build()
    }

    #[test]
    fn test_resolve_pointer_chain() {
        let process = process();
        let chain = OffsetChain::new([0xF0, 0x50]);
        assert_eq!(resolve(&process, &chain).unwrap(), 0x2050);
        assert_eq!(process.read_count(), 1);
    }

    #[test]
    fn test_single_value_is_not_dereferenced() {
        let process = process();
        let chain = OffsetChain::new(0x37AA48);
        assert_eq!(resolve(&process, &chain).unwrap(), 0x1000 + 0x37AA48);
        assert_eq!(process.read_count(), 0);
    }

    #[test]
    fn test_multi_valued_offset_equals_single_chain() {
        let process = process();
        let packed = OffsetChain::new([0xF0, 0x148, 0x68]);
        let split = OffsetChain::new(0xF0).then(0x148).then(0x68);
        let mixed = OffsetChain::new(0xF0).then([0x148, 0x68]);

        let expected = 0x3068;
        assert_eq!(resolve(&process, &packed).unwrap(), expected);
        assert_eq!(resolve(&process, &split).unwrap(), expected);
        assert_eq!(resolve(&process, &mixed).unwrap(), expected);
    }

    #[test]
    fn test_null_pointer_is_invalid_address() {
        let process = MockProcess::builder()
            .base_address(0x1000)
            .write_u64(0x10F0, 0)
            .build();
        let chain = OffsetChain::new(Offset::from(0xF0).named("Target")).then(0x50);

        match resolve(&process, &chain) {
            Err(Error::InvalidAddress { name, chain }) => {
                assert_eq!(name, "Target, [Unknown]");
                assert_eq!(chain, "0xF0, 0x50");
            }
            other => panic!("expected InvalidAddress, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_result_is_invalid_address() {
        let process = MockProcess::builder().base_address(0).build();
        assert!(matches!(
            resolve(&process, &OffsetChain::new(0)),
            Err(Error::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_read_failure_propagates() {
        let process = MockProcess::builder().base_address(0x1000).build();
        assert!(matches!(
            resolve(&process, &OffsetChain::new([0xF0, 0x50])),
            Err(Error::MemoryReadFailed { .. })
        ));
    }

    #[test]
    fn test_resolution_is_deterministic_and_follows_retarget() {
        let process = MockProcess::builder()
            .base_address(0x1000)
            .write_u64(0x10F0, 0x2000)
            .write_u64(0x10F8, 0x4000)
            .build();
        let chain = OffsetChain::new(0xF0).then(0x50);

        let first = resolve(&process, &chain).unwrap();
        assert_eq!(resolve(&process, &chain).unwrap(), first);

        let moved = chain.with_base(Offset::from(0xF8));
        assert_eq!(resolve(&process, &moved).unwrap(), 0x4050);
    }
}
