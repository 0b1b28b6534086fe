use boot_addresses::{PhysicalAddress, VirtualAddress};

/// Errors reported by [`AddressSpace`](crate::AddressSpace) operations.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    /// Physical address, virtual address or length is not 4 KiB-aligned.
    #[error("unaligned mapping ({paddr} -> {vaddr} / {length:#x})")]
    Misaligned {
        paddr: PhysicalAddress,
        vaddr: VirtualAddress,
        length: u64,
    },

    /// The virtual range leaves a canonical half of the address space.
    #[error("virtual range {vaddr} / {length:#x} is not canonical for {va_bits}-bit addresses")]
    NonCanonical {
        vaddr: VirtualAddress,
        length: u64,
        va_bits: u32,
    },

    /// The physical or virtual range wraps past the top of the address space.
    #[error("mapping {paddr} -> {vaddr} / {length:#x} wraps the address space")]
    AddressOverflow {
        paddr: PhysicalAddress,
        vaddr: VirtualAddress,
        length: u64,
    },

    /// No frame was available for a new table.
    #[error("out of memory allocating a level {level} page table")]
    OutOfMemory { level: u8 },

    /// A table is needed where a large leaf exists, or a large leaf would
    /// replace a table.
    #[error("cannot remap {vaddr} over an incompatible existing mapping at level {level}")]
    IncompatibleMapping { vaddr: VirtualAddress, level: u8 },
}
