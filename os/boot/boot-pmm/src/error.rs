use crate::RegionKind;

/// Errors reported by the region map and its allocator.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PmmError {
    /// The operation would need more entries than the map may hold.
    #[error("region map capacity of {capacity} entries exceeded")]
    CapacityExceeded { capacity: usize },

    /// No free range in the area satisfies the request.
    #[error("out of memory: no {pages} page(s) aligned to {alignment:#x} free in the {area} area")]
    OutOfMemory {
        area: &'static str,
        pages: u64,
        alignment: u64,
    },

    /// `base + length` does not fit into 64 bits.
    #[error("range {base:#x}+{length:#x} overflows the physical address space")]
    AddressOverflow { base: u64, length: u64 },

    /// Alignment is not a power of two of at least one page.
    #[error("invalid alignment {0:#x}")]
    InvalidAlignment(u64),

    /// An address that has to be page-aligned is not.
    #[error("address {0:#x} is not page-aligned")]
    Misaligned(u64),

    /// Zero pages were requested.
    #[error("request for zero pages")]
    EmptyRequest,

    /// Attempt to free memory that is not currently allocated.
    #[error("range {base:#x}+{length:#x} is not an allocated range")]
    NotAllocated { base: u64, length: u64 },

    /// The range does not lie wholly inside one region of the expected kind.
    #[error("range {base:#x}+{length:#x} is not wholly {expected}")]
    ConversionMismatch {
        base: u64,
        length: u64,
        expected: RegionKind,
    },
}
