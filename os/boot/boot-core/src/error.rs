use boot_pmm::PmmError;
use boot_vmem::MapError;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BootError {
    #[error(transparent)]
    Memory(#[from] PmmError),
    #[error(transparent)]
    Mapping(#[from] MapError),
    /// Rounding a region out to page boundaries left the address space.
    #[error("region at {base:#x} with length {length:#x} cannot be page aligned")]
    UnalignableRegion { base: u64, length: u64 },
    /// An address the loader still uses after the switch would not resolve
    /// to itself.
    #[error("{address:#x} is not identity mapped in the new address space")]
    NotIdentityMapped { address: u64 },
}
