//! # Handoff memory map
//!
//! Fixed-layout form of the final region map for the next stage. Keep these
//! types `#[repr(C)]` and use fixed-size integers only.

use boot_pmm::{MemoryMapSnapshot, MemoryRegion, RegionKind};

/// Memory type tag at the ABI boundary.
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HandoffKind {
    /// Free for the kernel to use.
    Usable = 0,
    /// Loader allocations: tables, stack, boot data. Usable once consumed.
    BootloaderReclaimable = 1,
    /// Firmware boot-services memory.
    FirmwareReclaimable = 2,
    AcpiReclaimable = 3,
    AcpiNvs = 4,
    Reserved = 5,
    Bad = 6,
}

impl From<RegionKind> for HandoffKind {
    fn from(kind: RegionKind) -> Self {
        match kind {
            RegionKind::Free => Self::Usable,
            RegionKind::Allocated => Self::BootloaderReclaimable,
            RegionKind::FirmwareReclaimable => Self::FirmwareReclaimable,
            RegionKind::AcpiReclaimable => Self::AcpiReclaimable,
            RegionKind::AcpiNvs => Self::AcpiNvs,
            RegionKind::Reserved => Self::Reserved,
            RegionKind::Bad => Self::Bad,
        }
    }
}

/// One entry of the handoff memory map.
#[repr(C)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HandoffMemoryMapEntry {
    /// Physical base address.
    pub base: u64,
    /// Length in **bytes**.
    pub length: u64,
    /// A [`HandoffKind`] discriminant.
    pub kind: u32,
}

impl From<&MemoryRegion> for HandoffMemoryMapEntry {
    fn from(region: &MemoryRegion) -> Self {
        Self {
            base: region.base,
            length: region.length,
            kind: HandoffKind::from(region.kind) as u32,
        }
    }
}

/// Translate a snapshot entry by entry.
#[must_use]
pub fn translate(snapshot: &MemoryMapSnapshot) -> alloc::vec::Vec<HandoffMemoryMapEntry> {
    snapshot.translate(|region| HandoffMemoryMapEntry::from(region))
}

const _: () = assert!(size_of::<HandoffMemoryMapEntry>() == 24);
