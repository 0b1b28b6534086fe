use core::fmt;

/// Classification of a physical range.
///
/// The declaration order is the override priority: a range of a higher kind
/// wins over a lower one when inserted without force. `Ord` is derived from
/// it, so `RegionKind::Bad > RegionKind::Reserved` holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum RegionKind {
    /// Usable RAM, available to the allocator.
    Free,
    /// RAM handed out by the allocator during boot.
    Allocated,
    /// RAM in use by firmware boot services; reusable once they exit.
    FirmwareReclaimable,
    /// ACPI tables; reusable after the OS has parsed them.
    AcpiReclaimable,
    /// ACPI non-volatile storage; must be preserved.
    AcpiNvs,
    /// Not usable as RAM.
    Reserved,
    /// Defective memory.
    Bad,
}

impl RegionKind {
    /// Every kind, lowest priority first.
    pub const ALL: [Self; 7] = [
        Self::Free,
        Self::Allocated,
        Self::FirmwareReclaimable,
        Self::AcpiReclaimable,
        Self::AcpiNvs,
        Self::Reserved,
        Self::Bad,
    ];

    /// Kinds whose bounds are shrunk to whole pages on insertion.
    #[inline]
    #[must_use]
    pub const fn is_page_granular(self) -> bool {
        matches!(self, Self::Free | Self::Allocated)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Allocated => "allocated",
            Self::FirmwareReclaimable => "firmware reclaimable",
            Self::AcpiReclaimable => "ACPI reclaimable",
            Self::AcpiNvs => "ACPI NVS",
            Self::Reserved => "reserved",
            Self::Bad => "bad",
        }
    }
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry of the [`RegionMap`](crate::RegionMap): `[base, base + length)`
/// of a single [`RegionKind`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MemoryRegion {
    pub base: u64,
    pub length: u64,
    pub kind: RegionKind,
}

impl MemoryRegion {
    #[inline]
    #[must_use]
    pub const fn new(base: u64, length: u64, kind: RegionKind) -> Self {
        Self { base, length, kind }
    }

    /// Exclusive end. Entries of a region map never overflow.
    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base + self.length
    }

    /// Whether `[base, end)` lies entirely inside this region.
    #[inline]
    #[must_use]
    pub const fn contains_range(&self, base: u64, end: u64) -> bool {
        self.base <= base && end <= self.end()
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:#014x}-{:#014x}) {:>8} KiB  {}",
            self.base,
            self.end(),
            self.length / 1024,
            self.kind
        )
    }
}
