use crate::format::{Entry, EntryAttrs, TableFormat};
use bitfield_struct::bitfield;
use boot_addresses::PhysicalAddress;

/// x86-64 paging structures (4- and 5-level).
#[derive(Debug, Copy, Clone)]
pub struct X86_64;

/// A raw x86-64 paging entry, valid at every level.
///
/// | Bits   | Name  | Meaning |
/// |--------|-------|---------|
/// | 0      | `P`   | Present |
/// | 1      | `RW`  | Writable |
/// | 2      | `US`  | User accessible |
/// | 3      | `PWT` | Write-through |
/// | 4      | `PCD` | Cache disable |
/// | 5      | `A`   | Accessed |
/// | 6      | `D`   | Dirty (leaf only) |
/// | 7      | `PS`  | Large page at L2/L3; `PAT` at L1 |
/// | 8      | `G`   | Global (leaf only) |
/// | 12–51  | addr  | Physical frame bits [51:12] |
/// | 63     | `XD`  | Execute disable (needs `EFER.NXE`) |
///
/// For 2 MiB and 1 GiB leaves bit 12 is the `PAT` bit; the loader always
/// writes aligned frames, so it stays clear.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct PageEntryBits {
    /// Bit 0: entry is valid.
    pub present: bool,

    /// Bit 1: writes allowed through this entry.
    pub writable: bool,

    /// Bit 2: user-mode access allowed.
    pub user_access: bool,

    /// Bit 3: write-through caching.
    pub write_through: bool,

    /// Bit 4: caching disabled.
    pub cache_disabled: bool,

    /// Bit 5: set by the CPU on access.
    pub accessed: bool,

    /// Bit 6: set by the CPU on write (leaf only).
    pub dirty: bool,

    /// Bit 7: maps a large page at L2/L3 instead of linking a table.
    pub large_page: bool,

    /// Bit 8: translation survives CR3 reloads (leaf only).
    pub global_translation: bool,

    #[bits(3)]
    pub os_available_low: u8,

    /// Bits 12–51: physical address >> 12.
    #[bits(40)]
    phys_addr_bits_51_12: u64,

    #[bits(7)]
    pub os_available_high: u8,

    /// Bits 59–62: protection key when PKU is enabled.
    #[bits(4)]
    pub protection_key: u8,

    /// Bit 63: instruction fetches through this entry fault.
    ///
    /// Reserved unless `EFER.NXE` is set. One `XD` anywhere on the walk is
    /// enough to forbid execution.
    pub no_execute: bool,
}

impl PageEntryBits {
    #[inline]
    #[must_use]
    pub const fn with_physical_address(self, phys: PhysicalAddress) -> Self {
        self.with_phys_addr_bits_51_12(phys.as_u64() >> 12)
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_bits_51_12() << 12)
    }
}

impl TableFormat for X86_64 {
    fn decode(raw: u64, level: u8) -> Entry {
        let e = PageEntryBits::from_bits(raw);
        if !e.present() {
            return Entry::Absent;
        }

        let is_leaf = level == 1 || ((level == 2 || level == 3) && e.large_page());
        let mut address = e.physical_address().as_u64();
        if is_leaf && level > 1 {
            // drop the PAT bit of large leaves
            address &= !((1u64 << (12 + 9 * u32::from(level - 1))) - 1);
        }

        let attrs = EntryAttrs {
            address: PhysicalAddress::new(address),
            writable: e.writable(),
            no_execute: e.no_execute(),
        };
        if is_leaf {
            Entry::Leaf(attrs)
        } else {
            Entry::Table(attrs)
        }
    }

    fn encode_table(next: PhysicalAddress, _level: u8, writable: bool, no_execute: bool) -> u64 {
        PageEntryBits::new()
            .with_present(true)
            .with_writable(writable)
            .with_no_execute(no_execute)
            .with_physical_address(next)
            .into_bits()
    }

    fn encode_leaf(frame: PhysicalAddress, level: u8, writable: bool, no_execute: bool) -> u64 {
        PageEntryBits::new()
            .with_present(true)
            .with_writable(writable)
            .with_large_page(level > 1)
            .with_no_execute(no_execute)
            .with_physical_address(frame)
            .into_bits()
    }
}
