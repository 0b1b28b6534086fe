use crate::format::{Entry, EntryAttrs, TableFormat};
use bitfield_struct::bitfield;
use boot_addresses::PhysicalAddress;

/// `AArch64` VMSAv8-64 descriptors with a 4 KiB granule.
///
/// Level 4 here is the architectural lookup level 0, level 1 is level 3.
#[derive(Debug, Copy, Clone)]
pub struct Aarch64;

/// Stage 1 translation descriptor, 4 KiB granule, 48-bit output address.
///
/// Bits 0 and 1 select the shape: `0b11` is a table at levels 2–4 and a
/// page at level 1, `0b01` is a block (2 MiB or 1 GiB leaf).
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct Descriptor {
    /// Bit 0: descriptor is valid.
    pub valid: bool,

    /// Bit 1: table (or page at level 1) when set, block when clear.
    pub table_or_page: bool,

    /// Bits 2–4: index into `MAIR_EL1`.
    #[bits(3)]
    pub attr_index: u8,

    /// Bit 5: non-secure.
    pub ns: bool,

    /// Bits 6–7: AP: bit 6 grants EL0 access, bit 7 makes it read-only.
    #[bits(2)]
    pub ap: u8,

    /// Bits 8–9: shareability (`0b11` inner shareable).
    #[bits(2)]
    pub sh: u8,

    /// Bit 10: access flag; faults on first access when clear.
    pub af: bool,

    /// Bit 11: not global.
    pub ng: bool,

    /// Bits 12–47: output address >> 12.
    #[bits(36)]
    output_address: u64,

    #[bits(4)]
    __: u8,

    /// Bit 52: contiguous hint.
    pub contiguous: bool,

    /// Bit 53: privileged execute-never.
    pub pxn: bool,

    /// Bit 54: unprivileged execute-never.
    pub uxn: bool,

    #[bits(4)]
    pub software: u8,

    /// Bit 59: (table) privileged execute-never for the subtree.
    pub pxn_table: bool,

    /// Bit 60: (table) unprivileged execute-never for the subtree.
    pub uxn_table: bool,

    /// Bits 61–62: (table) access limits for the subtree; bit 62 forbids writes.
    #[bits(2)]
    pub ap_table: u8,

    /// Bit 63: (table) non-secure subtree.
    pub ns_table: bool,
}

const AP_READ_ONLY: u8 = 0b10;
const SH_INNER: u8 = 0b11;

impl Descriptor {
    #[inline]
    #[must_use]
    pub const fn with_physical_address(self, phys: PhysicalAddress) -> Self {
        self.with_output_address(phys.as_u64() >> 12)
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.output_address() << 12)
    }
}

impl TableFormat for Aarch64 {
    fn decode(raw: u64, level: u8) -> Entry {
        let d = Descriptor::from_bits(raw);
        if !d.valid() {
            return Entry::Absent;
        }

        if level > 1 && d.table_or_page() {
            Entry::Table(EntryAttrs {
                address: d.physical_address(),
                writable: d.ap_table() & AP_READ_ONLY == 0,
                no_execute: d.pxn_table(),
            })
        } else {
            Entry::Leaf(EntryAttrs {
                address: d.physical_address(),
                writable: d.ap() & AP_READ_ONLY == 0,
                no_execute: d.pxn(),
            })
        }
    }

    fn encode_table(next: PhysicalAddress, _level: u8, writable: bool, no_execute: bool) -> u64 {
        Descriptor::new()
            .with_valid(true)
            .with_table_or_page(true)
            .with_ap_table(if writable { 0 } else { AP_READ_ONLY })
            .with_pxn_table(no_execute)
            .with_uxn_table(no_execute)
            .with_physical_address(next)
            .into_bits()
    }

    fn encode_leaf(frame: PhysicalAddress, level: u8, writable: bool, no_execute: bool) -> u64 {
        Descriptor::new()
            .with_valid(true)
            .with_table_or_page(level == 1)
            .with_sh(SH_INNER)
            .with_af(true)
            .with_ap(if writable { 0 } else { AP_READ_ONLY })
            .with_pxn(no_execute)
            .with_uxn(no_execute)
            .with_physical_address(frame)
            .into_bits()
    }
}
