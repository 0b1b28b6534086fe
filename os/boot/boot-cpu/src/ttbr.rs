//! `AArch64` translation table base registers.
//!
//! `TTBR0_EL1` translates the lower half of the address space and
//! `TTBR1_EL1` the upper half, so a split-root address space loads both.

use bitfield_struct::bitfield;
use boot_addresses::PhysicalAddress;

/// `TTBRn_EL1` value.
#[bitfield(u64)]
pub struct Ttbr {
    /// Bit 0: common not private.
    pub cnp: bool,

    /// Bits 1–47: table base address >> 1.
    #[bits(47)]
    base_addr: u64,

    /// Bits 48–63: address space identifier.
    #[bits(16)]
    pub asid: u16,
}

impl Ttbr {
    /// Value pointing at the 4 KiB-aligned table at `root`, ASID 0.
    #[must_use]
    pub const fn from_root(root: PhysicalAddress) -> Self {
        debug_assert!(root.as_u64() & 0xFFF == 0, "root table must be 4K-aligned");
        Self::new().with_base_addr(root.as_u64() >> 1)
    }

    #[must_use]
    pub const fn root(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base_addr() << 1)
    }
}

/// Install `lower` into `TTBR0_EL1` and `upper` into `TTBR1_EL1`, then
/// invalidate stale translations.
///
/// # Safety
/// Must run at EL1 with the MMU configured for 4 KiB granules. Everything
/// the caller touches next must be mapped by the new tables.
#[cfg(all(feature = "asm", target_arch = "aarch64"))]
pub unsafe fn store_roots(lower: Ttbr, upper: Ttbr) {
    unsafe {
        core::arch::asm!(
            "msr ttbr0_el1, {lo}",
            "msr ttbr1_el1, {hi}",
            "isb",
            "tlbi vmalle1",
            "dsb ish",
            "isb",
            lo = in(reg) lower.into_bits(),
            hi = in(reg) upper.into_bits(),
            options(nostack, preserves_flags),
        );
    }
}
