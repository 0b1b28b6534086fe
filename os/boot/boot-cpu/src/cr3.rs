use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;
use boot_addresses::PhysicalAddress;

/// CR3: translation root register (PCID disabled).
///
/// Holds the physical base of the top-level table (PML4, or PML5 with
/// CR4.LA57 set) and cache-control flags for walks through it.
#[bitfield(u64)]
pub struct Cr3 {
    #[bits(3)]
    __: u8,

    /// Bit 3: write-through caching for the root table.
    pub pwt: bool,

    /// Bit 4: caching disabled for the root table.
    pub pcd: bool,

    #[bits(7)]
    __: u8,

    /// Bits 12–51: root table physical base >> 12.
    #[bits(40)]
    root_base_4k: u64,

    #[bits(12)]
    __: u16,
}

impl Cr3 {
    /// CR3 value pointing at the 4 KiB-aligned root table at `root`, with
    /// write-back caching.
    #[must_use]
    pub const fn from_root(root: PhysicalAddress) -> Self {
        debug_assert!(root.as_u64() & 0xFFF == 0, "root table must be 4K-aligned");
        Self::new().with_root_base_4k(root.as_u64() >> 12)
    }

    /// Physical address of the root table.
    #[must_use]
    pub const fn root(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.root_base_4k() << 12)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl LoadRegisterUnsafe for Cr3 {
    unsafe fn load_unsafe() -> Self {
        let mut cr3: u64;
        unsafe {
            core::arch::asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags));
        }
        Self::from_bits(cr3)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl StoreRegisterUnsafe for Cr3 {
    unsafe fn store_unsafe(self) {
        let cr3 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
        }
    }
}
