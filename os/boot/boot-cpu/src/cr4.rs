use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// The paging controls held in `CR4`.
#[bitfield(u64, order = Lsb)]
pub struct Cr4 {
    #[bits(4)]
    __: u8,

    /// Large pages in 32-bit paging; ignored in long mode.
    pub pse: bool,

    /// Set whenever long mode is active.
    pub pae: bool,

    __: bool,

    /// Honour the global bit in leaf entries across `CR3` reloads.
    pub pge: bool,

    #[bits(4)]
    __: u8,

    /// Five-level translation with 57-bit linear addresses.
    ///
    /// Fixed while paging is on; firmware decides it for us.
    pub la57: bool,

    #[bits(51)]
    __: u64,
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl LoadRegisterUnsafe for Cr4 {
    unsafe fn load_unsafe() -> Self {
        let mut cr4: u64;
        unsafe {
            core::arch::asm!("mov {}, cr4", out(reg) cr4, options(nomem, preserves_flags));
        }
        Self::from_bits(cr4)
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl StoreRegisterUnsafe for Cr4 {
    unsafe fn store_unsafe(self) {
        let cr4 = self.into_bits();
        unsafe {
            core::arch::asm!("mov cr4, {}", in(reg) cr4, options(nomem, preserves_flags));
        }
    }
}
