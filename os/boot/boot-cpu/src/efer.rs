use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};
use bitfield_struct::bitfield;

/// Extended feature enables. Only the long mode and no-execute bits matter
/// to the page-table builder.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Efer {
    /// `SYSCALL`/`SYSRET` enabled.
    pub sce: bool,

    #[bits(7)]
    __: u8,

    /// Long mode requested.
    pub lme: bool,

    __: bool,

    /// Long mode in effect; read-only.
    pub lma: bool,

    /// Gives meaning to bit 63 of page-table entries. While clear, that bit
    /// is reserved and a set one faults.
    pub nxe: bool,

    #[bits(52)]
    __: u64,
}

impl Efer {
    pub const MSR: u32 = 0xC000_0080;
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl LoadRegisterUnsafe for Efer {
    unsafe fn load_unsafe() -> Self {
        let low: u32;
        let high: u32;
        unsafe {
            core::arch::asm!(
                "rdmsr",
                in("ecx") Self::MSR,
                out("eax") low,
                out("edx") high,
                options(nomem, nostack, preserves_flags)
            );
        }
        Self::from_bits(u64::from(high) << 32 | u64::from(low))
    }
}

#[cfg(all(feature = "asm", target_arch = "x86_64"))]
impl StoreRegisterUnsafe for Efer {
    #[allow(clippy::cast_possible_truncation)]
    unsafe fn store_unsafe(self) {
        let bits = self.into_bits();
        unsafe {
            core::arch::asm!(
                "wrmsr",
                in("ecx") Self::MSR,
                in("eax") bits as u32,
                in("edx") (bits >> 32) as u32,
                options(nomem, nostack, preserves_flags)
            );
        }
    }
}
