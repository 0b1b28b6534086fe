//! `CPUID` access and the extended feature leaf.

use bitfield_struct::bitfield;

/// Highest extended leaf query.
pub const LEAF_MAX_EXTENDED: u32 = 0x8000_0000;

/// Extended processor info and feature bits.
pub const LEAF_8000_0001H: u32 = 0x8000_0001;

#[derive(Debug, Copy, Clone, Default)]
#[repr(C)]
pub struct CpuidResult {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
}

/// Execute CPUID with the given leaf and subleaf.
///
/// # Safety
/// The `cpuid` instruction must be available, which holds for every
/// x86-64 processor.
#[cfg(all(feature = "asm", target_arch = "x86_64"))]
#[inline]
#[allow(unused_assignments)]
#[must_use]
pub unsafe fn cpuid(leaf: u32, subleaf: u32) -> CpuidResult {
    let (mut eax, mut ebx, mut ecx, mut edx) = (leaf, 0u32, subleaf, 0u32);
    unsafe {
        core::arch::asm!(
            "push rbx",
            "cpuid",
            "mov {ebx_out:e}, ebx",
            "pop rbx",
            ebx_out = lateout(reg) ebx,
            inlateout("eax") eax,
            inlateout("ecx") ecx,
            lateout("edx") edx,
            options(nomem, preserves_flags),
        );
    }
    CpuidResult { eax, ebx, ecx, edx }
}

/// CPUID.80000001H:EDX: extended feature flags (AMD64 and Intel 64).
///
/// Only the bits the loader cares about are named.
#[bitfield(u32)]
pub struct ExtendedFeaturesEdx {
    #[bits(11)]
    __: u16,

    /// Bit 11: `SYSCALL`/`SYSRET` available in 64-bit mode.
    pub syscall: bool,

    #[bits(8)]
    __: u8,

    /// Bit 20: execute-disable bit in page tables.
    pub nx: bool,

    #[bits(5)]
    __: u8,

    /// Bit 26: 1 GiB pages in PDPT entries.
    pub page_1gb: bool,

    /// Bit 27: `RDTSCP` instruction.
    pub rdtscp: bool,

    __: bool,

    /// Bit 29: long mode.
    pub long_mode: bool,

    #[bits(2)]
    __: u8,
}
