//! # Processor Capabilities and Control Registers
//!
//! The narrow slice of CPU state the loader touches:
//!
//! - [`CpuFeatures`]: the capability flags that parametrize page-table
//!   construction (no-execute, 1 GiB pages, 57-bit linear addresses).
//! - [`cpuid`]: raw `CPUID` access plus the extended leaf `0x8000_0001`.
//! - Typed views of [`Cr3`](cr3::Cr3), [`Cr4`](cr4::Cr4) and
//!   [`Efer`](efer::Efer) on x86-64, and the translation table base
//!   registers on `AArch64`.
//! - [`halt`] to park the processor on fatal errors.
//!
//! Register accesses are behind the `asm` feature so the bit layouts can be
//! unit tested on any host.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod cpuid;
pub mod cr3;
pub mod cr4;
pub mod efer;
mod features;
pub mod ttbr;

pub use crate::features::CpuFeatures;

pub trait LoadRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn load_unsafe() -> Self;
}

pub trait StoreRegisterUnsafe {
    /// # Safety
    /// The caller must uphold the implementation-specific safety requirements.
    /// For example, the register access might be privileged and require kernel mode (Ring 0).
    unsafe fn store_unsafe(self);
}

/// Stop the processor for good.
///
/// Interrupts are masked first so nothing wakes it up again.
pub fn halt() -> ! {
    loop {
        #[cfg(all(feature = "asm", target_arch = "x86_64"))]
        unsafe {
            core::arch::asm!("cli", "hlt", options(nomem, nostack));
        }

        #[cfg(all(feature = "asm", target_arch = "aarch64"))]
        unsafe {
            core::arch::asm!("msr daifset, #0xf", "wfi", options(nomem, nostack));
        }

        core::hint::spin_loop();
    }
}
