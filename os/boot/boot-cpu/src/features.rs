use crate::cpuid::ExtendedFeaturesEdx;
use log::{info, warn};

/// Processor capabilities that shape the page tables.
///
/// Every flag is optional: a missing capability degrades protection or
/// efficiency but never stops the boot.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct CpuFeatures {
    /// Leaf entries may carry a no-execute bit.
    pub no_execute: bool,
    /// 1 GiB leaves are allowed one level above the 2 MiB ones.
    pub gib_pages: bool,
    /// 57-bit linear addressing is active, i.e. five translation levels.
    pub la57: bool,
}

impl CpuFeatures {
    /// A processor with none of the optional capabilities.
    pub const BASELINE: Self = Self::new(false, false, false);

    #[inline]
    #[must_use]
    pub const fn new(no_execute: bool, gib_pages: bool, la57: bool) -> Self {
        Self {
            no_execute,
            gib_pages,
            la57,
        }
    }

    /// Capabilities from CPUID.80000001H:EDX plus the current CR4.LA57 state.
    #[must_use]
    pub const fn from_cpuid(edx: ExtendedFeaturesEdx, la57: bool) -> Self {
        Self::new(edx.nx(), edx.page_1gb(), la57)
    }

    /// Probe the running processor.
    ///
    /// # Safety
    /// Must run at CPL0, since CR4 is read.
    #[cfg(all(feature = "asm", target_arch = "x86_64"))]
    #[must_use]
    pub unsafe fn detect() -> Self {
        use crate::LoadRegisterUnsafe;
        use crate::cpuid::{LEAF_8000_0001H, LEAF_MAX_EXTENDED, cpuid};
        use crate::cr4::Cr4;

        let max_extended = unsafe { cpuid(LEAF_MAX_EXTENDED, 0) }.eax;
        let edx = if max_extended >= LEAF_8000_0001H {
            ExtendedFeaturesEdx::from_bits(unsafe { cpuid(LEAF_8000_0001H, 0) }.edx)
        } else {
            ExtendedFeaturesEdx::new()
        };

        let la57 = unsafe { Cr4::load_unsafe() }.la57();
        Self::from_cpuid(edx, la57)
    }

    /// `AArch64` with 4 KiB granules always has execute-never bits and 1 GiB
    /// blocks; 52-bit addressing is not used.
    ///
    /// # Safety
    /// Kept `unsafe` for parity with the x86-64 detection.
    #[cfg(all(feature = "asm", target_arch = "aarch64"))]
    #[must_use]
    pub unsafe fn detect() -> Self {
        Self::new(true, true, false)
    }

    /// Turn on EFER.NXE if the processor has NX. Returns whether NX is
    /// usable afterwards.
    ///
    /// # Safety
    /// Must run at CPL0.
    #[cfg(all(feature = "asm", target_arch = "x86_64"))]
    pub unsafe fn enable_no_execute(&self) -> bool {
        use crate::efer::Efer;
        use crate::{LoadRegisterUnsafe, StoreRegisterUnsafe};

        if self.no_execute {
            unsafe { Efer::load_unsafe().with_nxe(true).store_unsafe() };
        }
        self.no_execute
    }

    /// Log the capabilities and warn about the degraded ones.
    pub fn report(&self) {
        info!(
            "CPU features: no-execute={}, 1 GiB pages={}, LA57={}",
            self.no_execute, self.gib_pages, self.la57
        );
        if !self.gib_pages {
            warn!("CPU has no 1 GiB page support, large ranges use 2 MiB pages");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_cpuid_reads_nx_and_page1gb() {
        let edx = ExtendedFeaturesEdx::new().with_nx(true).with_page_1gb(false);
        assert_eq!(
            CpuFeatures::from_cpuid(edx, true),
            CpuFeatures::new(true, false, true)
        );
        assert_eq!(CpuFeatures::default(), CpuFeatures::BASELINE);
    }
}
