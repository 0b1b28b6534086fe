use core::fmt;

/// A named physical window `[start, end)` that constrains where the
/// allocator may place a range.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Area {
    name: &'static str,
    start: u64,
    end: u64,
}

impl Area {
    /// Memory reachable in real mode below the EBDA/VGA hole.
    pub const CONVENTIONAL: Self = Self::new("conventional", 0, 0xA_0000);

    /// Everything below 1 MiB, e.g. for SMP startup trampolines.
    pub const LOW_MEMORY: Self = Self::new("low memory", 0, 0x10_0000);

    /// Above 1 MiB but reachable with 32-bit pointers.
    pub const BELOW_4G: Self = Self::new("below 4 GiB", 0x10_0000, 0x1_0000_0000);

    /// Everything above 1 MiB.
    pub const STANDARD: Self = Self::new("standard", 0x10_0000, u64::MAX);

    #[inline]
    #[must_use]
    pub const fn new(name: &'static str, start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { name, start, end }
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.end
    }
}

impl fmt::Display for Area {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:#x}-{:#x})", self.name, self.start, self.end)
    }
}
