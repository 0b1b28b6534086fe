use core::fmt;

/// Translation granule of a single leaf mapping.
///
/// The discriminants are ordered by size, so `Size1G > Size2M > Size4K`.
/// Whether a granule is usable depends on the paging mode and on CPU support
/// (1 GiB pages need `PDPE1GB` on x86-64).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum PageSize {
    /// 4 KiB base page.
    Size4K,
    /// 2 MiB large page.
    Size2M,
    /// 1 GiB huge page.
    Size1G,
}

impl PageSize {
    /// All granules, smallest first.
    pub const ALL: [Self; 3] = [Self::Size4K, Self::Size2M, Self::Size1G];

    /// Size in bytes.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> u64 {
        1 << self.shift()
    }

    /// `log2` of [`bytes`](Self::bytes).
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        match self {
            Self::Size4K => 12,
            Self::Size2M => 21,
            Self::Size1G => 30,
        }
    }

    /// Mask of the in-page offset bits.
    #[inline]
    #[must_use]
    pub const fn offset_mask(self) -> u64 {
        self.bytes() - 1
    }

    /// Whether `value` sits on a boundary of this granule.
    #[inline]
    #[must_use]
    pub const fn aligns(self, value: u64) -> bool {
        value & self.offset_mask() == 0
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Size4K => "4 KiB",
            Self::Size2M => "2 MiB",
            Self::Size1G => "1 GiB",
        })
    }
}
