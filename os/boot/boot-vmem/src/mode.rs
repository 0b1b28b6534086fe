use boot_addresses::PageSize;
use boot_cpu::CpuFeatures;

/// How the top-level table(s) of an address space are organized.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RootLayout {
    /// One root translates the whole address space (x86-64 `CR3`).
    Single,
    /// One root for the lower half and one for the upper half, chosen by
    /// bit 63 of the virtual address (`AArch64` `TTBR0`/`TTBR1`).
    Split,
}

/// Architecture paging parameters as data.
///
/// The walker in [`AddressSpace`](crate::AddressSpace) is written once
/// against this description, so adding a mode never duplicates logic.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PagingMode {
    name: &'static str,
    levels: u8,
    va_bits: u32,
    /// Native leaf sizes and the level each one terminates at, smallest first.
    page_sizes: &'static [(PageSize, u8)],
    layout: RootLayout,
}

const FOUR_K_GRANULE: &[(PageSize, u8)] = &[
    (PageSize::Size4K, 1),
    (PageSize::Size2M, 2),
    (PageSize::Size1G, 3),
];

impl PagingMode {
    /// x86-64 4-level paging (48-bit virtual addresses).
    pub const X86_64_4LEVEL: Self = Self {
        name: "x86-64 4-level",
        levels: 4,
        va_bits: 48,
        page_sizes: FOUR_K_GRANULE,
        layout: RootLayout::Single,
    };

    /// x86-64 5-level paging (57-bit virtual addresses, CR4.LA57).
    pub const X86_64_5LEVEL: Self = Self {
        name: "x86-64 5-level",
        levels: 5,
        va_bits: 57,
        page_sizes: FOUR_K_GRANULE,
        layout: RootLayout::Single,
    };

    /// `AArch64` with 4 KiB granules and 48-bit halves in `TTBR0`/`TTBR1`.
    pub const AARCH64_4K_48BIT: Self = Self {
        name: "AArch64 4K/48-bit",
        levels: 4,
        va_bits: 48,
        page_sizes: FOUR_K_GRANULE,
        layout: RootLayout::Split,
    };

    /// The x86-64 mode the processor currently runs in.
    ///
    /// LA57 can only be toggled with paging off, so the depth follows what
    /// firmware enabled.
    #[must_use]
    pub const fn x86_64(features: &CpuFeatures) -> Self {
        if features.la57 {
            Self::X86_64_5LEVEL
        } else {
            Self::X86_64_4LEVEL
        }
    }

    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Number of translation levels (3–5).
    #[inline]
    #[must_use]
    pub const fn levels(&self) -> u8 {
        self.levels
    }

    /// Width of a canonical virtual address.
    #[inline]
    #[must_use]
    pub const fn va_bits(&self) -> u32 {
        self.va_bits
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> RootLayout {
        self.layout
    }

    /// Native page sizes, smallest first.
    pub fn page_sizes(&self) -> impl DoubleEndedIterator<Item = PageSize> + '_ {
        self.page_sizes.iter().map(|&(size, _)| size)
    }

    /// Level at which a leaf of `size` is written.
    #[must_use]
    pub fn leaf_level(&self, size: PageSize) -> Option<u8> {
        self.page_sizes
            .iter()
            .find(|&&(s, _)| s == size)
            .map(|&(_, level)| level)
    }

    /// Size of a leaf found at `level`.
    #[must_use]
    pub fn size_at(&self, level: u8) -> Option<PageSize> {
        self.page_sizes
            .iter()
            .find(|&&(_, l)| l == level)
            .map(|&(size, _)| size)
    }

    /// Largest page size usable at `paddr`/`vaddr` for `remaining` bytes.
    ///
    /// 1 GiB leaves are skipped unless the CPU reports support for them.
    #[must_use]
    pub fn select_page_size(
        &self,
        features: &CpuFeatures,
        paddr: u64,
        vaddr: u64,
        remaining: u64,
    ) -> PageSize {
        self.page_sizes()
            .rev()
            .filter(|&size| size != PageSize::Size1G || features.gib_pages)
            .find(|&size| size.aligns(paddr) && size.aligns(vaddr) && remaining >= size.bytes())
            .unwrap_or(PageSize::Size4K)
    }
}
