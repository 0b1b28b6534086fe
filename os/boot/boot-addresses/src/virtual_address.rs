use crate::PageSize;
use core::fmt;
use core::ops::{Add, AddAssign};

/// Virtual memory address.
///
/// Denotes an address in a translated address space. Besides alignment
/// helpers this type knows how to slice itself into per-level table indices:
/// every level consumes 9 bits above the 12-bit page offset.
///
/// ```text
/// level:  5       4       3       2       1       offset
/// bits:   56‒48   47‒39   38‒30   29‒21   20‒12   11‒0
/// ```
///
/// ### Examples
/// ```rust
/// # use boot_addresses::*;
/// let va = VirtualAddress::new(0xFFFF_8000_0020_3000);
/// assert_eq!(va.table_index(4), 256);
/// assert_eq!(va.table_index(2), 1);
/// assert_eq!(va.table_index(1), 3);
/// assert!(va.is_upper_half());
/// assert!(va.is_canonical(48));
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self::new(0)
    }

    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_aligned(self, size: PageSize) -> bool {
        size.aligns(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn page_offset(self, size: PageSize) -> u64 {
        self.0 & size.offset_mask()
    }

    /// Index (0..512) into the table at `level`, where level 1 holds the
    /// 4 KiB leaves.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn table_index(self, level: u8) -> usize {
        debug_assert!(level >= 1 && level <= 5);
        ((self.0 >> (12 + 9 * (level as u32 - 1))) & 0x1FF) as usize
    }

    /// Bit 63 set. Split-root layouts use this to pick the kernel root.
    #[inline]
    #[must_use]
    pub const fn is_upper_half(self) -> bool {
        self.0 >> 63 == 1
    }

    /// Whether the bits above `va_bits - 1` are a sign extension of bit
    /// `va_bits - 1`.
    #[inline]
    #[must_use]
    pub const fn is_canonical(self, va_bits: u32) -> bool {
        if va_bits >= 64 {
            return true;
        }
        let top = self.0 >> (va_bits - 1);
        top == 0 || top == (u64::MAX >> (va_bits - 1))
    }

    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: u64) -> Option<Self> {
        match self.0.checked_add(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VA(0x{:016X})", self.as_u64())
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.as_u64())
    }
}

impl From<u64> for VirtualAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl Add<u64> for VirtualAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<u64> for VirtualAddress {
    #[inline]
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}
