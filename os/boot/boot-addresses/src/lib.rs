//! # Physical and Virtual Address Types
//!
//! Strongly typed wrappers for raw addresses used by the boot-time memory
//! code (the region map and the page-table builder).
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`PhysicalAddress`] | A byte address in physical memory (RAM or MMIO). |
//! | [`VirtualAddress`] | A byte address in a translated address space. |
//! | [`PageSize`] | One of the native translation granules (4 KiB, 2 MiB, 1 GiB). |
//!
//! Both address types are `#[repr(transparent)]` wrappers around `u64` so
//! they cost nothing at runtime but prevent VA↔PA mix-ups at compile time.
//!
//! Unlike a kernel, a loader chooses the page size per mapping step at
//! runtime (it depends on alignment and on CPU support), which is why
//! [`PageSize`] is a plain enum rather than a type-level marker.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use boot_addresses::*;
//! let pa = PhysicalAddress::new(0x20_0000);
//! let va = VirtualAddress::new(0xFFFF_8000_0020_0000);
//!
//! assert!(pa.is_aligned(PageSize::Size2M));
//! assert!(va.is_aligned(PageSize::Size2M));
//! assert!(!pa.is_aligned(PageSize::Size1G));
//!
//! assert_eq!(align_up(0x1001, 0x1000), Some(0x2000));
//! assert_eq!(align_down(0x1FFF, 0x1000), 0x1000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

mod page_size;
mod physical_address;
mod virtual_address;

pub use crate::page_size::PageSize;
pub use crate::physical_address::PhysicalAddress;
pub use crate::virtual_address::VirtualAddress;

/// Round `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. Returns `None` if the result does not
/// fit into a `u64`.
#[inline]
#[must_use]
pub const fn align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    let mask = align - 1;
    match value.checked_add(mask) {
        Some(v) => Some(v & !mask),
        None => None,
    }
}

/// Round `value` down to the previous multiple of `align`.
///
/// `align` must be a power of two.
#[inline]
#[must_use]
pub const fn align_down(value: u64, align: u64) -> u64 {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

/// Whether `value` is a multiple of `align` (a power of two).
#[inline]
#[must_use]
pub const fn is_aligned(value: u64, align: u64) -> bool {
    debug_assert!(align.is_power_of_two());
    value & (align - 1) == 0
}
