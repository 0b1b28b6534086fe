//! # Boot-Time Page Table Builder
//!
//! Builds the translation tables the loader hands over to the kernel.
//!
//! ## What you get
//! - An [`AddressSpace`] that owns one root table (or two, for split
//!   lower/upper layouts) and exposes `create`, `map`, `translate` and `load`.
//! - [`PagingMode`] presets describing depth, virtual address width, the
//!   native page sizes and the root layout as plain data.
//! - [`TableFormat`] implementations for [`X86_64`] and [`Aarch64`] entry
//!   encodings. The walk itself exists once and is shared by both.
//! - [`MapFlags`] for the caller-facing read/write/execute permissions.
//! - A tiny allocator/mapper interface ([`FrameAlloc`], [`PhysMapper`]) and
//!   [`RegionFrameAlloc`], which takes table frames from a
//!   [`RegionMap`](boot_pmm::RegionMap).
//!
//! ## Virtual Address → Physical Address Walk
//!
//! Every level consumes 9 bits of the virtual address above the 12-bit page
//! offset. Level 1 holds 4 KiB leaves; levels 2 and 3 may terminate early
//! with 2 MiB and 1 GiB leaves.
//!
//! ```text
//! | 56‒48 | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  L5   |  L4   |  L3   |  L2   |  L1   | Offset |
//!            │       │       │       └──► 4 KiB leaf
//!            │       │       └──────────► 2 MiB leaf (or next table)
//!            │       └──────────────────► 1 GiB leaf (or next table)
//!            └──────────────────────────► next table
//! ```
//!
//! ## Page size selection
//!
//! [`AddressSpace::map`] walks the range from low to high and at every step
//! writes the largest leaf that
//!
//! - the paging mode provides,
//! - the CPU supports (1 GiB leaves need [`CpuFeatures::gib_pages`]),
//! - both the physical and the virtual cursor are aligned to, and
//! - still fits into the remaining length.
//!
//! ## Permissions through shared tables
//!
//! Protection is enforced at the leaf, and every table above it may only
//! loosen it. Intermediate entries are therefore created writable, get
//! their writable bit OR'd in by later mappings, and lose their no-execute
//! bit as soon as any mapping beneath them needs to execute.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod address_space;
mod error;
mod flags;
mod format;
mod frame_alloc;
mod mode;
mod table;

pub use crate::address_space::{AddressSpace, MapStats, Translation};
pub use crate::error::MapError;
pub use crate::flags::MapFlags;
pub use crate::format::{Aarch64, Descriptor, Entry, EntryAttrs, PageEntryBits, TableFormat, X86_64};
pub use crate::frame_alloc::RegionFrameAlloc;
pub use crate::mode::{PagingMode, RootLayout};
pub use crate::table::{ENTRIES, PageTable};
pub use boot_cpu::CpuFeatures;

use boot_addresses::PhysicalAddress;

/// Source of zeroable 4 KiB frames for page tables.
pub trait FrameAlloc {
    /// Allocate one 4 KiB-aligned physical frame, or `None` when exhausted.
    fn alloc_4k(&mut self) -> Option<PhysicalAddress>;
}

/// Minimal physical-to-virtual mapping interface used by the builder.
///
/// While firmware services are alive physical memory is identity mapped,
/// so a loader implementation is a plain cast; tests map into a simulated
/// RAM buffer.
pub trait PhysMapper {
    /// Map a physical frame to a mutable reference of type `T`.
    ///
    /// # Safety
    /// The caller must ensure that the physical address is valid, properly
    /// aligned for `T`, and not aliased mutably elsewhere.
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T;
}
