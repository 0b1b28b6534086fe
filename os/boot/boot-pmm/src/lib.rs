//! # Physical Memory Region Map
//!
//! Classifies every byte of physical memory the firmware reports and hands out
//! page-granular ranges of it during boot.
//!
//! ## Model
//!
//! The [`RegionMap`] is an ordered sequence of typed intervals
//! ([`MemoryRegion`]). Between any two operations it upholds three rules:
//!
//! 1. entries are strictly ascending by base,
//! 2. no two entries overlap,
//! 3. touching neighbors never share a [`RegionKind`] (they are merged).
//!
//! Every mutation goes through [`RegionMap::add_region`], which resolves the
//! overlap with existing entries in a single pass over the affected window
//! and re-coalesces the result. Whether an incoming range may replace an
//! existing classification depends on the total order of [`RegionKind`]:
//!
//! ```text
//! Free < Allocated < FirmwareReclaimable < AcpiReclaimable < AcpiNvs < Reserved < Bad
//! ```
//!
//! Unforced inserts only ever *raise* the classification of a byte. The
//! allocator operations ([`allocate`](RegionMap::allocate),
//! [`free`](RegionMap::free), [`convert`](RegionMap::convert)) force.
//!
//! ## Areas
//!
//! Allocations are constrained to an [`Area`], e.g. [`Area::LOW_MEMORY`] for
//! real-mode trampolines or [`Area::STANDARD`] for everything else.
//!
//! ## Example
//!
//! ```rust
//! # use boot_pmm::*;
//! let mut map = RegionMap::new();
//! map.add_region(0, 0x20_0000, RegionKind::Free, false).unwrap();
//! map.add_region(0xA_0000, 0x6_0000, RegionKind::Reserved, false).unwrap();
//!
//! let stack = map.allocate(&Area::STANDARD, 16).unwrap();
//! assert_eq!(stack.as_u64(), 0x10_0000);
//!
//! map.free(stack, 16).unwrap();
//! assert!(map.is_well_formed());
//! ```
//!
//! ## Capacity
//!
//! The backing storage is reserved up front ([`DEFAULT_CAPACITY`] entries
//! unless configured otherwise) and never grows. Exceeding it is reported as
//! [`PmmError::CapacityExceeded`].

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod allocator;
mod area;
mod error;
mod map;
mod region;
mod snapshot;

pub use crate::area::Area;
pub use crate::error::PmmError;
pub use crate::map::RegionMap;
pub use crate::region::{MemoryRegion, RegionKind};
pub use crate::snapshot::MemoryMapSnapshot;

/// Allocation granule of the region map.
pub const PAGE_SIZE: u64 = 0x1000;

/// Default limit of entries a [`RegionMap`] may hold.
pub const DEFAULT_CAPACITY: usize = 1024;
