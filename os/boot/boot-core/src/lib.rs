//! # Boot Memory Core
//!
//! Ties the region map and the page-table builder together for a loader.
//!
//! A [`BootContext`] is created once, seeded from the firmware's memory
//! descriptors and then threaded through every stage that allocates memory
//! or maps it:
//!
//! ```text
//! firmware map ──seed──► BootContext ──create_address_space──► AddressSpace
//!                           │    ▲                                 │
//!                           │    └────── table frames ◄──map_direct┘
//!                           └──snapshot / handoff_memory_map──► next stage
//! ```
//!
//! ## Example
//!
//! ```rust
//! # use boot_core::*;
//! # use boot_pmm::{MemoryRegion, RegionKind};
//! let mut ctx = BootContext::new(BootConfig::default(), CpuFeatures::BASELINE);
//! ctx.seed([
//!     MemoryRegion::new(0, 0xA_0000, RegionKind::Free),
//!     MemoryRegion::new(0x10_0000, 0x70_0000, RegionKind::Free),
//! ])
//! .unwrap();
//!
//! let stack_top = ctx.allocate_stack().unwrap();
//! assert_eq!(stack_top.as_u64(), 0x11_0000);
//! assert_eq!(ctx.handoff_memory_map().len(), 3);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod config;
mod context;
mod error;
pub mod handoff;

pub use crate::config::{BootConfig, HHDM_MIN_SIZE, HHDM_OFFSET};
pub use crate::context::{BootContext, ClaimStats, ensure_identity_mapped};
pub use crate::error::BootError;
pub use crate::handoff::{HandoffKind, HandoffMemoryMapEntry};
pub use boot_cpu::CpuFeatures;
