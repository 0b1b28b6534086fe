//! # UEFI Boot Memory Loader
//!
//! A UEFI application that takes over physical memory management from the
//! firmware and builds the address space the next stage starts in.
//!
//! ## Boot sequence
//!
//! ```text
//! UEFI Firmware
//!         ↓
//! ┌─────────────────────────────────────────────┐
//! │  1. Logger (QEMU debug console + UEFI con)  │
//! │  2. CPU features, EFER.NXE                  │
//! │  3. Firmware memory map → region map        │
//! │     • claim free memory from firmware       │
//! │  4. Address space                           │
//! │     • identity + direct map                 │
//! │     • handoff stack                         │
//! │     • loader image and stack, verified      │
//! │  5. Snapshot, ExitBootServices, load root   │
//! │  6. Park the processor                      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Kernel loading and entry are not part of this loader; it stops with the
//! address space live and the handoff memory map ready.
//!
//! ## Virtual memory layout after step 5
//!
//! ```text
//! 0x0000_0000_0000_1000 ┌────────────────────────────────┐
//!                       │  Identity map (RWX)            │
//!                       │  [4 KiB, 4 GiB) + usable RAM   │
//!                       ├────────────────────────────────┤
//!                       │        Unmapped                │
//! 0xFFFF_8000_0000_1000 ├────────────────────────────────┤
//!                       │  Direct map (RW, NX)           │
//!                       │  same ranges, at HHDM offset   │
//! 0xFFFF_FFFF_FFFF_FFFF └────────────────────────────────┘
//! ```
//!
//! ## Errors
//!
//! Every failure is logged at `error` level and parks the processor; there
//! is nothing sensible to return to once firmware memory has been claimed.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![no_main]
#![allow(unsafe_code)]
extern crate alloc;

#[cfg(target_arch = "x86_64")]
mod debugcon;
mod error;
mod firmware_map;
mod logger;
mod mapper;

use crate::error::LoaderError;
use crate::mapper::IdentityMapper;
use alloc::vec::Vec;
use boot_addresses::PhysicalAddress;
use boot_core::{BootConfig, BootContext, HandoffMemoryMapEntry};
use boot_cpu::CpuFeatures;
use boot_vmem::{AddressSpace, PagingMode};
use log::{debug, error, info};
use uefi::prelude::*;

#[cfg(target_arch = "x86_64")]
type Format = boot_vmem::X86_64;

#[cfg(target_arch = "aarch64")]
type Format = boot_vmem::Aarch64;

/// Stack identity-mapped on either side of `run`'s frame.
const STACK_SLACK: u64 = 16 * boot_pmm::PAGE_SIZE;

/// What the next stage would be handed.
struct Handoff {
    memory_map: &'static [HandoffMemoryMapEntry],
    stack_top: PhysicalAddress,
    hhdm_offset: u64,
    hhdm_size: u64,
}

#[entry]
fn efi_main() -> Status {
    if uefi::helpers::init().is_err() {
        return Status::UNSUPPORTED;
    }

    let config = BootConfig::default();
    if logger::init(config.log_level).is_err() {
        return Status::ABORTED;
    }
    info!("UEFI loader reporting to QEMU");

    match run(config) {
        Ok(handoff) => info!(
            "memory map of {} entries, stack top {}, direct map at {:#x} of size {:#x}; parking",
            handoff.memory_map.len(),
            handoff.stack_top,
            handoff.hhdm_offset,
            handoff.hhdm_size
        ),
        Err(e) => error!("boot failed: {e}"),
    }

    boot_cpu::halt()
}

fn run(config: BootConfig) -> Result<Handoff, LoaderError> {
    let features = unsafe { CpuFeatures::detect() };
    features.report();

    #[cfg(target_arch = "x86_64")]
    if unsafe { features.enable_no_execute() } {
        debug!("EFER.NXE set");
    }

    let mut ctx = BootContext::new(config, features);
    firmware_map::seed(&mut ctx)?;

    info!("building the address space");
    let mapper = IdentityMapper;
    let space: AddressSpace<'_, IdentityMapper, Format> =
        ctx.create_address_space(paging_mode(&features), &mapper)?;
    let hhdm_size = ctx.map_direct(&space)?;
    let stack_top = ctx.allocate_stack()?;

    // the loader keeps running from its image and the firmware stack
    let (image_base, image_size) = firmware_map::loaded_image()?;
    ctx.map_identity(&space, image_base, image_size)?;
    let marker = 0u8;
    let stack = PhysicalAddress::from_ptr(core::ptr::from_ref(&marker)).as_u64();
    ctx.map_identity(
        &space,
        stack.saturating_sub(STACK_SLACK),
        2 * STACK_SLACK,
    )?;
    let code = PhysicalAddress::from_ptr(run as *const ()).as_u64();
    boot_core::ensure_identity_mapped(
        &space,
        &[code, image_base, image_base + image_size.max(1) - 1, stack],
    )?;

    for region in &ctx.snapshot() {
        debug!("{region}");
    }
    let memory_map = Vec::leak(ctx.handoff_memory_map());

    // nothing may be freed once the firmware allocator is gone
    core::mem::forget(ctx);
    firmware_map::exit_boot_services();

    unsafe { space.load() };
    info!("{} address space is live", space.mode().name());

    Ok(Handoff {
        memory_map,
        stack_top,
        hhdm_offset: config.hhdm_offset,
        hhdm_size,
    })
}

#[cfg(target_arch = "x86_64")]
const fn paging_mode(features: &CpuFeatures) -> PagingMode {
    PagingMode::x86_64(features)
}

#[cfg(target_arch = "aarch64")]
const fn paging_mode(_features: &CpuFeatures) -> PagingMode {
    PagingMode::AARCH64_4K_48BIT
}
