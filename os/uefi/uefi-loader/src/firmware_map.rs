//! # UEFI Memory Map Import
//!
//! Turns the firmware's memory map into region map entries and takes
//! ownership of the free memory, so boot services cannot hand it out again
//! behind the region map's back.

use crate::LoaderError;
use alloc::vec::Vec;
use boot_core::{BootContext, ClaimStats};
use boot_addresses::PhysicalAddress;
use boot_pmm::{MemoryRegion, PAGE_SIZE, RegionKind};
use log::{debug, info, trace, warn};
use uefi::boot::{self, AllocateType, MemoryType};
use uefi::mem::memory_map::MemoryMap;
use uefi::proto::loaded_image::LoadedImage;

/// How the region map classifies a UEFI memory type.
#[must_use]
pub const fn classify(ty: MemoryType) -> RegionKind {
    match ty {
        MemoryType::CONVENTIONAL => RegionKind::Free,
        MemoryType::BOOT_SERVICES_CODE | MemoryType::BOOT_SERVICES_DATA => {
            RegionKind::FirmwareReclaimable
        }
        MemoryType::ACPI_RECLAIM => RegionKind::AcpiReclaimable,
        MemoryType::ACPI_NON_VOLATILE => RegionKind::AcpiNvs,
        MemoryType::UNUSABLE => RegionKind::Bad,
        _ => RegionKind::Reserved,
    }
}

/// Seed `ctx` from the firmware memory map.
///
/// The first `firmware_reserve_pages` pages of conventional memory stay with
/// the firmware as [`RegionKind::FirmwareReclaimable`] so its pool allocator
/// keeps working. Every other conventional page is claimed with
/// `AllocatePages(AllocateAddress)` and only becomes [`RegionKind::Free`]
/// once the firmware agreed.
///
/// Claimed runs go straight into the region map. Everything else is
/// collected first, at most one entry per descriptor, so the pool is not
/// grown while its pages are being claimed.
pub fn seed(ctx: &mut BootContext) -> Result<usize, LoaderError> {
    let map = boot::memory_map(MemoryType::LOADER_DATA)
        .map_err(|e| LoaderError::firmware("GetMemoryMap", e.status()))?;
    debug!("firmware reports {} memory descriptors", map.len());

    let mut reserve_left = ctx.config().firmware_reserve_pages;
    let mut regions = Vec::with_capacity(map.len());
    let mut stats = ClaimStats::default();

    for d in map.entries() {
        let kind = classify(d.ty);
        trace!(
            "{:?} at {:#x}, {} pages -> {kind}",
            d.ty, d.phys_start, d.page_count
        );

        if kind != RegionKind::Free {
            regions.push(MemoryRegion::new(
                d.phys_start,
                d.page_count.saturating_mul(PAGE_SIZE),
                kind,
            ));
            continue;
        }

        let kept = d.page_count.min(reserve_left);
        reserve_left -= kept;
        if kept > 0 {
            regions.push(MemoryRegion::new(
                d.phys_start,
                kept * PAGE_SIZE,
                RegionKind::FirmwareReclaimable,
            ));
        }

        let start = d.phys_start + kept * PAGE_SIZE;
        stats += ctx.claim_free(start, d.page_count - kept, allocate_at)?;
    }
    let descriptors = map.len();
    drop(map);

    if stats.refused > 0 {
        warn!(
            "firmware refused {} free page(s), they are left out of the map",
            stats.refused
        );
    }
    info!(
        "claimed {:#x} bytes of free memory from firmware",
        stats.claimed * PAGE_SIZE
    );

    ctx.seed(regions)?;
    Ok(descriptors)
}

fn allocate_at(address: u64, pages: u64) -> bool {
    let Ok(count) = usize::try_from(pages) else {
        return false;
    };
    boot::allocate_pages(
        AllocateType::Address(address),
        MemoryType::BOOT_SERVICES_DATA,
        count,
    )
    .is_ok()
}

/// Base and size of the loader's own image. Loader code and data are
/// reserved in the region map, so the direct map does not cover them.
pub fn loaded_image() -> Result<(u64, u64), LoaderError> {
    let image = boot::open_protocol_exclusive::<LoadedImage>(boot::image_handle())
        .map_err(|e| LoaderError::firmware("OpenProtocol(LoadedImage)", e.status()))?;
    let (base, size) = image.info();
    Ok((PhysicalAddress::from_ptr(base).as_u64(), size))
}

/// Leave boot services. The firmware's final map is dropped: the region map
/// is authoritative from here on.
pub fn exit_boot_services() {
    info!("exiting boot services");
    crate::logger::exit_boot_services();

    let final_map = unsafe { boot::exit_boot_services(None) };
    debug!(
        "boot services exited with {} descriptors outstanding",
        final_map.len()
    );
    core::mem::forget(final_map);
}
