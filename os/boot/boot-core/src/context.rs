use crate::handoff::{self, HandoffMemoryMapEntry};
use crate::{BootConfig, BootError};
use alloc::vec::Vec;
use boot_addresses::{PhysicalAddress, VirtualAddress, align_down, align_up};
use boot_cpu::CpuFeatures;
use boot_pmm::{Area, MemoryMapSnapshot, MemoryRegion, PAGE_SIZE, RegionKind, RegionMap};
use boot_vmem::{
    AddressSpace, MapError, MapFlags, MapStats, PagingMode, PhysMapper, RegionFrameAlloc,
    TableFormat,
};
use core::ops::AddAssign;
use log::{debug, info, trace};

/// Outcome of [`BootContext::claim_free`], in pages.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct ClaimStats {
    pub claimed: u64,
    pub refused: u64,
}

impl AddAssign for ClaimStats {
    fn add_assign(&mut self, rhs: Self) {
        self.claimed += rhs.claimed;
        self.refused += rhs.refused;
    }
}

/// Everything the boot stages share: the region map, the detected CPU
/// features and the configuration. Passed by `&mut` instead of living in
/// globals.
#[derive(Debug, Clone)]
pub struct BootContext {
    map: RegionMap,
    features: CpuFeatures,
    config: BootConfig,
}

impl BootContext {
    /// Empty context; the region map reserves `config.region_capacity` entries.
    #[must_use]
    pub fn new(config: BootConfig, features: CpuFeatures) -> Self {
        Self {
            map: RegionMap::with_capacity(config.region_capacity),
            features,
            config,
        }
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &BootConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub const fn features(&self) -> &CpuFeatures {
        &self.features
    }

    #[inline]
    #[must_use]
    pub const fn regions(&self) -> &RegionMap {
        &self.map
    }

    #[inline]
    pub const fn regions_mut(&mut self) -> &mut RegionMap {
        &mut self.map
    }

    /// Insert raw firmware descriptors without force, so overlapping reports
    /// resolve to the more restrictive kind regardless of their order.
    ///
    /// # Errors
    /// The first [`PmmError`](boot_pmm::PmmError) from the region map.
    pub fn seed<I>(&mut self, descriptors: I) -> Result<usize, BootError>
    where
        I: IntoIterator<Item = MemoryRegion>,
    {
        let mut count = 0;
        for d in descriptors {
            self.map.add_region(d.base, d.length, d.kind, false)?;
            count += 1;
        }
        debug!(
            "seeded {count} descriptor(s) into {} region(s), {:#x} bytes free",
            self.map.len(),
            self.map.bytes_of(RegionKind::Free)
        );
        Ok(count)
    }

    /// Take `[start, start + pages)` over from the firmware as free memory.
    ///
    /// `claim(base, pages)` asks the firmware for a range and reports whether
    /// it agreed. The whole range is tried first, then one page at a time.
    /// Each run of claimed pages enters the map as one region, so no memory
    /// is needed per page; refused pages stay out of the map.
    ///
    /// # Errors
    /// The first [`PmmError`](boot_pmm::PmmError) from the region map.
    pub fn claim_free<C>(
        &mut self,
        start: u64,
        pages: u64,
        mut claim: C,
    ) -> Result<ClaimStats, BootError>
    where
        C: FnMut(u64, u64) -> bool,
    {
        let mut stats = ClaimStats::default();
        if pages == 0 {
            return Ok(stats);
        }

        if claim(start, pages) {
            self.add_free(start, pages)?;
            stats.claimed = pages;
            return Ok(stats);
        }

        debug!("bulk claim of {pages} page(s) at {start:#x} failed, going page by page");
        let mut run: Option<(u64, u64)> = None;
        for page in (0..pages).map(|i| start + i * PAGE_SIZE) {
            if claim(page, 1) {
                stats.claimed += 1;
                match &mut run {
                    Some((_, count)) => *count += 1,
                    None => run = Some((page, 1)),
                }
            } else {
                stats.refused += 1;
                if let Some((base, count)) = run.take() {
                    self.add_free(base, count)?;
                }
            }
        }
        if let Some((base, count)) = run {
            self.add_free(base, count)?;
        }

        Ok(stats)
    }

    fn add_free(&mut self, base: u64, pages: u64) -> Result<(), BootError> {
        let length = pages.saturating_mul(PAGE_SIZE);
        self.map.add_region(base, length, RegionKind::Free, false)?;
        Ok(())
    }

    /// # Errors
    /// See [`RegionMap::allocate`].
    pub fn allocate(&mut self, area: &Area, pages: u64) -> Result<PhysicalAddress, BootError> {
        Ok(self.map.allocate(area, pages)?)
    }

    /// # Errors
    /// See [`RegionMap::free`].
    pub fn free(&mut self, address: PhysicalAddress, pages: u64) -> Result<(), BootError> {
        Ok(self.map.free(address, pages)?)
    }

    /// # Errors
    /// See [`RegionMap::convert`].
    pub fn convert(
        &mut self,
        from: RegionKind,
        to: RegionKind,
        base: u64,
        length: u64,
    ) -> Result<(), BootError> {
        Ok(self.map.convert(from, to, base, length)?)
    }

    /// Allocate a stack of `config.handoff_stack_pages` and return its top.
    ///
    /// # Errors
    /// See [`RegionMap::allocate`].
    pub fn allocate_stack(&mut self) -> Result<PhysicalAddress, BootError> {
        let pages = self.config.handoff_stack_pages;
        let base = self.map.allocate(&Area::STANDARD, pages)?;
        let top = base + pages * PAGE_SIZE;
        debug!("handoff stack at {base}, top {top}");
        Ok(top)
    }

    /// Create an address space whose tables come from `config.table_area`.
    ///
    /// # Errors
    /// [`BootError::Memory`] with the region map's reason if no root frame
    /// can be allocated.
    pub fn create_address_space<'m, M, F>(
        &mut self,
        mode: PagingMode,
        mapper: &'m M,
    ) -> Result<AddressSpace<'m, M, F>, BootError>
    where
        M: PhysMapper,
        F: TableFormat,
    {
        let mut alloc = RegionFrameAlloc::with_area(&mut self.map, self.config.table_area);
        AddressSpace::create(mode, self.features, &mut alloc, mapper)
            .map_err(|e| table_error(&mut alloc, e))
    }

    /// Build the direct map in `space` and return its size.
    ///
    /// `[4 KiB, hhdm_min_size)` is always covered. Above that every region
    /// the kernel may touch (free, allocated, firmware and ACPI reclaimable)
    /// is rounded out to whole pages. Each range is mapped twice: identity
    /// with all permissions, so the loader keeps running after the switch,
    /// and at `hhdm_offset` read/write.
    ///
    /// # Errors
    /// [`BootError::Memory`] if a table frame cannot be allocated,
    /// [`BootError::Mapping`] if a range cannot be mapped,
    /// [`BootError::UnalignableRegion`] for a region touching the top of the
    /// physical address space.
    pub fn map_direct<M, F>(&mut self, space: &AddressSpace<'_, M, F>) -> Result<u64, BootError>
    where
        M: PhysMapper,
        F: TableFormat,
    {
        let ranges = self.direct_map_ranges()?;
        let offset = self.config.hhdm_offset;

        // table frames come out of free memory that is already in `ranges`
        let mut alloc = RegionFrameAlloc::with_area(&mut self.map, self.config.table_area);
        let mut stats = MapStats::default();
        let mut size = 0;

        for &(start, end) in &ranges {
            let pa = PhysicalAddress::new(start);
            let length = end - start;
            trace!("direct map [{start:#x}-{end:#x})");

            stats += space
                .map(&mut alloc, pa, VirtualAddress::new(start), length, MapFlags::ALL)
                .map_err(|e| table_error(&mut alloc, e))?;
            stats += space
                .map(
                    &mut alloc,
                    pa,
                    VirtualAddress::new(offset.wrapping_add(start)),
                    length,
                    MapFlags::READ_WRITE,
                )
                .map_err(|e| table_error(&mut alloc, e))?;
            size = size.max(end);
        }

        info!(
            "direct map at {offset:#x} of size {size:#x}: {} ranges, {} tables, {}x1G {}x2M {}x4K",
            ranges.len(),
            stats.tables,
            stats.leaves_1g,
            stats.leaves_2m,
            stats.leaves_4k
        );
        Ok(size)
    }

    /// Identity-map `[base, base + length)` rounded out to whole pages,
    /// leaving pages that are already mapped alone. Returns the number of
    /// bytes newly mapped.
    ///
    /// Covers what the loader runs from outside the direct map, such as its
    /// own image.
    ///
    /// # Errors
    /// [`BootError::UnalignableRegion`] if the range cannot be rounded,
    /// otherwise as [`BootContext::map_direct`].
    pub fn map_identity<M, F>(
        &mut self,
        space: &AddressSpace<'_, M, F>,
        base: u64,
        length: u64,
    ) -> Result<u64, BootError>
    where
        M: PhysMapper,
        F: TableFormat,
    {
        let end = base
            .checked_add(length)
            .and_then(|end| align_up(end, PAGE_SIZE))
            .ok_or(BootError::UnalignableRegion { base, length })?;

        let mut alloc = RegionFrameAlloc::with_area(&mut self.map, self.config.table_area);
        let mut page = align_down(base, PAGE_SIZE);
        let mut mapped = 0;

        while page < end {
            if let Some(t) = space.translate(VirtualAddress::new(page)) {
                let size = t.page_size.bytes();
                page = align_down(page, size).saturating_add(size);
                continue;
            }

            let start = page;
            while page < end && space.translate(VirtualAddress::new(page)).is_none() {
                page += PAGE_SIZE;
            }
            space
                .map(
                    &mut alloc,
                    PhysicalAddress::new(start),
                    VirtualAddress::new(start),
                    page - start,
                    MapFlags::ALL,
                )
                .map_err(|e| table_error(&mut alloc, e))?;
            mapped += page - start;
        }

        debug!("identity map of [{base:#x}, +{length:#x}) added {mapped:#x} bytes");
        Ok(mapped)
    }

    /// Sorted, disjoint, page-aligned ranges covered by the direct map.
    fn direct_map_ranges(&self) -> Result<Vec<(u64, u64)>, BootError> {
        let floor = self.config.hhdm_min_size;
        let mut ranges: Vec<(u64, u64)> = Vec::new();
        if floor > PAGE_SIZE {
            ranges.push((PAGE_SIZE, align_down(floor, PAGE_SIZE)));
        }

        for region in self.map.iter().filter(|r| is_direct_mapped(r.kind)) {
            if region.end() <= floor {
                continue;
            }

            let unalignable = BootError::UnalignableRegion {
                base: region.base,
                length: region.length,
            };
            let start = align_down(region.base.max(floor), PAGE_SIZE);
            let end = align_up(region.end(), PAGE_SIZE).ok_or(unalignable)?;

            // rounding may make neighbors share a page
            match ranges.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => ranges.push((start, end)),
            }
        }

        Ok(ranges)
    }

    /// Copy of the region map in its current state.
    #[must_use]
    pub fn snapshot(&self) -> MemoryMapSnapshot {
        self.map.snapshot()
    }

    /// The current region map in handoff encoding.
    #[must_use]
    pub fn handoff_memory_map(&self) -> Vec<HandoffMemoryMapEntry> {
        handoff::translate(&self.snapshot())
    }
}

/// Check that every address in `addresses` resolves to itself in `space`,
/// so it stays reachable once `space` is loaded.
///
/// # Errors
/// [`BootError::NotIdentityMapped`] for the first address that does not.
pub fn ensure_identity_mapped<M, F>(
    space: &AddressSpace<'_, M, F>,
    addresses: &[u64],
) -> Result<(), BootError>
where
    M: PhysMapper,
    F: TableFormat,
{
    for &address in addresses {
        let resolved = space
            .translate(VirtualAddress::new(address))
            .map(|t| t.paddr.as_u64());
        if resolved != Some(address) {
            return Err(BootError::NotIdentityMapped { address });
        }
    }
    Ok(())
}

/// A table frame the region map refused is reported with the region map's
/// reason, so a full map is not mistaken for exhausted memory.
fn table_error(alloc: &mut RegionFrameAlloc<'_>, e: MapError) -> BootError {
    match alloc.take_error() {
        Some(pmm) if matches!(e, MapError::OutOfMemory { .. }) => BootError::Memory(pmm),
        _ => e.into(),
    }
}

/// Kinds backed by memory the next stage may read or reclaim.
const fn is_direct_mapped(kind: RegionKind) -> bool {
    matches!(
        kind,
        RegionKind::Free
            | RegionKind::Allocated
            | RegionKind::FirmwareReclaimable
            | RegionKind::AcpiReclaimable
    )
}
