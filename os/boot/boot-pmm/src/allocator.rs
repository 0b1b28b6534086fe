//! Page allocation on top of the [`RegionMap`].
//!
//! All operations reclassify through a forced
//! [`add_region`](RegionMap::add_region), so the map invariants are
//! maintained by the same code path as the initial seeding.

use crate::{Area, PAGE_SIZE, PmmError, RegionKind, RegionMap};
use boot_addresses::{PhysicalAddress, align_up, is_aligned};
use log::{debug, trace};

impl RegionMap {
    /// Allocate `pages` page-aligned pages from `area` as
    /// [`RegionKind::Allocated`].
    ///
    /// # Errors
    /// See [`allocate_ext`](Self::allocate_ext).
    pub fn allocate(&mut self, area: &Area, pages: u64) -> Result<PhysicalAddress, PmmError> {
        self.allocate_ext(area, pages, PAGE_SIZE, RegionKind::Allocated)
    }

    /// First-fit allocation of `pages` pages from the `Free` parts of `area`,
    /// with the start aligned to `alignment`. The range is reclassified as
    /// `kind`.
    ///
    /// # Errors
    /// - [`PmmError::EmptyRequest`] for `pages == 0`.
    /// - [`PmmError::InvalidAlignment`] unless `alignment` is a power of two
    ///   of at least [`PAGE_SIZE`].
    /// - [`PmmError::OutOfMemory`] if no free range fits.
    /// - [`PmmError::CapacityExceeded`] if the split does not fit the map.
    pub fn allocate_ext(
        &mut self,
        area: &Area,
        pages: u64,
        alignment: u64,
        kind: RegionKind,
    ) -> Result<PhysicalAddress, PmmError> {
        if pages == 0 {
            return Err(PmmError::EmptyRequest);
        }
        if !alignment.is_power_of_two() || alignment < PAGE_SIZE {
            return Err(PmmError::InvalidAlignment(alignment));
        }

        let out_of_memory = PmmError::OutOfMemory {
            area: area.name(),
            pages,
            alignment,
        };
        let size = pages.checked_mul(PAGE_SIZE).ok_or(out_of_memory)?;

        let start = self
            .iter()
            .filter(|r| r.kind == RegionKind::Free)
            .find_map(|r| {
                let lo = r.base.max(area.start());
                let hi = r.end().min(area.end());
                let start = align_up(lo, alignment)?;
                let end = start.checked_add(size)?;
                (end <= hi).then_some(start)
            })
            .ok_or(out_of_memory)?;

        self.add_region(start, size, kind, true)?;
        trace!("allocated {pages} page(s) at {start:#x} from the {} area as {kind}", area.name());
        Ok(PhysicalAddress::new(start))
    }

    /// Return `pages` pages at `address` to the free pool.
    ///
    /// # Errors
    /// - [`PmmError::EmptyRequest`] for `pages == 0`.
    /// - [`PmmError::NotAllocated`] unless the range is page-aligned and lies
    ///   inside a single [`RegionKind::Allocated`] entry.
    pub fn free(&mut self, address: PhysicalAddress, pages: u64) -> Result<(), PmmError> {
        if pages == 0 {
            return Err(PmmError::EmptyRequest);
        }

        let base = address.as_u64();
        let length = pages
            .checked_mul(PAGE_SIZE)
            .ok_or(PmmError::AddressOverflow { base, length: u64::MAX })?;

        if !is_aligned(base, PAGE_SIZE) || !self.is_range_of(base, length, RegionKind::Allocated) {
            return Err(PmmError::NotAllocated { base, length });
        }

        self.add_region(base, length, RegionKind::Free, true)?;
        trace!("freed {pages} page(s) at {base:#x}");
        Ok(())
    }

    /// Reclassify `[base, base + length)` from `from` to `to`.
    ///
    /// Used to claim memory a collaborator already occupies, e.g. the loader
    /// image or the firmware-provided stack reported as free.
    ///
    /// # Errors
    /// - [`PmmError::ConversionMismatch`] unless the range lies inside one
    ///   entry of kind `from`.
    /// - [`PmmError::AddressOverflow`] if the range wraps.
    pub fn convert(
        &mut self,
        from: RegionKind,
        to: RegionKind,
        base: u64,
        length: u64,
    ) -> Result<(), PmmError> {
        if length == 0 {
            return Ok(());
        }

        base.checked_add(length)
            .ok_or(PmmError::AddressOverflow { base, length })?;

        if !self.is_range_of(base, length, from) {
            return Err(PmmError::ConversionMismatch {
                base,
                length,
                expected: from,
            });
        }

        debug!("converting [{base:#x}-{:#x}) from {from} to {to}", base + length);
        self.add_region(base, length, to, true)
    }

    /// Claim `pages` pages at the fixed `address`, which must be free.
    ///
    /// Callers with a preferred load address try this first and fall back
    /// to [`allocate`](Self::allocate).
    ///
    /// # Errors
    /// - [`PmmError::EmptyRequest`] for `pages == 0`.
    /// - [`PmmError::Misaligned`] if `address` is not page-aligned.
    /// - [`PmmError::ConversionMismatch`] if the range is not wholly free.
    pub fn allocate_at(
        &mut self,
        address: PhysicalAddress,
        pages: u64,
        kind: RegionKind,
    ) -> Result<PhysicalAddress, PmmError> {
        if pages == 0 {
            return Err(PmmError::EmptyRequest);
        }

        let base = address.as_u64();
        if !is_aligned(base, PAGE_SIZE) {
            return Err(PmmError::Misaligned(base));
        }

        let length = pages
            .checked_mul(PAGE_SIZE)
            .ok_or(PmmError::AddressOverflow { base, length: u64::MAX })?;
        self.convert(RegionKind::Free, kind, base, length)?;
        Ok(address)
    }

    /// Whether `[base, base + length)` lies inside a single entry of `kind`.
    ///
    /// Coalescing guarantees that a contiguous range of one kind is always
    /// a single entry, so checking the containing entry suffices.
    fn is_range_of(&self, base: u64, length: u64, kind: RegionKind) -> bool {
        let Some(end) = base.checked_add(length) else {
            return false;
        };
        self.find(base)
            .is_some_and(|r| r.kind == kind && r.contains_range(base, end))
    }
}
