use crate::{DEFAULT_CAPACITY, MemoryMapSnapshot, MemoryRegion, PAGE_SIZE, PmmError, RegionKind};
use alloc::vec::Vec;
use boot_addresses::{align_down, align_up};
use log::trace;

/// Ordered, disjoint and coalesced set of typed physical ranges.
///
/// See the [crate documentation](crate) for the invariants.
#[derive(Debug, Clone)]
pub struct RegionMap {
    regions: Vec<MemoryRegion>,
    capacity: usize,
}

impl Default for RegionMap {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionMap {
    /// Empty map holding at most [`DEFAULT_CAPACITY`] entries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Empty map holding at most `capacity` entries.
    ///
    /// The storage is allocated here and never grows afterwards, so the map
    /// stays usable once the firmware allocator is gone.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            regions: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    #[must_use]
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> core::slice::Iter<'_, MemoryRegion> {
        self.regions.iter()
    }

    /// Sum of all entry lengths.
    #[must_use]
    pub fn total_span(&self) -> u64 {
        self.regions.iter().map(|r| r.length).sum()
    }

    /// Total bytes classified as `kind`.
    #[must_use]
    pub fn bytes_of(&self, kind: RegionKind) -> u64 {
        self.regions
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.length)
            .sum()
    }

    /// Owned, immutable copy of the current entries.
    #[must_use]
    pub fn snapshot(&self) -> MemoryMapSnapshot {
        MemoryMapSnapshot::new(self.regions.clone())
    }

    /// The entry containing `address`, if any.
    #[must_use]
    pub fn find(&self, address: u64) -> Option<&MemoryRegion> {
        let idx = self.regions.partition_point(|r| r.end() <= address);
        self.regions
            .get(idx)
            .filter(|r| r.base <= address && address < r.end())
    }

    /// Whether the ordering, disjointness and coalescing rules hold, and
    /// `Free`/`Allocated` entries cover whole pages.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.regions.iter().all(|r| {
            r.length > 0
                && (!r.kind.is_page_granular()
                    || (r.base % PAGE_SIZE == 0 && r.length % PAGE_SIZE == 0))
        })
            && self.regions.windows(2).all(|w| {
                let (a, b) = (&w[0], &w[1]);
                a.end() <= b.base && !(a.end() == b.base && a.kind == b.kind)
            })
    }

    /// Classify `[base, base + length)` as `kind`.
    ///
    /// Without `force`, the new kind only replaces existing entries of lower
    /// priority; gaps are always filled. With `force`, it replaces whatever
    /// is there.
    ///
    /// `Free` and `Allocated` ranges are shrunk to whole pages, and never
    /// cover page zero. A range that vanishes that way is ignored. The same
    /// holds for what is left of them next to a byte-granular entry.
    ///
    /// # Errors
    /// - [`PmmError::AddressOverflow`] if the range wraps past `u64::MAX`.
    /// - [`PmmError::CapacityExceeded`] if the result needs more entries than
    ///   the map may hold. The map is left unchanged in that case.
    pub fn add_region(
        &mut self,
        base: u64,
        length: u64,
        kind: RegionKind,
        force: bool,
    ) -> Result<(), PmmError> {
        let end = base
            .checked_add(length)
            .ok_or(PmmError::AddressOverflow { base, length })?;

        let (start, end) = if kind.is_page_granular() {
            let Some(start) = align_up(base, PAGE_SIZE) else {
                return Ok(());
            };
            (start.max(PAGE_SIZE), align_down(end, PAGE_SIZE))
        } else {
            (base, end)
        };

        if start >= end {
            return Ok(());
        }

        self.insert(start, end, kind, force)
    }

    /// Single-pass overlap resolution of `[start, end)` against every entry
    /// that overlaps or touches it.
    fn insert(
        &mut self,
        start: u64,
        end: u64,
        kind: RegionKind,
        force: bool,
    ) -> Result<(), PmmError> {
        let lo = self.regions.partition_point(|r| r.end() < start);
        let hi = self.regions.partition_point(|r| r.base <= end);

        let mut pieces = Vec::with_capacity(hi - lo + 2);
        let mut push = |base: u64, end: u64, kind: RegionKind| {
            if base < end {
                pieces.push(MemoryRegion::new(base, end - base, kind));
            }
        };

        let mut cursor = start;
        for r in &self.regions[lo..hi] {
            let (r_start, r_end) = (r.base, r.end());

            push(cursor, r_start.min(end), kind);

            let wins = force || kind > r.kind;
            let overlap_start = r_start.max(start);
            let overlap_end = r_end.min(end);

            push(r_start, r_end.min(start), r.kind);
            push(overlap_start, overlap_end, if wins { kind } else { r.kind });
            push(r_start.max(end), r_end, r.kind);

            cursor = cursor.max(overlap_end);
        }
        push(cursor, end, kind);

        pieces.dedup_by(|next, prev| {
            if prev.end() == next.base && prev.kind == next.kind {
                prev.length += next.length;
                true
            } else {
                false
            }
        });

        // a byte-granular entry that keeps its ground leaves partial pages
        // on the free or allocated side
        pieces.retain_mut(|piece| {
            if !piece.kind.is_page_granular() {
                return true;
            }
            let end = align_down(piece.end(), PAGE_SIZE);
            match align_up(piece.base, PAGE_SIZE) {
                Some(base) if base < end => {
                    *piece = MemoryRegion::new(base, end - base, piece.kind);
                    true
                }
                _ => false,
            }
        });

        let new_len = self.regions.len() - (hi - lo) + pieces.len();
        if new_len > self.capacity {
            return Err(PmmError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        trace!(
            "region map: [{start:#x}-{end:#x}) {kind}{} replaces {} entries with {}",
            if force { " (forced)" } else { "" },
            hi - lo,
            pieces.len()
        );

        self.regions.splice(lo..hi, pieces);
        debug_assert!(self.is_well_formed());
        Ok(())
    }
}

impl<'a> IntoIterator for &'a RegionMap {
    type Item = &'a MemoryRegion;
    type IntoIter = core::slice::Iter<'a, MemoryRegion>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}
