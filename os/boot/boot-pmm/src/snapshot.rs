use crate::{MemoryRegion, RegionKind};
use alloc::boxed::Box;
use alloc::vec::Vec;

/// Read-only copy of a [`RegionMap`](crate::RegionMap), taken right before
/// leaving firmware services and translated into whatever entry format the
/// next stage expects.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemoryMapSnapshot {
    regions: Box<[MemoryRegion]>,
}

impl MemoryMapSnapshot {
    pub(crate) fn new(regions: Vec<MemoryRegion>) -> Self {
        Self {
            regions: regions.into_boxed_slice(),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[MemoryRegion] {
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

    pub fn iter(&self) -> core::slice::Iter<'_, MemoryRegion> {
        self.regions.iter()
    }

    /// Sum of all entry lengths.
    #[must_use]
    pub fn total_span(&self) -> u64 {
        self.regions.iter().map(|r| r.length).sum()
    }

    /// Total bytes of `kind`.
    #[must_use]
    pub fn bytes_of(&self, kind: RegionKind) -> u64 {
        self.regions
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| r.length)
            .sum()
    }

    /// Exclusive end of the highest entry, or zero for an empty map.
    #[must_use]
    pub fn highest_address(&self) -> u64 {
        self.regions.last().map_or(0, MemoryRegion::end)
    }

    /// Convert every entry with `f`, preserving order.
    pub fn translate<T, F>(&self, f: F) -> Vec<T>
    where
        F: FnMut(&MemoryRegion) -> T,
    {
        self.regions.iter().map(f).collect()
    }
}

impl<'a> IntoIterator for &'a MemoryMapSnapshot {
    type Item = &'a MemoryRegion;
    type IntoIter = core::slice::Iter<'a, MemoryRegion>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}
