use crate::FrameAlloc;
use boot_addresses::PhysicalAddress;
use boot_pmm::{Area, PmmError, RegionMap};

/// [`FrameAlloc`] backed by the region map: every table frame is a
/// one-page allocation from `area`.
pub struct RegionFrameAlloc<'a> {
    map: &'a mut RegionMap,
    area: Area,
    frames: u64,
    last_error: Option<PmmError>,
}

impl<'a> RegionFrameAlloc<'a> {
    /// Allocate table frames from [`Area::STANDARD`].
    pub const fn new(map: &'a mut RegionMap) -> Self {
        Self::with_area(map, Area::STANDARD)
    }

    pub const fn with_area(map: &'a mut RegionMap, area: Area) -> Self {
        Self {
            map,
            area,
            frames: 0,
            last_error: None,
        }
    }

    /// Number of frames handed out so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// The region map error behind the last `None`, e.g. to tell capacity
    /// exhaustion apart from running out of memory.
    pub const fn take_error(&mut self) -> Option<PmmError> {
        self.last_error.take()
    }
}

impl FrameAlloc for RegionFrameAlloc<'_> {
    fn alloc_4k(&mut self) -> Option<PhysicalAddress> {
        match self.map.allocate(&self.area, 1) {
            Ok(frame) => {
                self.frames += 1;
                Some(frame)
            }
            Err(e) => {
                self.last_error = Some(e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boot_pmm::RegionKind;

    #[test]
    fn frames_come_from_the_area_and_errors_are_kept() {
        let mut map = RegionMap::new();
        map.add_region(0x1000, 0x2000, RegionKind::Free, false).unwrap();

        let mut alloc = RegionFrameAlloc::with_area(&mut map, Area::LOW_MEMORY);
        assert_eq!(alloc.alloc_4k(), Some(PhysicalAddress::new(0x1000)));
        assert_eq!(alloc.alloc_4k(), Some(PhysicalAddress::new(0x2000)));
        assert_eq!(alloc.alloc_4k(), None);
        assert_eq!(alloc.frames(), 2);
        assert!(matches!(alloc.take_error(), Some(PmmError::OutOfMemory { .. })));
        assert_eq!(alloc.take_error(), None);
        assert_eq!(map.bytes_of(RegionKind::Allocated), 0x2000);
    }
}
