use boot_addresses::PhysicalAddress;
use boot_pmm::{Area, MemoryRegion, PAGE_SIZE, PmmError, RegionKind, RegionMap};

/// Page-by-page reference of what the map must describe.
struct PageModel {
    pages: Vec<Option<RegionKind>>,
}

impl PageModel {
    fn new(pages: usize) -> Self {
        Self {
            pages: vec![None; pages],
        }
    }

    fn add(&mut self, first: usize, count: usize, kind: RegionKind, force: bool) {
        for page in first..first + count {
            if kind.is_page_granular() && page == 0 {
                continue;
            }
            let slot = &mut self.pages[page];
            match *slot {
                Some(existing) if !force && kind <= existing => {}
                _ => *slot = Some(kind),
            }
        }
    }

    fn regions(&self) -> Vec<MemoryRegion> {
        let mut out: Vec<MemoryRegion> = Vec::new();
        for (page, kind) in self.pages.iter().enumerate() {
            let Some(kind) = *kind else { continue };
            let base = page as u64 * PAGE_SIZE;
            match out.last_mut() {
                Some(last) if last.end() == base && last.kind == kind => last.length += PAGE_SIZE,
                _ => out.push(MemoryRegion::new(base, PAGE_SIZE, kind)),
            }
        }
        out
    }
}

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

#[test]
fn free_inside_reserved_leaves_reserved_intact() {
    let mut map = RegionMap::new();
    map.add_region(0x10_0000, 0x10_0000, RegionKind::Reserved, false)
        .unwrap();
    map.add_region(0x14_0000, 0x4_0000, RegionKind::Free, false)
        .unwrap();

    // The free range lies inside the reserved one and must not punch a hole.
    assert_eq!(
        map.regions(),
        [MemoryRegion::new(0x10_0000, 0x10_0000, RegionKind::Reserved)]
    );

    // Extending past the reserved range only fills the gap.
    map.add_region(0x1C_0000, 0x8_0000, RegionKind::Free, false)
        .unwrap();
    assert_eq!(
        map.regions(),
        [
            MemoryRegion::new(0x10_0000, 0x10_0000, RegionKind::Reserved),
            MemoryRegion::new(0x20_0000, 0x4_0000, RegionKind::Free),
        ]
    );
}

#[test]
fn free_adjacent_to_reserved_gives_two_entries() {
    let mut map = RegionMap::new();
    map.add_region(0x10_0000, 0x4_0000, RegionKind::Reserved, false)
        .unwrap();
    map.add_region(0x14_0000, 0x4_0000, RegionKind::Free, false)
        .unwrap();
    assert_eq!(
        map.regions(),
        [
            MemoryRegion::new(0x10_0000, 0x4_0000, RegionKind::Reserved),
            MemoryRegion::new(0x14_0000, 0x4_0000, RegionKind::Free),
        ]
    );
}

#[test]
fn allocation_skips_page_zero() {
    let mut map = RegionMap::new();
    map.add_region(0, 0x2000, RegionKind::Free, false).unwrap();

    let area = Area::new("first two pages", 0, 0x2000);
    let page = map.allocate(&area, 1).unwrap();

    assert_eq!(page.as_u64(), 0x1000);
    assert_eq!(
        map.regions(),
        [MemoryRegion::new(0x1000, 0x1000, RegionKind::Allocated)]
    );
    assert!(map.find(0).is_none());
}

#[test]
fn forced_free_inside_reserved_splits_it() {
    let mut map = RegionMap::new();
    map.add_region(0x10_0000, 0x10_0000, RegionKind::Reserved, false)
        .unwrap();
    map.add_region(0x14_0000, 0x4_0000, RegionKind::Free, true)
        .unwrap();
    assert_eq!(
        map.regions(),
        [
            MemoryRegion::new(0x10_0000, 0x4_0000, RegionKind::Reserved),
            MemoryRegion::new(0x14_0000, 0x4_0000, RegionKind::Free),
            MemoryRegion::new(0x18_0000, 0x8_0000, RegionKind::Reserved),
        ]
    );
}

#[test]
fn one_free_page_cannot_satisfy_two() {
    let mut map = RegionMap::new();
    map.add_region(0x10_0000, PAGE_SIZE, RegionKind::Free, false)
        .unwrap();

    assert!(matches!(
        map.allocate(&Area::STANDARD, 2),
        Err(PmmError::OutOfMemory { pages: 2, .. })
    ));
    assert_eq!(map.allocate(&Area::STANDARD, 1).unwrap().as_u64(), 0x10_0000);
    assert!(matches!(
        map.allocate(&Area::STANDARD, 1),
        Err(PmmError::OutOfMemory { .. })
    ));
}

#[test]
fn allocate_then_free_restores_the_map() {
    let mut map = RegionMap::new();
    map.add_region(0x1000, 0x9_F000, RegionKind::Free, false).unwrap();
    map.add_region(0x10_0000, 0x70_0000, RegionKind::Free, false)
        .unwrap();
    map.add_region(0x30_0000, 0x1000, RegionKind::AcpiNvs, false)
        .unwrap();
    let before = map.regions().to_vec();

    let a = map.allocate(&Area::STANDARD, 8).unwrap();
    let b = map
        .allocate_ext(&Area::STANDARD, 3, 0x20_0000, RegionKind::Allocated)
        .unwrap();
    let c = map.allocate(&Area::LOW_MEMORY, 1).unwrap();
    assert_ne!(map.regions(), before.as_slice());

    map.free(b, 3).unwrap();
    map.free(c, 1).unwrap();
    map.free(a, 8).unwrap();
    assert_eq!(map.regions(), before.as_slice());
}

#[test]
fn adjacent_allocations_coalesce_and_free_in_parts() {
    let mut map = RegionMap::new();
    map.add_region(0x10_0000, 0x10_0000, RegionKind::Free, false)
        .unwrap();

    let a = map.allocate(&Area::STANDARD, 2).unwrap();
    let b = map.allocate(&Area::STANDARD, 2).unwrap();
    assert_eq!(b.as_u64(), a.as_u64() + 0x2000);
    assert_eq!(map.regions()[0], MemoryRegion::new(0x10_0000, 0x4000, RegionKind::Allocated));

    // The merged entry still allows freeing either half.
    map.free(PhysicalAddress::new(0x10_1000), 2).unwrap();
    assert_eq!(
        map.regions(),
        [
            MemoryRegion::new(0x10_0000, 0x1000, RegionKind::Allocated),
            MemoryRegion::new(0x10_1000, 0x2000, RegionKind::Free),
            MemoryRegion::new(0x10_3000, 0x1000, RegionKind::Allocated),
            MemoryRegion::new(0x10_4000, 0xF_C000, RegionKind::Free),
        ]
    );
}

#[test]
fn allocator_never_changes_the_total_span() {
    let mut map = RegionMap::new();
    map.add_region(0x1000, 0x7F_F000, RegionKind::Free, false).unwrap();
    map.add_region(0x9_F000, 0x6_1000, RegionKind::Reserved, false)
        .unwrap();
    let span = map.total_span();

    let mut live = Vec::new();
    for pages in 1..20 {
        live.push((map.allocate(&Area::STANDARD, pages).unwrap(), pages));
        assert_eq!(map.total_span(), span);
    }
    for (at, pages) in live.into_iter().rev().step_by(2) {
        map.free(at, pages).unwrap();
        assert_eq!(map.total_span(), span);
    }
    assert!(map.is_well_formed());
}

#[test]
fn random_inserts_match_the_page_model() {
    const PAGES: usize = 256;
    let kinds = RegionKind::ALL;

    for seed in 0..32 {
        let mut rng = Lcg(seed);
        let mut map = RegionMap::new();
        let mut model = PageModel::new(PAGES);

        for _ in 0..64 {
            let first = rng.below(PAGES as u64 - 1) as usize;
            let count = 1 + rng.below((PAGES - first) as u64) as usize;
            let kind = kinds[rng.below(kinds.len() as u64) as usize];
            let force = rng.below(4) == 0;

            map.add_region(
                first as u64 * PAGE_SIZE,
                count as u64 * PAGE_SIZE,
                kind,
                force,
            )
            .unwrap();
            model.add(first, count, kind, force);

            assert!(map.is_well_formed(), "seed {seed}: {:?}", map.regions());
            assert_eq!(map.regions(), model.regions().as_slice(), "seed {seed}");
        }
    }
}

#[test]
fn random_allocations_stay_inside_free_memory() {
    for seed in 0..16 {
        let mut rng = Lcg(seed);
        let mut map = RegionMap::new();
        map.add_region(0x1000, 0xFF_F000, RegionKind::Free, false).unwrap();
        for _ in 0..8 {
            let base = rng.below(0x100) * PAGE_SIZE * 16;
            map.add_region(base, PAGE_SIZE * (1 + rng.below(8)), RegionKind::Reserved, false)
                .unwrap();
        }
        let span = map.total_span();
        let reserved = map.bytes_of(RegionKind::Reserved);

        let mut live = Vec::new();
        for _ in 0..64 {
            let pages = 1 + rng.below(16);
            let alignment = PAGE_SIZE << rng.below(4);
            match map.allocate_ext(&Area::STANDARD, pages, alignment, RegionKind::Allocated) {
                Ok(at) => {
                    assert_eq!(at.as_u64() % alignment, 0);
                    assert!(at.as_u64() >= Area::STANDARD.start());
                    live.push((at, pages));
                }
                Err(e) => assert!(matches!(e, PmmError::OutOfMemory { .. })),
            }

            if rng.below(3) == 0 && !live.is_empty() {
                let (at, pages) = live.swap_remove(rng.below(live.len() as u64) as usize);
                map.free(at, pages).unwrap();
            }

            assert!(map.is_well_formed());
            assert_eq!(map.total_span(), span);
            assert_eq!(map.bytes_of(RegionKind::Reserved), reserved);
        }

        let allocated: u64 = live.iter().map(|(_, p)| p * PAGE_SIZE).sum();
        assert_eq!(map.bytes_of(RegionKind::Allocated), allocated);
    }
}
