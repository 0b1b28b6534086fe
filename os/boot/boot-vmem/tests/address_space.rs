#![allow(unsafe_code)]

use boot_addresses::{PageSize, PhysicalAddress, VirtualAddress};
use boot_pmm::{Area, RegionKind, RegionMap};
use boot_vmem::{
    Aarch64, AddressSpace, CpuFeatures, Entry, MapError, MapFlags, PageEntryBits, PageTable,
    PagingMode, PhysMapper, RegionFrameAlloc, TableFormat, X86_64,
};
use std::cell::UnsafeCell;

const FULL: CpuFeatures = CpuFeatures::new(true, true, false);
const NO_GIB: CpuFeatures = CpuFeatures::new(true, false, false);
const NO_NX: CpuFeatures = CpuFeatures::new(false, true, false);

/// A 4 KiB-aligned raw frame of the simulated physical memory.
#[repr(align(4096))]
struct Aligned4K([u8; 4096]);

/// Simulated RAM: physical address `pa` lives in frame `pa / 4096`.
struct TestPhys {
    frames: Vec<UnsafeCell<Aligned4K>>,
}

impl TestPhys {
    fn with_frames(n: usize) -> Self {
        Self {
            frames: (0..n).map(|_| UnsafeCell::new(Aligned4K([0; 4096]))).collect(),
        }
    }

    fn size(&self) -> u64 {
        self.frames.len() as u64 * 4096
    }

    /// Region map describing all of the simulated RAM as free.
    fn region_map(&self) -> RegionMap {
        let mut map = RegionMap::new();
        map.add_region(0, self.size(), RegionKind::Free, false)
            .unwrap();
        map
    }

    fn area(&self) -> Area {
        Area::new("test ram", 0, self.size())
    }

    fn table(&self, pa: PhysicalAddress) -> &PageTable {
        unsafe { self.phys_to_mut::<PageTable>(pa) }
    }

    /// Raw entries of every table reachable from `root`, depth first.
    fn dump<F: TableFormat>(&self, root: PhysicalAddress, level: u8, out: &mut Vec<(u64, usize, u64)>) {
        for (index, raw) in self.table(root).iter_used() {
            out.push((root.as_u64(), index, raw));
            if let Entry::Table(link) = F::decode(raw, level) {
                self.dump::<F>(link.address, level - 1, out);
            }
        }
    }
}

impl PhysMapper for TestPhys {
    unsafe fn phys_to_mut<'a, T>(&self, pa: PhysicalAddress) -> &'a mut T {
        let idx = (pa.as_u64() >> 12) as usize;
        assert_eq!(pa.as_u64() & 0xFFF, 0, "tables live at frame starts");
        unsafe { &mut *self.frames[idx].get().cast::<T>() }
    }
}

fn entry(phys: &TestPhys, table: PhysicalAddress, index: usize) -> PageEntryBits {
    PageEntryBits::from_bits(phys.table(table).get(index))
}

#[test]
fn adjacent_pages_share_tables_and_keep_their_own_permissions() {
    let phys = TestPhys::with_frames(16);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());

    let space = AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, FULL, &mut alloc, &phys)
        .unwrap();

    let first = space
        .map(
            &mut alloc,
            PhysicalAddress::new(0x1000),
            VirtualAddress::new(0x1000),
            0x1000,
            MapFlags::READ_WRITE,
        )
        .unwrap();
    assert_eq!(first.tables, 3);
    assert_eq!(first.leaves_4k, 1);

    let second = space
        .map(
            &mut alloc,
            PhysicalAddress::new(0x2000),
            VirtualAddress::new(0x2000),
            0x1000,
            MapFlags::READ_EXECUTE,
        )
        .unwrap();
    assert_eq!(second.tables, 0, "the chain is shared");

    // PML4 -> PDPT -> PD -> PT, all through index 0
    let mut table = space.root();
    for _ in 0..3 {
        let e = entry(&phys, table, 0);
        assert!(e.present());
        assert!(e.writable());
        assert!(!e.no_execute(), "a descendant needs execute");
        assert!(!e.large_page());
        table = e.physical_address();
    }

    let rw = entry(&phys, table, 1);
    assert!(rw.present() && rw.writable() && rw.no_execute());
    assert_eq!(rw.physical_address().as_u64(), 0x1000);

    let rx = entry(&phys, table, 2);
    assert!(rx.present() && !rx.writable() && !rx.no_execute());
    assert_eq!(rx.physical_address().as_u64(), 0x2000);
}

#[test]
fn data_only_chains_keep_no_execute() {
    let phys = TestPhys::with_frames(16);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space = AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, FULL, &mut alloc, &phys)
        .unwrap();

    space
        .map(
            &mut alloc,
            PhysicalAddress::new(0x5000),
            VirtualAddress::new(0xFFFF_8000_0000_5000),
            0x1000,
            MapFlags::READ,
        )
        .unwrap();

    let e4 = entry(&phys, space.root(), 256);
    assert!(e4.no_execute());
    assert!(e4.writable(), "tables are created writable");

    let t = space.translate(VirtualAddress::new(0xFFFF_8000_0000_5123)).unwrap();
    assert_eq!(t.paddr.as_u64(), 0x5123);
    assert_eq!(t.page_size, PageSize::Size4K);
    assert!(!t.writable && t.no_execute);
}

#[test]
fn one_gib_leaf_when_supported() {
    let phys = TestPhys::with_frames(16);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space = AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, FULL, &mut alloc, &phys)
        .unwrap();

    let stats = space
        .map(
            &mut alloc,
            PhysicalAddress::zero(),
            VirtualAddress::zero(),
            0x4000_0000,
            MapFlags::ALL,
        )
        .unwrap();

    assert_eq!(stats.leaves(PageSize::Size1G), 1);
    assert_eq!(stats.leaves(PageSize::Size2M), 0);
    assert_eq!(stats.leaves(PageSize::Size4K), 0);
    assert_eq!(stats.tables, 1);

    let t = space.translate(VirtualAddress::new(0x3FFF_F123)).unwrap();
    assert_eq!(t.page_size, PageSize::Size1G);
    assert_eq!(t.paddr.as_u64(), 0x3FFF_F123);
}

#[test]
fn two_mib_leaves_without_gib_support() {
    let phys = TestPhys::with_frames(16);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space =
        AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, NO_GIB, &mut alloc, &phys)
            .unwrap();

    let stats = space
        .map(
            &mut alloc,
            PhysicalAddress::zero(),
            VirtualAddress::zero(),
            0x4000_0000,
            MapFlags::ALL,
        )
        .unwrap();

    assert_eq!(stats.leaves(PageSize::Size1G), 0);
    assert_eq!(stats.leaves(PageSize::Size2M), 512);
    assert_eq!(stats.tables, 2);

    for i in 0..512u64 {
        let va = VirtualAddress::new(i * 0x20_0000 + 0x1234);
        let t = space.translate(va).unwrap();
        assert_eq!(t.page_size, PageSize::Size2M);
        assert_eq!(t.paddr.as_u64(), va.as_u64());
    }
}

#[test]
fn mixed_sizes_cover_an_unaligned_span_exactly() {
    let phys = TestPhys::with_frames(16);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space = AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, FULL, &mut alloc, &phys)
        .unwrap();

    // 0x1F_E000 .. 0x60_3000: two 4K pages, two 2M pages, three 4K pages
    let stats = space
        .map(
            &mut alloc,
            PhysicalAddress::new(0x1F_E000),
            VirtualAddress::new(0x1F_E000),
            0x40_5000,
            MapFlags::READ_WRITE,
        )
        .unwrap();
    assert_eq!(stats.leaves_4k, 5);
    assert_eq!(stats.leaves_2m, 2);

    assert!(space.translate(VirtualAddress::new(0x1F_D000)).is_none());
    assert!(space.translate(VirtualAddress::new(0x60_3000)).is_none());
    assert_eq!(
        space.translate(VirtualAddress::new(0x60_2FFF)).map(|t| t.paddr.as_u64()),
        Some(0x60_2FFF)
    );
}

#[test]
fn mapping_twice_changes_nothing() {
    let phys = TestPhys::with_frames(32);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space = AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, FULL, &mut alloc, &phys)
        .unwrap();

    let request = |alloc: &mut RegionFrameAlloc<'_>| {
        space.map(
            alloc,
            PhysicalAddress::new(0x1F_F000),
            VirtualAddress::new(0xFFFF_8000_001F_F000),
            0x20_3000,
            MapFlags::READ_WRITE,
        )
    };

    request(&mut alloc).unwrap();
    let mut once = Vec::new();
    phys.dump::<X86_64>(space.root(), 4, &mut once);

    let again = request(&mut alloc).unwrap();
    let mut twice = Vec::new();
    phys.dump::<X86_64>(space.root(), 4, &mut twice);

    assert_eq!(again.tables, 0);
    assert_eq!(once, twice);
}

#[test]
fn misaligned_arguments_are_rejected() {
    let phys = TestPhys::with_frames(8);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space = AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, FULL, &mut alloc, &phys)
        .unwrap();

    for (pa, va, len) in [(0x1800, 0x1000, 0x1000), (0x1000, 0x1010, 0x1000), (0x1000, 0x1000, 0x800)] {
        assert_eq!(
            space.map(
                &mut alloc,
                PhysicalAddress::new(pa),
                VirtualAddress::new(va),
                len,
                MapFlags::READ
            ),
            Err(MapError::Misaligned {
                paddr: PhysicalAddress::new(pa),
                vaddr: VirtualAddress::new(va),
                length: len
            })
        );
    }

    // nothing was allocated beyond the root
    assert_eq!(alloc.frames(), 1);
}

#[test]
fn non_canonical_ranges_are_rejected() {
    let phys = TestPhys::with_frames(8);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space = AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, FULL, &mut alloc, &phys)
        .unwrap();

    let hole = space.map(
        &mut alloc,
        PhysicalAddress::zero(),
        VirtualAddress::new(0x0000_8000_0000_0000),
        0x1000,
        MapFlags::READ,
    );
    assert!(matches!(hole, Err(MapError::NonCanonical { va_bits: 48, .. })));

    let crossing = space.map(
        &mut alloc,
        PhysicalAddress::zero(),
        VirtualAddress::new(0x0000_7FFF_FFFF_F000),
        0x2000,
        MapFlags::READ,
    );
    assert!(matches!(crossing, Err(MapError::NonCanonical { .. })));
}

#[test]
fn large_leaf_and_table_never_replace_each_other() {
    let phys = TestPhys::with_frames(16);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space = AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, FULL, &mut alloc, &phys)
        .unwrap();

    space
        .map(
            &mut alloc,
            PhysicalAddress::new(0x20_0000),
            VirtualAddress::new(0x20_0000),
            0x20_0000,
            MapFlags::READ_WRITE,
        )
        .unwrap();
    assert_eq!(
        space.map(
            &mut alloc,
            PhysicalAddress::new(0x9000),
            VirtualAddress::new(0x20_1000),
            0x1000,
            MapFlags::READ
        ),
        Err(MapError::IncompatibleMapping {
            vaddr: VirtualAddress::new(0x20_1000),
            level: 2
        })
    );

    space
        .map(
            &mut alloc,
            PhysicalAddress::new(0x40_0000),
            VirtualAddress::new(0x40_0000),
            0x1000,
            MapFlags::READ,
        )
        .unwrap();
    assert_eq!(
        space.map(
            &mut alloc,
            PhysicalAddress::new(0x40_0000),
            VirtualAddress::new(0x40_0000),
            0x20_0000,
            MapFlags::READ
        ),
        Err(MapError::IncompatibleMapping {
            vaddr: VirtualAddress::new(0x40_0000),
            level: 2
        })
    );
}

#[test]
fn exhausted_allocator_reports_out_of_memory() {
    let phys = TestPhys::with_frames(3);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space = AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, FULL, &mut alloc, &phys)
        .unwrap();

    // root plus one more frame; the PD cannot be allocated
    let err = space
        .map(
            &mut alloc,
            PhysicalAddress::zero(),
            VirtualAddress::zero(),
            0x20_0000,
            MapFlags::READ,
        )
        .unwrap_err();
    assert_eq!(err, MapError::OutOfMemory { level: 2 });
    assert!(alloc.take_error().is_some());
}

#[test]
fn without_nx_support_the_bit_is_omitted() {
    let phys = TestPhys::with_frames(8);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space = AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, NO_NX, &mut alloc, &phys)
        .unwrap();

    space
        .map(
            &mut alloc,
            PhysicalAddress::new(0x3000),
            VirtualAddress::new(0x3000),
            0x1000,
            MapFlags::READ_WRITE,
        )
        .unwrap();

    let mut entries = Vec::new();
    phys.dump::<X86_64>(space.root(), 4, &mut entries);
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|&(_, _, raw)| raw >> 63 == 0));
}

#[test]
fn five_level_walk_uses_the_extra_level() {
    let phys = TestPhys::with_frames(16);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let features = CpuFeatures::new(true, true, true);
    let space =
        AddressSpace::<_, X86_64>::create(PagingMode::x86_64(&features), features, &mut alloc, &phys)
            .unwrap();
    assert_eq!(space.mode().levels(), 5);

    let va = VirtualAddress::new(0xFF00_0000_0000_0000);
    let stats = space
        .map(&mut alloc, PhysicalAddress::new(0x7000), va, 0x1000, MapFlags::READ)
        .unwrap();
    assert_eq!(stats.tables, 4);
    assert!(entry(&phys, space.root(), 256).present());
    assert_eq!(space.translate(va).map(|t| t.paddr.as_u64()), Some(0x7000));

    // the 4-level kernel half sits under another top-level slot
    assert!(space.translate(VirtualAddress::new(0xFFFF_8000_0000_0000)).is_none());
}

#[test]
fn split_layout_sends_halves_to_their_own_root() {
    let phys = TestPhys::with_frames(16);
    let mut map = phys.region_map();
    let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
    let space =
        AddressSpace::<_, Aarch64>::create(PagingMode::AARCH64_4K_48BIT, FULL, &mut alloc, &phys)
            .unwrap();
    let upper = space.upper_root().unwrap();
    assert_ne!(upper, space.root());

    space
        .map(
            &mut alloc,
            PhysicalAddress::new(0x4000_0000),
            VirtualAddress::new(0x4000_0000),
            0x20_0000,
            MapFlags::READ_EXECUTE,
        )
        .unwrap();
    space
        .map(
            &mut alloc,
            PhysicalAddress::new(0x4000_0000),
            VirtualAddress::new(0xFFFF_8000_4000_0000),
            0x20_0000,
            MapFlags::READ_WRITE,
        )
        .unwrap();

    assert_eq!(phys.table(space.root()).iter_used().count(), 1);
    assert_eq!(phys.table(upper).iter_used().count(), 1);

    let low = space.translate(VirtualAddress::new(0x4000_1000)).unwrap();
    assert_eq!(low.page_size, PageSize::Size2M);
    assert!(!low.writable && !low.no_execute);

    let high = space
        .translate(VirtualAddress::new(0xFFFF_8000_4000_1000))
        .unwrap();
    assert_eq!(high.paddr.as_u64(), 0x4000_1000);
    assert!(high.writable && high.no_execute);
}

#[test]
fn table_frames_are_tracked_in_the_region_map() {
    let phys = TestPhys::with_frames(16);
    let mut map = phys.region_map();
    {
        let mut alloc = RegionFrameAlloc::with_area(&mut map, phys.area());
        let space =
            AddressSpace::<_, X86_64>::create(PagingMode::X86_64_4LEVEL, FULL, &mut alloc, &phys)
                .unwrap();
        space
            .map(
                &mut alloc,
                PhysicalAddress::new(0x1000),
                VirtualAddress::new(0x1000),
                0x1000,
                MapFlags::READ,
            )
            .unwrap();
    }

    assert_eq!(map.bytes_of(RegionKind::Allocated), 4 * 0x1000);
    assert!(map.is_well_formed());
}
