//! # Address Space
//!
//! One translation tree (or a pair of them for split layouts) under
//! construction.
//!
//! ## Highlights
//!
//! - [`AddressSpace::create`] allocates and zeroes the root table(s).
//! - [`AddressSpace::map`] covers a physical range with the largest leaves
//!   possible, allocating intermediate tables on demand.
//! - [`AddressSpace::translate`] walks the tree like the MMU would.
//! - `AddressSpace::load` installs the root(s) into the processor.
//!
//! ## Design
//!
//! - The walk is written once against [`PagingMode`] data and a
//!   [`TableFormat`]; neither depth nor entry layout is hard-coded.
//! - Leaves are always rewritten. Mapping the same range twice therefore
//!   yields the same tables as mapping it once.
//! - A table is never replaced by a leaf or vice versa; both directions are
//!   reported as [`MapError::IncompatibleMapping`].
//!
//! ## Safety
//!
//! - The provided [`PhysMapper`] must yield **writable** references to table
//!   frames.
//! - Changing an address space after loading it requires TLB maintenance,
//!   which the loader never needs.

use crate::format::{Entry, TableFormat};
use crate::mode::{PagingMode, RootLayout};
use crate::{FrameAlloc, MapError, MapFlags, PageTable, PhysMapper};
use boot_addresses::{PageSize, PhysicalAddress, VirtualAddress};
use boot_cpu::CpuFeatures;
use core::marker::PhantomData;
use core::ops::AddAssign;
use log::{debug, trace, warn};

/// Handle to one address space under construction.
pub struct AddressSpace<'m, M: PhysMapper, F: TableFormat> {
    mode: PagingMode,
    features: CpuFeatures,
    /// Root for the whole space, or for the lower half in split layouts.
    lower: PhysicalAddress,
    /// Upper-half root in split layouts.
    upper: Option<PhysicalAddress>,
    mapper: &'m M,
    _format: PhantomData<F>,
}

/// What a [`map`](AddressSpace::map) call wrote.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct MapStats {
    pub leaves_4k: u64,
    pub leaves_2m: u64,
    pub leaves_1g: u64,
    /// Intermediate tables allocated.
    pub tables: u64,
}

impl MapStats {
    #[must_use]
    pub const fn leaves(&self, size: PageSize) -> u64 {
        match size {
            PageSize::Size4K => self.leaves_4k,
            PageSize::Size2M => self.leaves_2m,
            PageSize::Size1G => self.leaves_1g,
        }
    }

    const fn record(&mut self, size: PageSize) {
        match size {
            PageSize::Size4K => self.leaves_4k += 1,
            PageSize::Size2M => self.leaves_2m += 1,
            PageSize::Size1G => self.leaves_1g += 1,
        }
    }
}

impl AddAssign for MapStats {
    fn add_assign(&mut self, rhs: Self) {
        self.leaves_4k += rhs.leaves_4k;
        self.leaves_2m += rhs.leaves_2m;
        self.leaves_1g += rhs.leaves_1g;
        self.tables += rhs.tables;
    }
}

/// Result of walking the tables for one virtual address.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Translation {
    /// Physical address the virtual address resolves to.
    pub paddr: PhysicalAddress,
    /// Size of the leaf that maps it.
    pub page_size: PageSize,
    /// Leaf permissions.
    pub writable: bool,
    pub no_execute: bool,
}

impl<'m, M: PhysMapper, F: TableFormat> AddressSpace<'m, M, F> {
    /// Allocate and zero the root table(s) of a fresh address space.
    ///
    /// # Errors
    /// [`MapError::OutOfMemory`] if `alloc` has no frame for a root.
    pub fn create<A: FrameAlloc>(
        mode: PagingMode,
        features: CpuFeatures,
        alloc: &mut A,
        mapper: &'m M,
    ) -> Result<Self, MapError> {
        let new_root = |alloc: &mut A| -> Result<PhysicalAddress, MapError> {
            let frame = alloc.alloc_4k().ok_or(MapError::OutOfMemory {
                level: mode.levels(),
            })?;
            unsafe { mapper.phys_to_mut::<PageTable>(frame) }.zero();
            Ok(frame)
        };

        let lower = new_root(alloc)?;
        let upper = match mode.layout() {
            RootLayout::Single => None,
            RootLayout::Split => Some(new_root(alloc)?),
        };

        debug!(
            "created {} address space with {} levels, root at {lower}{}",
            mode.name(),
            mode.levels(),
            if upper.is_some() { " (split)" } else { "" }
        );
        if !features.no_execute {
            warn!("no-execute is unavailable, mappings in this address space stay executable");
        }

        Ok(Self {
            mode,
            features,
            lower,
            upper,
            mapper,
            _format: PhantomData,
        })
    }

    #[inline]
    #[must_use]
    pub const fn mode(&self) -> &PagingMode {
        &self.mode
    }

    #[inline]
    #[must_use]
    pub const fn features(&self) -> &CpuFeatures {
        &self.features
    }

    /// Root table, or the lower-half root of a split layout.
    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalAddress {
        self.lower
    }

    /// Upper-half root of a split layout.
    #[inline]
    #[must_use]
    pub const fn upper_root(&self) -> Option<PhysicalAddress> {
        self.upper
    }

    /// Root table that translates `va`.
    #[inline]
    fn root_for(&self, va: VirtualAddress) -> PhysicalAddress {
        match self.upper {
            Some(upper) if va.is_upper_half() => upper,
            _ => self.lower,
        }
    }

    /// Borrow the table in frame `pa`.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    fn table_mut(&self, pa: PhysicalAddress) -> &mut PageTable {
        unsafe { self.mapper.phys_to_mut::<PageTable>(pa) }
    }

    /// Map `[paddr, paddr + length)` at `vaddr` with `flags`.
    ///
    /// # Errors
    /// - [`MapError::Misaligned`] if any argument is not 4 KiB-aligned.
    /// - [`MapError::AddressOverflow`] if either range wraps.
    /// - [`MapError::NonCanonical`] if the virtual range leaves a canonical half.
    /// - [`MapError::OutOfMemory`] if a table frame cannot be allocated.
    /// - [`MapError::IncompatibleMapping`] on a conflicting existing leaf or table.
    pub fn map<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        paddr: PhysicalAddress,
        vaddr: VirtualAddress,
        length: u64,
        flags: MapFlags,
    ) -> Result<MapStats, MapError> {
        let base = PageSize::Size4K;
        if !paddr.is_aligned(base) || !vaddr.is_aligned(base) || !base.aligns(length) {
            return Err(MapError::Misaligned {
                paddr,
                vaddr,
                length,
            });
        }

        let mut stats = MapStats::default();
        if length == 0 {
            return Ok(stats);
        }

        let overflow = MapError::AddressOverflow {
            paddr,
            vaddr,
            length,
        };
        paddr.checked_add(length - 1).ok_or(overflow)?;
        let last = vaddr.checked_add(length - 1).ok_or(overflow)?;

        let va_bits = self.mode.va_bits();
        if !vaddr.is_canonical(va_bits)
            || !last.is_canonical(va_bits)
            || vaddr.is_upper_half() != last.is_upper_half()
        {
            return Err(MapError::NonCanonical {
                vaddr,
                length,
                va_bits,
            });
        }

        if !flags.read() {
            warn!("mapping {vaddr} / {length:#x} without read permission, it stays readable");
        }

        trace!("map {paddr} -> {vaddr} / {length:#x} {flags:?}");

        let mut offset = 0;
        while offset < length {
            let pa = paddr + offset;
            let va = vaddr + offset;
            let size =
                self.mode
                    .select_page_size(&self.features, pa.as_u64(), va.as_u64(), length - offset);

            self.map_page(alloc, pa, va, size, flags, &mut stats)?;
            offset += size.bytes();
        }

        Ok(stats)
    }

    /// Write one leaf of `size`, creating the table chain above it.
    fn map_page<A: FrameAlloc>(
        &self,
        alloc: &mut A,
        pa: PhysicalAddress,
        va: VirtualAddress,
        size: PageSize,
        flags: MapFlags,
        stats: &mut MapStats,
    ) -> Result<(), MapError> {
        let leaf_level = self.mode.leaf_level(size).unwrap_or(1);
        let no_execute = !flags.execute() && self.features.no_execute;

        let mut table = self.root_for(va);
        for level in (leaf_level + 1..=self.mode.levels()).rev() {
            let index = va.table_index(level);
            let tbl = self.table_mut(table);

            table = match F::decode(tbl.get(index), level) {
                Entry::Absent => {
                    let frame = alloc
                        .alloc_4k()
                        .ok_or(MapError::OutOfMemory { level: level - 1 })?;
                    self.table_mut(frame).zero();
                    tbl.set(index, F::encode_table(frame, level, true, no_execute));
                    stats.tables += 1;
                    frame
                }
                Entry::Table(link) => {
                    let writable = link.writable || flags.write();
                    let link_no_execute = link.no_execute && no_execute;
                    if writable != link.writable || link_no_execute != link.no_execute {
                        tbl.set(
                            index,
                            F::encode_table(link.address, level, writable, link_no_execute),
                        );
                    }
                    link.address
                }
                Entry::Leaf(_) => return Err(MapError::IncompatibleMapping { vaddr: va, level }),
            };
        }

        let tbl = self.table_mut(table);
        let index = va.table_index(leaf_level);
        if leaf_level > 1 && matches!(F::decode(tbl.get(index), leaf_level), Entry::Table(_)) {
            return Err(MapError::IncompatibleMapping {
                vaddr: va,
                level: leaf_level,
            });
        }

        tbl.set(
            index,
            F::encode_leaf(pa, leaf_level, flags.write(), no_execute),
        );
        stats.record(size);
        Ok(())
    }

    /// Translate `va` by walking the tables.
    ///
    /// Handles large leaves by adding the in-page offset of the leaf's size.
    #[must_use]
    pub fn translate(&self, va: VirtualAddress) -> Option<Translation> {
        if !va.is_canonical(self.mode.va_bits()) {
            return None;
        }

        let mut table = self.root_for(va);
        for level in (1..=self.mode.levels()).rev() {
            match F::decode(self.table_mut(table).get(va.table_index(level)), level) {
                Entry::Absent => return None,
                Entry::Table(link) => table = link.address,
                Entry::Leaf(leaf) => {
                    let page_size = self.mode.size_at(level)?;
                    return Some(Translation {
                        paddr: leaf.address + va.page_offset(page_size),
                        page_size,
                        writable: leaf.writable,
                        no_execute: leaf.no_execute,
                    });
                }
            }
        }
        None
    }
}

impl<M: PhysMapper> AddressSpace<'_, M, crate::X86_64> {
    /// Load CR3 with this address space's root.
    ///
    /// # Safety
    /// Irreversible for the running code: the instruction stream, the stack
    /// and all data touched afterwards must be mapped by this address space,
    /// and `EFER.NXE` must be enabled if any entry carries no-execute.
    #[cfg(all(feature = "asm", target_arch = "x86_64"))]
    pub unsafe fn load(&self) {
        use boot_cpu::StoreRegisterUnsafe;
        use boot_cpu::cr3::Cr3;

        debug!("loading CR3 with {}", self.lower);
        unsafe { Cr3::from_root(self.lower).store_unsafe() };
    }
}

impl<M: PhysMapper> AddressSpace<'_, M, crate::Aarch64> {
    /// Load `TTBR0_EL1`/`TTBR1_EL1` with this address space's roots.
    ///
    /// # Safety
    /// Irreversible for the running code: everything touched afterwards must
    /// be mapped, and `MAIR_EL1`/`TCR_EL1` must match the descriptors.
    #[cfg(all(feature = "asm", target_arch = "aarch64"))]
    pub unsafe fn load(&self) {
        use boot_cpu::ttbr::{Ttbr, store_roots};

        let upper = self.upper.unwrap_or(self.lower);
        debug!("loading TTBR0 with {} and TTBR1 with {upper}", self.lower);
        unsafe { store_roots(Ttbr::from_root(self.lower), Ttbr::from_root(upper)) };
    }
}
