/// Entries per table at every level.
pub const ENTRIES: usize = 512;

/// One 4 KiB translation table of raw 64-bit entries.
///
/// The entry encoding belongs to a [`TableFormat`](crate::TableFormat); the
/// table itself only stores bits.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [u64; ENTRIES],
}

impl PageTable {
    /// Clear all entries (mark not-present).
    #[inline]
    pub fn zero(&mut self) {
        self.entries.fill(0);
    }

    #[inline]
    #[must_use]
    pub const fn get(&self, index: usize) -> u64 {
        self.entries[index]
    }

    #[inline]
    pub const fn set(&mut self, index: usize, raw: u64) {
        self.entries[index] = raw;
    }

    /// Indices and values of all non-zero entries.
    pub fn iter_used(&self) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .filter(|&(_, raw)| raw != 0)
    }
}

const _: () = assert!(size_of::<PageTable>() == 4096);
