//! Per-architecture table entry encodings.
//!
//! The walker only needs the kind of an entry, its address and the two
//! permission bits it propagates. [`TableFormat`] is exactly that surface.

mod aarch64;
mod x86_64;

pub use self::aarch64::{Aarch64, Descriptor};
pub use self::x86_64::{PageEntryBits, X86_64};

use boot_addresses::PhysicalAddress;

/// Address and propagated permissions of a present entry.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EntryAttrs {
    pub address: PhysicalAddress,
    pub writable: bool,
    pub no_execute: bool,
}

/// Decoded view of one raw entry at a given level.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Entry {
    /// Not present.
    Absent,
    /// Points to a next-level table.
    Table(EntryAttrs),
    /// Terminates translation.
    Leaf(EntryAttrs),
}

/// Encoding of translation entries for one architecture.
///
/// Levels are numbered from 1 (4 KiB leaves) upwards.
pub trait TableFormat {
    /// Interpret `raw` found in a table at `level`.
    fn decode(raw: u64, level: u8) -> Entry;

    /// Entry at `level` that links to the table at `next`.
    fn encode_table(next: PhysicalAddress, level: u8, writable: bool, no_execute: bool) -> u64;

    /// Leaf entry at `level` mapping the frame at `frame`.
    fn encode_leaf(frame: PhysicalAddress, level: u8, writable: bool, no_execute: bool) -> u64;
}
