use bitfield_struct::bitfield;

/// Access permissions requested for a mapping.
///
/// Neither supported entry format can express write-only or execute-only
/// pages, so a mapping without `read` is still readable; the builder only
/// warns about it.
#[bitfield(u8)]
#[derive(Eq, PartialEq)]
pub struct MapFlags {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    #[bits(5)]
    __: u8,
}

impl MapFlags {
    /// Read-only data.
    pub const READ: Self = Self::new().with_read(true);

    /// Read/write data.
    pub const READ_WRITE: Self = Self::new().with_read(true).with_write(true);

    /// Code.
    pub const READ_EXECUTE: Self = Self::new().with_read(true).with_execute(true);

    /// Everything allowed; used for the transitional identity map.
    pub const ALL: Self = Self::new()
        .with_read(true)
        .with_write(true)
        .with_execute(true);
}
