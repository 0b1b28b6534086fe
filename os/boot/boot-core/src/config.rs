use boot_pmm::{Area, DEFAULT_CAPACITY};
use log::LevelFilter;

/// Base of the higher-half direct map.
pub const HHDM_OFFSET: u64 = 0xFFFF_8000_0000_0000;

/// Physical memory below this bound is direct mapped whether or not the
/// firmware reports it.
pub const HHDM_MIN_SIZE: u64 = 4 << 30;

/// Boot-time knobs with the defaults the loader runs with.
///
/// ```rust
/// # use boot_core::BootConfig;
/// let config = BootConfig::default()
///     .with_handoff_stack_pages(32)
///     .with_hhdm_min_size(1 << 30);
/// assert_eq!(config.handoff_stack_pages, 32);
/// ```
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BootConfig {
    /// Virtual base of the direct map.
    pub hhdm_offset: u64,
    /// Size of the unconditional low part of the direct map.
    pub hhdm_min_size: u64,
    /// Pages reserved for the stack handed to the next stage.
    pub handoff_stack_pages: u64,
    /// Area page-table frames are allocated from.
    pub table_area: Area,
    /// Maximum number of region map entries.
    pub region_capacity: usize,
    /// Conventional memory left to the firmware while its services are alive.
    pub firmware_reserve_pages: u64,
    pub log_level: LevelFilter,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            hhdm_offset: HHDM_OFFSET,
            hhdm_min_size: HHDM_MIN_SIZE,
            handoff_stack_pages: 16,
            table_area: Area::STANDARD,
            region_capacity: DEFAULT_CAPACITY,
            firmware_reserve_pages: 64,
            log_level: LevelFilter::Debug,
        }
    }
}

impl BootConfig {
    #[must_use]
    pub const fn with_hhdm_offset(mut self, offset: u64) -> Self {
        self.hhdm_offset = offset;
        self
    }

    #[must_use]
    pub const fn with_hhdm_min_size(mut self, size: u64) -> Self {
        self.hhdm_min_size = size;
        self
    }

    #[must_use]
    pub const fn with_handoff_stack_pages(mut self, pages: u64) -> Self {
        self.handoff_stack_pages = pages;
        self
    }

    #[must_use]
    pub const fn with_table_area(mut self, area: Area) -> Self {
        self.table_area = area;
        self
    }

    #[must_use]
    pub const fn with_region_capacity(mut self, capacity: usize) -> Self {
        self.region_capacity = capacity;
        self
    }

    #[must_use]
    pub const fn with_firmware_reserve_pages(mut self, pages: u64) -> Self {
        self.firmware_reserve_pages = pages;
        self
    }

    #[must_use]
    pub const fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }
}
