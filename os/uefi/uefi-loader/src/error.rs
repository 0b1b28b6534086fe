use boot_core::BootError;
use boot_pmm::PmmError;
use boot_vmem::MapError;
use uefi::Status;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("{call} failed with {status:?}")]
    Firmware { call: &'static str, status: Status },
    #[error(transparent)]
    Boot(#[from] BootError),
}

impl LoaderError {
    pub const fn firmware(call: &'static str, status: Status) -> Self {
        Self::Firmware { call, status }
    }
}

impl From<PmmError> for LoaderError {
    fn from(e: PmmError) -> Self {
        Self::Boot(e.into())
    }
}

impl From<MapError> for LoaderError {
    fn from(e: MapError) -> Self {
        Self::Boot(e.into())
    }
}
