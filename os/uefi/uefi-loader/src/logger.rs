use core::sync::atomic::{AtomicBool, Ordering};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Mirrors every record to the QEMU debug console and, while boot services
/// are alive, to the UEFI text console.
pub struct LoaderLogger {
    boot_services: AtomicBool,
}

static LOGGER: LoaderLogger = LoaderLogger {
    boot_services: AtomicBool::new(true),
};

/// Install the logger. Call this once during early init.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Stop using the UEFI console; call right before `ExitBootServices`.
pub fn exit_boot_services() {
    LOGGER.boot_services.store(false, Ordering::Release);
}

impl Log for LoaderLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        #[cfg(all(feature = "qemu", target_arch = "x86_64"))]
        crate::debugcon::DebugCon::OVMF.write(format_args!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        ));

        if self.boot_services.load(Ordering::Acquire) {
            uefi::println!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}
