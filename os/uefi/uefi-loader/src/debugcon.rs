//! # QEMU debug console
//!
//! Byte-wide writes to an `isa-debugcon` I/O port end up on the host:
//!
//! ```bash
//! qemu-system-x86_64 ... \
//!   -debugcon file:debug.log -global isa-debugcon.iobase=0x402
//! ```
//!
//! Works before and after `ExitBootServices` and is a harmless no-op on
//! hardware without the device.

use core::fmt::{self, Write};

/// An `isa-debugcon` port.
#[derive(Debug, Copy, Clone)]
pub struct DebugCon {
    port: u16,
}

impl DebugCon {
    /// The port OVMF logs to.
    pub const OVMF: Self = Self { port: 0x402 };

    #[inline]
    fn put(self, byte: u8) {
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") self.port,
                in("al") byte,
                options(nomem, nostack, preserves_flags)
            );
        }
    }

    /// Best-effort formatted output.
    pub fn write(mut self, args: fmt::Arguments<'_>) {
        let _ = self.write_fmt(args);
    }
}

impl Write for DebugCon {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            self.put(b);
        }
        Ok(())
    }
}
