//! Process wide check whether the running kernel provides `io_uring`.
//!
//! Non-Linux targets never do. On Linux the kernel is probed once by setting up a minimal ring,
//! which fails when `io_uring` is compiled out, disabled by `kernel.io_uring_disabled` or blocked
//! by a seccomp filter. The answer is cached for the lifetime of the process.

use {crate::error::ScanError, std::sync::OnceLock};

static IO_URING_SUPPORTED: OnceLock<bool> = OnceLock::new();

/// Returns whether scans can run on this host.
pub fn is_supported() -> bool {
    *IO_URING_SUPPORTED.get_or_init(probe)
}

/// Fails with [`ScanError::Unsupported`] unless scans can run on this host.
pub fn ensure_supported() -> Result<(), ScanError> {
    check(is_supported())
}

pub(crate) fn check(supported: bool) -> Result<(), ScanError> {
    if supported {
        Ok(())
    } else {
        Err(ScanError::Unsupported)
    }
}

#[cfg(target_os = "linux")]
fn probe() -> bool {
    match io_uring::IoUring::new(1) {
        Ok(_ring) => true,
        Err(err) => {
            log::warn!("io_uring is unavailable: {err}");
            false
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn probe() -> bool {
    false
}
