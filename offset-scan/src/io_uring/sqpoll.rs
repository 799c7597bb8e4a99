use {crate::ScanMode, std::time::Duration};

/// How long the kernel submission polling thread spins without new entries before it sleeps.
pub(crate) const DEFAULT_SQPOLL_IDLE_WAIT_TIME: Duration = Duration::from_millis(50);

/// Return new io-uring builder set up for `mode`.
///
/// In optimized mode the ring gets a kernel thread that drains the submission queue, so pushing
/// entries doesn't need an `io_uring_enter` syscall per batch.
pub(super) fn io_uring_builder_for(mode: ScanMode, sqpoll_idle: Duration) -> io_uring::Builder {
    let mut builder = io_uring::IoUring::builder();
    if mode == ScanMode::Optimized {
        let idle_ms = u32::try_from(sqpoll_idle.as_millis()).unwrap_or(u32::MAX);
        builder.setup_sqpoll(idle_ms);
    }
    builder
}
