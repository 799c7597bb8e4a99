#![allow(clippy::arithmetic_side_effects)]

use {
    super::sqpoll,
    crate::{error::ScanError, region::OutputRegion, ScanMode},
    io_uring::IoUring,
    std::{
        fs::{File, OpenOptions},
        io,
        os::fd::AsRawFd,
        path::Path,
        time::Duration,
    },
};

/// Tuning of the ring created for a single scan.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RingConfig {
    pub mode: ScanMode,
    pub sqpoll_idle: Duration,
    /// Limit of bounded io-wq kernel workers, `None` keeps the kernel default.
    pub max_iowq_workers: Option<u32>,
}

/// `io_uring` instance owning the scanned file and the output region of one scan.
///
/// The ring is sized for exactly one batch (one entry per slot of the region) and never reused.
/// Dropping it releases everything in order: wait for in-flight reads, unregister buffers,
/// unregister file, close the file, tear down the ring.
pub(crate) struct OffsetRing<'a> {
    // Note: fields drop in declaration order, so the file is closed before the ring is torn down.
    pub(super) file: File,
    pub(super) ring: IoUring,
    pub(super) region: OutputRegion<'a>,
    pub(super) mode: ScanMode,
    /// Number of reads pushed into the ring whose completion wasn't consumed yet.
    pub(super) in_flight: usize,
    registered_buffers: bool,
    registered_file: bool,
}

impl<'a> OffsetRing<'a> {
    /// Create the ring, open `path` read-only and, in optimized mode, register both the file and
    /// `region` in the ring.
    ///
    /// On failure every resource acquired so far is released before returning.
    pub fn open(
        path: &Path,
        region: OutputRegion<'a>,
        config: &RingConfig,
    ) -> Result<Self, ScanError> {
        let capacity = u32::try_from(region.num_slots())
            .map_err(|_| ScanError::InvalidInput("too many offsets for a single ring"))?;
        // Computed upfront, so that invalid slot geometry is reported before opening anything.
        let iovecs = match config.mode {
            ScanMode::Baseline => None,
            ScanMode::Optimized => Some(region.registered_iovecs()?),
        };

        let ring = sqpoll::io_uring_builder_for(config.mode, config.sqpoll_idle)
            .build(capacity)
            .map_err(ScanError::RingInitFailed)?;
        if let Some(max_workers) = config.max_iowq_workers {
            // Maximum number of spawned [bounded IO, unbounded IO] kernel threads, reads are
            // bounded work so the second limit is irrelevant (0 leaves it unchanged).
            ring.submitter()
                .register_iowq_max_workers(&mut [max_workers, 0])
                .map_err(ScanError::RingInitFailed)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(ScanError::OpenFailed)?;
        log::debug!(
            "opened {mode:?} ring with {capacity} entries for {}",
            path.display(),
            mode = config.mode
        );

        let mut ring = Self {
            file,
            ring,
            region,
            mode: config.mode,
            in_flight: 0,
            registered_buffers: false,
            registered_file: false,
        };
        if let Some(iovecs) = iovecs {
            // On error `ring` is dropped here, which unwinds the registrations done so far.
            ring.register(&iovecs)?;
        }
        Ok(ring)
    }

    fn register(&mut self, iovecs: &[libc::iovec]) -> Result<(), ScanError> {
        // Safety: iovecs point into `self.region`, whose memory is borrowed for 'a and so outlives
        // the ring. Buffers are unregistered in `drop` before the borrow ends.
        unsafe { self.ring.submitter().register_buffers(iovecs) }
            .map_err(ScanError::RegistrationFailed)?;
        self.registered_buffers = true;

        self.ring
            .submitter()
            .register_files(&[self.file.as_raw_fd()])
            .map_err(ScanError::RegistrationFailed)?;
        self.registered_file = true;
        Ok(())
    }

    /// Block until at least one completion is available.
    ///
    /// Also submits any entries still sitting in the submission queue.
    pub(super) fn wait_for_completion(&self) -> io::Result<()> {
        submit_and_wait_one(&self.ring)
    }

    /// Consume completions of all reads still owned by the kernel.
    ///
    /// Only does work when a scan is aborted between submission and full harvest.
    fn drain_in_flight(&mut self) {
        let ring = &mut self.ring;
        drain_completions(&mut self.in_flight, || {
            let reaped = ring.completion().count();
            if reaped == 0 {
                submit_and_wait_one(ring)?;
            }
            Ok(reaped)
        });
    }
}

fn submit_and_wait_one(ring: &IoUring) -> io::Result<()> {
    loop {
        match ring.submit_and_wait(1) {
            Ok(_) => return Ok(()),
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}

/// Call `reap` until `in_flight` completions were consumed.
///
/// Panics if `reap` fails: reads that are still in flight may write into the output region at any
/// time, so it can't be handed back to its owner.
fn drain_completions(in_flight: &mut usize, mut reap: impl FnMut() -> io::Result<usize>) {
    while *in_flight > 0 {
        match reap() {
            Ok(reaped) => *in_flight = in_flight.saturating_sub(reaped),
            Err(err) => panic!("lost track of {} in-flight reads: {err}", *in_flight),
        }
    }
}

impl Drop for OffsetRing<'_> {
    fn drop(&mut self) {
        self.drain_in_flight();
        if self.registered_buffers {
            if let Err(err) = self.ring.submitter().unregister_buffers() {
                log::error!("failed to unregister io_uring buffers: {err}");
            }
        }
        if self.registered_file {
            if let Err(err) = self.ring.submitter().unregister_files() {
                log::error!("failed to unregister io_uring file: {err}");
            }
        }
        log::debug!("tearing down {:?} ring", self.mode);
        // `file` and then `ring` are dropped (closed) right after this.
    }
}
