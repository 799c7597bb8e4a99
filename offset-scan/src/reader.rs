#![allow(clippy::arithmetic_side_effects)]

use {
    crate::{
        availability,
        error::ScanError,
        memory::PageAlignedMemory,
        scanner::{MarkerScanner, DEFAULT_MARKER},
        FileSize, IoSize, ScanMode, SlotIndex,
    },
    std::{io, path::Path, time::Duration},
};
#[cfg(target_os = "linux")]
use crate::{
    io_uring::{OffsetRing, RingConfig},
    region::OutputRegion,
    request::{ReadRequest, ReadStatus},
};

#[cfg(target_os = "linux")]
use crate::io_uring::DEFAULT_SQPOLL_IDLE_WAIT_TIME;
#[cfg(not(target_os = "linux"))]
const DEFAULT_SQPOLL_IDLE_WAIT_TIME: Duration = Duration::from_millis(50);

/// Largest number of offsets in one scan, the kernel limit for entries of a single ring.
///
/// Larger batches have to be split by the caller.
pub const MAX_OFFSETS: usize = 32768;

/// Read `chunk_size` bytes at every offset of the file at `path` and return the total number of
/// `,` bytes in what was read.
///
/// Reads that fail individually (or hit EOF) contribute nothing but don't fail the call. Use
/// [`OffsetScanner`] for per-offset outcomes, a different marker or a caller provided buffer.
pub fn scan_offsets(
    path: impl AsRef<Path>,
    offsets: &[i64],
    chunk_size: IoSize,
    mode: ScanMode,
) -> Result<u64, ScanError> {
    OffsetScannerBuilder::new()
        .mode(mode)
        .build()
        .scan(path, offsets, chunk_size)
        .map(|scan| scan.aggregate)
}

/// Utility for building `OffsetScanner` with specified tuning options.
#[derive(Clone, Debug)]
pub struct OffsetScannerBuilder {
    mode: ScanMode,
    marker: u8,
    sqpoll_idle: Duration,
    max_iowq_workers: Option<u32>,
}

impl Default for OffsetScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OffsetScannerBuilder {
    pub fn new() -> Self {
        Self {
            mode: ScanMode::Baseline,
            marker: DEFAULT_MARKER,
            sqpoll_idle: DEFAULT_SQPOLL_IDLE_WAIT_TIME,
            max_iowq_workers: None,
        }
    }

    pub fn mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    /// Byte counted in every read chunk, `,` by default.
    pub fn marker(mut self, marker: u8) -> Self {
        self.marker = marker;
        self
    }

    /// How long the kernel polling thread stays awake without new submissions (optimized mode).
    pub fn sqpoll_idle(mut self, sqpoll_idle: Duration) -> Self {
        self.sqpoll_idle = sqpoll_idle;
        self
    }

    /// Cap the number of kernel io-wq workers servicing the reads of one scan.
    ///
    /// By default the kernel decides, which lets all reads of a batch run in parallel.
    pub fn max_iowq_workers(mut self, max_iowq_workers: Option<u32>) -> Self {
        self.max_iowq_workers = max_iowq_workers;
        self
    }

    pub fn build(self) -> OffsetScanner {
        OffsetScanner {
            mode: self.mode,
            scanner: MarkerScanner::new(self.marker),
            sqpoll_idle: self.sqpoll_idle,
            max_iowq_workers: self.max_iowq_workers,
        }
    }
}

/// Reads fixed size chunks at many offsets of one file in a single `io_uring` batch and counts
/// marker bytes in them.
///
/// Every scan creates and tears down its own ring, so one scanner can be used from many threads.
#[derive(Clone, Debug)]
pub struct OffsetScanner {
    mode: ScanMode,
    scanner: MarkerScanner,
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    sqpoll_idle: Duration,
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    max_iowq_workers: Option<u32>,
}

/// Per-offset outcome of a scan.
#[derive(Debug)]
pub struct SlotOutcome {
    pub index: SlotIndex,
    pub offset: FileSize,
    pub status: SlotStatus,
}

#[derive(Debug)]
pub enum SlotStatus {
    /// `bytes_read` bytes were read (fewer than the chunk size near EOF) and contain `markers`
    /// marker bytes.
    Scanned { bytes_read: IoSize, markers: u64 },
    /// The read failed, the slot doesn't count towards the aggregate.
    Failed(io::Error),
}

/// Result of a whole scan.
#[derive(Debug)]
pub struct BatchScan {
    /// Total number of marker bytes in all successfully read chunks.
    pub aggregate: u64,
    /// One entry per offset, in the order of the offsets.
    pub slots: Vec<SlotOutcome>,
}

impl BatchScan {
    pub fn failed(&self) -> impl Iterator<Item = &SlotOutcome> {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.status, SlotStatus::Failed(_)))
    }
}

impl OffsetScanner {
    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    /// Scan `offsets` of the file at `path` using an internally allocated output region.
    pub fn scan(
        &self,
        path: impl AsRef<Path>,
        offsets: &[i64],
        chunk_size: IoSize,
    ) -> Result<BatchScan, ScanError> {
        self.scan_if_supported(
            availability::is_supported(),
            path.as_ref(),
            offsets,
            chunk_size,
            None,
        )
    }

    /// Scan `offsets` of the file at `path`, reading into `buffer`.
    ///
    /// `buffer` must hold at least `chunk_size * offsets.len()` bytes. Afterwards the bytes read
    /// for `offsets[i]` start at `buffer[i * chunk_size]`.
    pub fn scan_into(
        &self,
        path: impl AsRef<Path>,
        offsets: &[i64],
        chunk_size: IoSize,
        buffer: &mut [u8],
    ) -> Result<BatchScan, ScanError> {
        self.scan_if_supported(
            availability::is_supported(),
            path.as_ref(),
            offsets,
            chunk_size,
            Some(buffer),
        )
    }

    /// Nothing is allocated, opened or created before both `supported` and the inputs are
    /// checked.
    fn scan_if_supported(
        &self,
        supported: bool,
        path: &Path,
        offsets: &[i64],
        chunk_size: IoSize,
        buffer: Option<&mut [u8]>,
    ) -> Result<BatchScan, ScanError> {
        availability::check(supported)?;
        let offsets = validate_offsets(offsets, chunk_size)?;
        let region_len = region_len(offsets.len(), chunk_size)?;
        match buffer {
            Some(buffer) if buffer.len() < region_len => Err(ScanError::InvalidInput(
                "output region is smaller than chunk size * number of offsets",
            )),
            Some(buffer) => self.scan_validated(path, &offsets, chunk_size, buffer),
            None => {
                let mut buffer = PageAlignedMemory::zeroed(region_len)?;
                self.scan_validated(path, &offsets, chunk_size, &mut buffer)
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn scan_validated(
        &self,
        path: &Path,
        offsets: &[FileSize],
        chunk_size: IoSize,
        buffer: &mut [u8],
    ) -> Result<BatchScan, ScanError> {
        let region = OutputRegion::new(buffer, chunk_size, offsets.len())?;
        let requests = ReadRequest::batch(offsets, chunk_size);
        let config = RingConfig {
            mode: self.mode,
            sqpoll_idle: self.sqpoll_idle,
            max_iowq_workers: self.max_iowq_workers,
        };

        // Any error from here on drops `ring`, which releases whatever it acquired.
        let mut ring = OffsetRing::open(path, region, &config)?;
        ring.submit(&requests)?;

        let mut aggregate = 0u64;
        let mut slots = Vec::with_capacity(requests.len());
        slots.resize_with(requests.len(), || None);
        ring.harvest(requests.len(), |region, result| {
            let status = match result.status {
                ReadStatus::Read { bytes_read } => {
                    // Safety: the completion was harvested, so the kernel is done with the slot.
                    let chunk = unsafe { region.filled(result.index, bytes_read as usize) };
                    let markers = self.scanner.count(chunk);
                    aggregate += markers;
                    SlotStatus::Scanned {
                        bytes_read,
                        markers,
                    }
                }
                ReadStatus::Failed(errno) => {
                    SlotStatus::Failed(io::Error::from_raw_os_error(errno))
                }
            };
            slots[result.index.as_usize()] = Some(SlotOutcome {
                index: result.index,
                offset: requests[result.index.as_usize()].offset,
                status,
            });
        })?;
        drop(ring);

        // Harvest visits every index exactly once, so no slot is left empty.
        let slots = slots.into_iter().flatten().collect::<Vec<_>>();
        debug_assert_eq!(slots.len(), requests.len());
        Ok(BatchScan { aggregate, slots })
    }

    #[cfg(not(target_os = "linux"))]
    fn scan_validated(
        &self,
        _path: &Path,
        _offsets: &[FileSize],
        _chunk_size: IoSize,
        _buffer: &mut [u8],
    ) -> Result<BatchScan, ScanError> {
        Err(ScanError::Unsupported)
    }
}

/// Check the preconditions of a scan and convert offsets to file positions.
fn validate_offsets(offsets: &[i64], chunk_size: IoSize) -> Result<Vec<FileSize>, ScanError> {
    if offsets.is_empty() {
        return Err(ScanError::InvalidInput("at least one offset is required"));
    }
    if chunk_size == 0 {
        return Err(ScanError::InvalidInput("chunk size must be positive"));
    }
    if offsets.len() > MAX_OFFSETS {
        return Err(ScanError::InvalidInput(
            "more offsets than a single ring can hold",
        ));
    }
    offsets
        .iter()
        .map(|&offset| {
            FileSize::try_from(offset).map_err(|_| ScanError::InvalidInput("negative offset"))
        })
        .collect()
}

fn region_len(num_offsets: usize, chunk_size: IoSize) -> Result<usize, ScanError> {
    (chunk_size as usize)
        .checked_mul(num_offsets)
        .ok_or(ScanError::InvalidInput("output region size overflows"))
}
