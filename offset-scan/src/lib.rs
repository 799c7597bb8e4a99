// Activate some of the Rust 2024 lints to make the future migration easier.
#![warn(if_let_rescope)]
#![warn(keyword_idents_2024)]
#![warn(rust_2024_incompatible_pat)]
#![warn(tail_expr_drop_order)]
#![warn(unsafe_attr_outside_unsafe)]
#![warn(unsafe_op_in_unsafe_fn)]

//! Batched multi-offset file scanning on top of `io_uring`.
//!
//! Given one file and a set of byte offsets, [`scan_offsets`] issues one positioned read per
//! offset through a single ring, waits for all of them (individual reads may fail without failing
//! the batch) and counts marker bytes in every returned chunk.

pub mod availability;
pub mod error;
#[cfg(target_os = "linux")]
mod io_uring;
pub mod memory;
pub mod reader;
#[cfg(target_os = "linux")]
mod region;
pub mod request;
pub mod scanner;

pub use {
    error::ScanError,
    reader::{
        scan_offsets, BatchScan, OffsetScanner, OffsetScannerBuilder, SlotOutcome, SlotStatus,
        MAX_OFFSETS,
    },
    request::SlotIndex,
};

/// Alias for file offsets and sizes - since files can exceed 4GB, use 64-bits
pub type FileSize = u64;

/// Single IO performed on a filesystem can never exceed 32-bits,
/// this also constrains possible chunk sizes that are used for IO operations.
pub type IoSize = u32;

/// Selects how the ring is set up and drained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Plain ring: raw descriptor and buffer pointers, one `submit` call and one completion
    /// awaited at a time.
    #[default]
    Baseline,
    /// Kernel side submission polling, registered file and buffers, submit-and-wait for the
    /// whole batch and completions drained in peeked batches.
    Optimized,
}
