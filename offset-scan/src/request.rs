use {
    crate::{FileSize, IoSize},
    std::fmt,
};

/// Position of an offset in the scanned batch.
///
/// Used as the `io_uring` correlation tag (`user_data`) and as the index of the output region
/// slot that the read fills. It's never a byte offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u32);

impl SlotIndex {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Recover the index from a completion's `user_data`, `None` if it can't be one of ours.
    pub fn from_user_data(user_data: u64) -> Option<Self> {
        u32::try_from(user_data).ok().map(Self)
    }
}

impl From<SlotIndex> for u64 {
    fn from(index: SlotIndex) -> u64 {
        index.0 as u64
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single positioned read of `len` bytes at `offset` into slot `index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadRequest {
    pub index: SlotIndex,
    pub offset: FileSize,
    pub len: IoSize,
}

impl ReadRequest {
    /// One request per offset, each tagged with its position in `offsets`.
    ///
    /// Caller must have validated that offsets are non-negative and fit `u32` count.
    pub(crate) fn batch(offsets: &[FileSize], len: IoSize) -> Vec<ReadRequest> {
        offsets
            .iter()
            .zip(0u32..)
            .map(|(&offset, index)| ReadRequest {
                index: SlotIndex(index),
                offset,
                len,
            })
            .collect()
    }
}

/// Outcome of a single read as reported by its completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadStatus {
    /// The kernel filled `bytes_read` bytes of the slot (0 at or past EOF).
    Read { bytes_read: IoSize },
    /// The read failed with the given errno, the slot content is undefined.
    Failed(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadResult {
    pub index: SlotIndex,
    pub status: ReadStatus,
}

impl ReadResult {
    /// Interpret a raw completion result, negative values are `-errno`.
    pub fn from_raw(index: SlotIndex, res: i32) -> Self {
        let status = match IoSize::try_from(res) {
            Ok(bytes_read) => ReadStatus::Read { bytes_read },
            Err(_) => ReadStatus::Failed(res.saturating_neg()),
        };
        Self { index, status }
    }
}
