#![allow(clippy::arithmetic_side_effects)]

use {
    crate::{error::ScanError, request::SlotIndex, IoSize},
    std::{marker::PhantomData, ptr::NonNull, slice},
};

// Registered buffers can't exceed 1GiB each, so large regions are registered in several pieces.
const FIXED_BUFFER_LEN: usize = 1024 * 1024 * 1024;

/// Output memory of a scan, split in `num_slots` disjoint `chunk_size` long slots.
///
/// Slot `i` is written by the kernel for the read tagged with `SlotIndex(i)`. While a read is in
/// flight its slot belongs to the kernel; once the completion is harvested the slot can be viewed
/// with [`OutputRegion::filled`].
///
/// Stored `ptr` is an unsafe (no lifetime tracking) equivalent of the `&'a mut [u8]` the region
/// was created from, the lifetime is kept by the `PhantomData`.
#[derive(Debug)]
pub(crate) struct OutputRegion<'a> {
    ptr: NonNull<u8>,
    chunk_size: usize,
    num_slots: usize,
    _buf: PhantomData<&'a mut [u8]>,
}

impl<'a> OutputRegion<'a> {
    /// Partition the prefix of `buffer` into `num_slots` slots of `chunk_size` bytes.
    pub fn new(
        buffer: &'a mut [u8],
        chunk_size: IoSize,
        num_slots: usize,
    ) -> Result<Self, ScanError> {
        if chunk_size == 0 {
            return Err(ScanError::InvalidInput("chunk size must be positive"));
        }
        if num_slots == 0 {
            return Err(ScanError::InvalidInput("at least one offset is required"));
        }
        let required = (chunk_size as usize)
            .checked_mul(num_slots)
            .ok_or(ScanError::InvalidInput("output region size overflows"))?;
        if buffer.len() < required {
            return Err(ScanError::InvalidInput(
                "output region is smaller than chunk size * number of offsets",
            ));
        }
        Ok(Self {
            ptr: NonNull::from(buffer).cast(),
            chunk_size: chunk_size as usize,
            num_slots,
            _buf: PhantomData,
        })
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Start of the slot, handed to the kernel as read destination.
    ///
    /// Returning the pointer is safe, writing through it is only sound while no view of the same
    /// slot obtained from [`OutputRegion::filled`] is alive.
    pub(crate) fn slot_ptr(&self, index: SlotIndex) -> *mut u8 {
        assert!(index.as_usize() < self.num_slots, "slot {index} out of range");
        // Safety: index is in bounds, so the result stays within the borrowed buffer
        unsafe { self.ptr.as_ptr().add(index.as_usize() * self.chunk_size) }
    }

    /// View of the first `len` bytes of the slot.
    ///
    /// Safety: the caller must guarantee that no read into this slot is in flight, i.e. its
    /// completion was already harvested (or it was never submitted).
    pub unsafe fn filled(&self, index: SlotIndex, len: usize) -> &[u8] {
        assert!(len <= self.chunk_size, "view longer than a slot");
        // Safety: pointer and len are within the slot, the caller guarantees no concurrent writer
        unsafe { slice::from_raw_parts(self.slot_ptr(index), len) }
    }

    /// Region with arbitrary geometry that doesn't need to fit `buffer`.
    ///
    /// Only valid for inspecting slot layout, slots must never be read or written.
    #[cfg(test)]
    pub(crate) fn new_unchecked_for_tests(
        buffer: &'a mut [u8],
        chunk_size: usize,
        num_slots: usize,
    ) -> Self {
        Self {
            ptr: NonNull::from(buffer).cast(),
            chunk_size,
            num_slots,
            _buf: PhantomData,
        }
    }

    /// Number of slots that fit in a single registered buffer, 0 if a slot is too large.
    pub(crate) fn slots_per_registered_buffer(&self) -> usize {
        FIXED_BUFFER_LEN / self.chunk_size
    }

    /// The index of the registered buffer that contains the slot. See `registered_iovecs()`.
    pub(crate) fn registered_buf_index(&self, index: SlotIndex) -> u16 {
        let slots_per_buf = self.slots_per_registered_buffer();
        debug_assert_ne!(slots_per_buf, 0);
        (index.as_usize() / slots_per_buf) as u16
    }

    /// Split the region into pieces for buffer registration.
    ///
    /// Every piece holds a whole number of slots, so no slot straddles two registered buffers.
    pub(crate) fn registered_iovecs(&self) -> Result<Vec<libc::iovec>, ScanError> {
        let slots_per_buf = self.slots_per_registered_buffer();
        if slots_per_buf == 0 {
            return Err(ScanError::InvalidInput(
                "chunk size is too large for a registered buffer",
            ));
        }
        if self.num_slots.div_ceil(slots_per_buf) > u16::MAX as usize {
            return Err(ScanError::InvalidInput(
                "output region too large to register in io_uring",
            ));
        }
        Ok((0..self.num_slots)
            .step_by(slots_per_buf)
            .map(|first_slot| {
                let slots = slots_per_buf.min(self.num_slots - first_slot);
                libc::iovec {
                    iov_base: self.slot_ptr(SlotIndex::new(first_slot as u32)) as _,
                    iov_len: slots * self.chunk_size,
                }
            })
            .collect())
    }
}
