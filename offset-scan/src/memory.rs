use std::{
    alloc::{alloc_zeroed, dealloc, Layout, LayoutError},
    io,
    ops::{Deref, DerefMut},
    ptr::NonNull,
    slice,
};

#[derive(thiserror::Error, Debug)]
pub enum AllocError {
    #[error("can't allocate an empty output region")]
    ZeroSize,

    #[error("invalid output region layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("out of memory allocating {len} bytes")]
    OutOfMemory { len: usize },
}

impl AllocError {
    pub fn kind(&self) -> io::ErrorKind {
        match self {
            Self::ZeroSize | Self::Layout(_) => io::ErrorKind::InvalidInput,
            Self::OutOfMemory { .. } => io::ErrorKind::OutOfMemory,
        }
    }
}

/// Zeroed output region of a single scan, aligned to the system page size.
///
/// The region lives only as long as one scan, so it is taken from the global allocator with
/// exactly the requested length.
pub struct PageAlignedMemory {
    ptr: NonNull<u8>,
    layout: Layout,
}

impl PageAlignedMemory {
    pub fn zeroed(len: usize) -> Result<Self, AllocError> {
        if len == 0 {
            return Err(AllocError::ZeroSize);
        }
        let layout = Layout::from_size_align(len, page_size())?;
        // Safety: layout size is nonzero
        let ptr = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(ptr).ok_or(AllocError::OutOfMemory { len })?;
        Ok(Self { ptr, layout })
    }
}

impl Drop for PageAlignedMemory {
    fn drop(&mut self) {
        // Safety: ptr was returned by `alloc_zeroed` for this exact layout
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

impl Deref for PageAlignedMemory {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // Safety: ptr is valid for `layout.size()` initialized bytes while `self` lives
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.layout.size()) }
    }
}

impl DerefMut for PageAlignedMemory {
    fn deref_mut(&mut self) -> &mut [u8] {
        // Safety: as above, and uniquely borrowed through `self`
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.layout.size()) }
    }
}

fn page_size() -> usize {
    // Safety: just a libc wrapper
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}
