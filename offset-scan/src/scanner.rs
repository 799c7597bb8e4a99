/// Byte counted in every chunk unless configured otherwise.
pub const DEFAULT_MARKER: u8 = b',';

/// Counts occurrences of a single marker byte in read chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerScanner {
    marker: u8,
}

impl Default for MarkerScanner {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER)
    }
}

impl MarkerScanner {
    pub const fn new(marker: u8) -> Self {
        Self { marker }
    }

    pub const fn marker(&self) -> u8 {
        self.marker
    }

    /// Single pass over `chunk`, which must be only the bytes actually read.
    pub fn count(&self, chunk: &[u8]) -> u64 {
        chunk.iter().filter(|&&byte| byte == self.marker).count() as u64
    }
}
