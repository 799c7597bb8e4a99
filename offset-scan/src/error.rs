use {crate::memory::AllocError, std::io};

/// Failures that abort a whole scan.
///
/// A read that fails for a single offset is not an error of the scan, it is reported in the
/// slot's [`crate::SlotStatus`] instead. Every variant is returned only after all ring resources
/// acquired so far are released.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    #[error("io_uring is not supported on this host")]
    Unsupported,

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    #[error("failed to open file: {0}")]
    OpenFailed(#[source] io::Error),

    #[error("io_uring setup failed: {0}")]
    RingInitFailed(#[source] io::Error),

    #[error("failed to register file or buffers in io_uring: {0}")]
    RegistrationFailed(#[source] io::Error),

    #[error("failed to submit reads: {0}")]
    SubmissionFailed(#[source] io::Error),

    #[error("failed to wait for completions: {0}")]
    WaitFailed(#[source] io::Error),

    #[error("failed to allocate output region: {0}")]
    Alloc(#[from] AllocError),
}

impl ScanError {
    /// The kernel error code (errno) behind this failure, if there is one.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::OpenFailed(err)
            | Self::RingInitFailed(err)
            | Self::RegistrationFailed(err)
            | Self::SubmissionFailed(err)
            | Self::WaitFailed(err) => err.raw_os_error(),
            Self::Unsupported => Some(libc::ENOSYS),
            Self::InvalidInput(_) => Some(libc::EINVAL),
            Self::Alloc(_) => Some(libc::ENOMEM),
        }
    }
}

impl From<ScanError> for io::Error {
    fn from(error: ScanError) -> io::Error {
        match error {
            ScanError::Unsupported => io::Error::new(io::ErrorKind::Unsupported, error),
            ScanError::InvalidInput(msg) => io::Error::new(io::ErrorKind::InvalidInput, msg),
            ScanError::OpenFailed(err)
            | ScanError::RingInitFailed(err)
            | ScanError::RegistrationFailed(err)
            | ScanError::SubmissionFailed(err)
            | ScanError::WaitFailed(err) => err,
            ScanError::Alloc(err) => io::Error::new(err.kind(), err),
        }
    }
}
