use {
    super::{ring::OffsetRing, REGISTERED_FILE_INDEX},
    crate::{error::ScanError, request::ReadRequest, ScanMode},
    io_uring::{opcode, squeue, types},
    std::{io, os::fd::AsRawFd},
};

impl OffsetRing<'_> {
    /// Push one positioned read per request and submit the whole batch to the kernel.
    ///
    /// The batch is pushed atomically: when the submission queue can't hold all of it nothing is
    /// queued. In optimized mode this also waits until every read completed.
    pub fn submit(&mut self, requests: &[ReadRequest]) -> Result<(), ScanError> {
        let entries = requests
            .iter()
            .map(|request| self.read_entry(request))
            .collect::<Vec<_>>();

        {
            let mut submission = self.ring.submission();
            // Safety: every entry points into its own slot of `self.region`, which outlives the
            // ring and isn't viewed until the completion of that entry is harvested.
            unsafe { submission.push_multiple(&entries) }.map_err(|_| {
                // Same errno the kernel reports when it can't take more submissions.
                ScanError::SubmissionFailed(io::Error::from_raw_os_error(libc::EBUSY))
            })?;
        }
        self.in_flight = self.in_flight.saturating_add(entries.len());

        let submitted = match self.mode {
            ScanMode::Baseline => self.ring.submit(),
            ScanMode::Optimized => match self.ring.submit_and_wait(entries.len()) {
                // Entries were handed to the kernel already, harvesting will wait for the rest.
                Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(0),
                res => res,
            },
        };
        let submitted = submitted.map_err(ScanError::SubmissionFailed)?;
        log::debug!(
            "submitted {} reads ({submitted} in last enter call)",
            entries.len()
        );
        Ok(())
    }

    fn read_entry(&self, request: &ReadRequest) -> squeue::Entry {
        let buf = self.region.slot_ptr(request.index);
        let entry = match self.mode {
            ScanMode::Baseline => {
                opcode::Read::new(types::Fd(self.file.as_raw_fd()), buf, request.len)
                    .offset(request.offset)
                    .build()
            }
            ScanMode::Optimized => opcode::ReadFixed::new(
                types::Fixed(REGISTERED_FILE_INDEX),
                buf,
                request.len,
                self.region.registered_buf_index(request.index),
            )
            .offset(request.offset)
            .build(),
        };
        entry.user_data(request.index.into())
    }
}
