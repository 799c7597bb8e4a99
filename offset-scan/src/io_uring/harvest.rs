#![allow(clippy::arithmetic_side_effects)]

use {
    super::ring::OffsetRing,
    crate::{
        error::ScanError,
        region::OutputRegion,
        request::{ReadResult, ReadStatus, SlotIndex},
        ScanMode,
    },
    io_uring::cqueue,
    smallvec::SmallVec,
    std::io,
};

// Completions copied out of the ring per peek, larger bursts are simply drained in more rounds.
const PEEK_BATCH_LEN: usize = 64;

type CompletionBatch = SmallVec<[cqueue::Entry; PEEK_BATCH_LEN]>;

impl<'a> OffsetRing<'a> {
    /// Consume exactly `expected` completions, passing each one's result to `on_result`.
    ///
    /// `on_result` gets the output region along with the result, the slot of the result is no
    /// longer written by the kernel at that point. Failed reads are logged and passed on as well,
    /// they don't stop the harvest.
    pub fn harvest(
        &mut self,
        expected: usize,
        mut on_result: impl FnMut(&OutputRegion<'a>, ReadResult),
    ) -> Result<(), ScanError> {
        let mut seen = vec![false; expected];
        let mut harvested = 0;
        while harvested < expected {
            let batch = self.peek_completions(expected - harvested);
            if batch.is_empty() {
                self.wait_for_completion()
                    .map_err(ScanError::WaitFailed)?;
                continue;
            }
            // Entries in `batch` were already consumed from the completion queue.
            self.in_flight = self.in_flight.saturating_sub(batch.len());
            harvested += batch.len();

            for cqe in batch {
                let result = Self::read_result(cqe.user_data(), cqe.result(), &mut seen);
                if let ReadStatus::Failed(errno) = result.status {
                    log::warn!(
                        "read {} failed: {}",
                        result.index,
                        io::Error::from_raw_os_error(errno)
                    );
                }
                on_result(&self.region, result);
            }
        }
        log::debug!("harvested {harvested} completions");
        Ok(())
    }

    /// Take ready completions without blocking: one at a time in baseline mode, up to
    /// `PEEK_BATCH_LEN` in optimized mode.
    fn peek_completions(&mut self, remaining: usize) -> CompletionBatch {
        let limit = match self.mode {
            ScanMode::Baseline => 1,
            ScanMode::Optimized => PEEK_BATCH_LEN,
        };
        // Dropping the completion queue advances its head, which hands the entries back to the
        // kernel.
        self.ring
            .completion()
            .take(limit.min(remaining))
            .collect()
    }

    /// Map a completion back to its request, every tag must be seen exactly once.
    fn read_result(user_data: u64, res: i32, seen: &mut [bool]) -> ReadResult {
        let index = SlotIndex::from_user_data(user_data)
            .filter(|index| index.as_usize() < seen.len())
            .unwrap_or_else(|| panic!("completion with unknown tag {user_data}"));
        let seen = &mut seen[index.as_usize()];
        assert!(!*seen, "duplicate completion for read {index}");
        *seen = true;
        ReadResult::from_raw(index, res)
    }
}
