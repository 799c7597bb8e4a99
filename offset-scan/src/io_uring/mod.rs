//! Ring side of a scan: setup and teardown ([`ring`]), batch submission ([`submit`]) and
//! completion harvesting ([`harvest`]).

mod harvest;
mod ring;
mod sqpoll;
mod submit;

pub(crate) use {
    ring::{OffsetRing, RingConfig},
    sqpoll::DEFAULT_SQPOLL_IDLE_WAIT_TIME,
};

/// Index of the scanned file in the ring's registered files table.
const REGISTERED_FILE_INDEX: u32 = 0;
