use pvgpu_protocol::error::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShmemError {
    #[error("command ring is full: {requested} bytes requested, {available} available")]
    RingFull { requested: usize, available: usize },

    #[error("command of {len} bytes exceeds ring capacity {capacity}")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("heap allocation of {size} bytes (align {align}) failed: no free run of blocks")]
    HeapExhausted { size: u32, align: u32 },

    #[error("heap offset {offset} does not correspond to a tracked allocation")]
    UnknownAllocation { offset: u32 },

    #[error("ring size {0} must be a multiple of 16")]
    NotAligned(u32),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
