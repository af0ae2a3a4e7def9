use pvgpu_miniport::MiniportError;
use pvgpu_protocol::error::ProtocolError;
use pvgpu_shmem::ShmemError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UmdError {
    #[error(transparent)]
    Miniport(#[from] MiniportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("unknown resource handle {0}")]
    ResourceNotFound(u32),

    #[error("map/fence wait timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u32 },

    #[error("heap exhausted allocating {size} bytes for a map")]
    HeapExhausted { size: u32 },

    #[error("{field} must be nonzero")]
    InvalidParameter { field: &'static str },
}

impl UmdError {
    /// Transient ring backpressure the staging flush loop retries on rather
    /// than propagating (`spec.md` §4.5 `FlushCommandBuffer`).
    pub(crate) fn is_ring_full(&self) -> bool {
        matches!(
            self,
            UmdError::Miniport(MiniportError::Shmem(ShmemError::RingFull { .. }))
        )
    }
}
