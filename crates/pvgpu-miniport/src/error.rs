use pvgpu_protocol::control_region::Status;
use pvgpu_protocol::error::{ProtocolError, PvgpuErrorCode};
use pvgpu_shmem::ShmemError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MiniportError {
    #[error("bad magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic { expected: u32, actual: u32 },

    #[error("unsupported protocol version {actual:#010x} (expected major {expected_major})")]
    VersionMismatch { expected_major: u32, actual: u32 },

    #[error(transparent)]
    Shmem(#[from] ShmemError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("device removed, status={status:?}")]
    DeviceRemoved { status: Status },

    #[error("device reported error {code:?}")]
    DeviceError { code: PvgpuErrorCode },

    #[error("wait_fence timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u32 },

    #[error("display mode rejected: width/height/refresh must be nonzero")]
    InvalidDisplayMode,

    #[error("SUBMIT_COMMANDS escape carried no ring payload")]
    MissingRingPayload,
}
