use pvgpu_shmem::ShmemError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("shmem_size must be at least {min} bytes, got {actual}")]
    ShmemTooSmall { min: u64, actual: u64 },

    #[error("failed to map shared memory: {0}")]
    Map(#[source] std::io::Error),

    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend sent a malformed frame: {0}")]
    Protocol(#[from] pvgpu_protocol::error::ProtocolError),

    #[error("backend rejected the protocol handshake (version {ours:#010x})")]
    HandshakeRejected { ours: u32 },

    #[error("backend handshake did not advertise FEATURE_D3D11 (bitmap {backend_features:#x})")]
    HandshakeMissingD3d11 { backend_features: u64 },

    #[error("backend disconnected")]
    BackendDisconnected,

    #[error(transparent)]
    Shmem(#[from] ShmemError),
}
