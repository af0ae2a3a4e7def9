//! Error taxonomy (`spec.md` §7).
//!
//! `PvgpuErrorCode` is the wire-stable numeric code carried in
//! `ControlRegion::error_code` and in escape-call status words. `ProtocolError`
//! is the Rust-level error returned by decode/encode helpers in this crate;
//! it is deliberately a separate type (mirroring the teacher's split between
//! a protocol-level code and a local `thiserror` enum, e.g.
//! `CommandProcessorError` vs. the wire `AerogpuStatus`) since not every
//! local failure (a truncated buffer, a bad alignment argument) has a
//! meaningful wire representation.

use thiserror::Error;

/// Numeric values are stabilized by the protocol: do not renumber.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PvgpuErrorCode {
    Success = 0x0000,
    InvalidCommand = 0x0001,
    ResourceNotFound = 0x0002,
    OutOfMemory = 0x0003,
    ShaderCompile = 0x0004,
    DeviceLost = 0x0005,
    InvalidParameter = 0x0006,
    UnsupportedFormat = 0x0007,
    BackendDisconnected = 0x0008,
    RingFull = 0x0009,
    Timeout = 0x000A,
    HeapExhausted = 0x000B,
    Internal = 0x000C,
    Unknown = 0xFFFF,
}

impl PvgpuErrorCode {
    pub const fn from_u32(v: u32) -> Self {
        match v {
            0x0000 => Self::Success,
            0x0001 => Self::InvalidCommand,
            0x0002 => Self::ResourceNotFound,
            0x0003 => Self::OutOfMemory,
            0x0004 => Self::ShaderCompile,
            0x0005 => Self::DeviceLost,
            0x0006 => Self::InvalidParameter,
            0x0007 => Self::UnsupportedFormat,
            0x0008 => Self::BackendDisconnected,
            0x0009 => Self::RingFull,
            0x000A => Self::Timeout,
            0x000B => Self::HeapExhausted,
            0x000C => Self::Internal,
            _ => Self::Unknown,
        }
    }

    pub const fn as_u32(self) -> u32 {
        self as u32
    }

    /// Whether this kind is expected to recover without guest intervention
    /// (`spec.md` §7 propagation policy: `RING_FULL` and short `TIMEOUT`s
    /// are handled locally by retrying).
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::RingFull | Self::Timeout)
    }

    /// Whether this kind is sticky device-lost state (`spec.md` §7: device-lost
    /// is sticky until a reset).
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::DeviceLost | Self::BackendDisconnected)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("buffer too small: need {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    #[error("bad magic: expected {expected:#010x}, got {actual:#010x}")]
    BadMagic { expected: u32, actual: u32 },

    #[error("unsupported protocol version {actual:#010x} (expected major {expected_major})")]
    VersionMismatch { expected_major: u32, actual: u32 },

    #[error("command_size {0} is not 16-byte aligned")]
    Misaligned(u32),

    #[error("command_size {declared} too small for header ({min})")]
    CommandTooSmall { declared: u32, min: u32 },

    #[error("value {value} out of range for field {field}")]
    OutOfRange { field: &'static str, value: u64 },

    #[error("field {field} must be a power of two, got {value}")]
    NotPowerOfTwo { field: &'static str, value: u64 },

    #[error("variable-length field is missing its zero terminator")]
    MissingNulTerminator,

    #[error("variable-length field is not valid UTF-8")]
    InvalidUtf8,
}
