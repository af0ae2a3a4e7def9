//! The miniport's escape interface (`spec.md` §4.4): the fixed set of
//! out-of-band requests the user-mode driver issues through
//! `D3DDDICB_ESCAPE`-shaped plumbing, distinct from the command ring which
//! only carries GPU work.

use crate::error::ProtocolError;
use crate::wire::{get_u32, get_u64, need, put_u32, put_u64, WireStruct};

/// Escape codes (`spec.md` §4.4).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EscapeCode {
    GetShmemInfo = 1,
    AllocHeap = 2,
    FreeHeap = 3,
    SubmitCommands = 4,
    WaitFence = 5,
    GetCaps = 6,
    RingDoorbell = 7,
    SetDisplayMode = 8,
}

impl EscapeCode {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => Self::GetShmemInfo,
            2 => Self::AllocHeap,
            3 => Self::FreeHeap,
            4 => Self::SubmitCommands,
            5 => Self::WaitFence,
            6 => Self::GetCaps,
            7 => Self::RingDoorbell,
            8 => Self::SetDisplayMode,
            _ => return None,
        })
    }
}

/// Output of `GET_SHMEM_INFO`: where the ring and heap live within the
/// mapped shared-memory BAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShmemInfo {
    pub total_size: u64,
    pub ring_offset: u32,
    pub ring_size: u32,
    pub heap_offset: u32,
    pub heap_size: u32,
}

impl WireStruct for ShmemInfo {
    const SIZE_BYTES: usize = 24;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u64(out, 0, self.total_size);
        put_u32(out, 8, self.ring_offset);
        put_u32(out, 12, self.ring_size);
        put_u32(out, 16, self.heap_offset);
        put_u32(out, 20, self.heap_size);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            total_size: get_u64(buf, 0),
            ring_offset: get_u32(buf, 8),
            ring_size: get_u32(buf, 12),
            heap_offset: get_u32(buf, 16),
            heap_size: get_u32(buf, 20),
        })
    }
}

/// `ALLOC_HEAP` request/response (`spec.md` §3 bitmap heap allocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocHeapRequest {
    pub size: u32,
    pub align: u32,
}

impl WireStruct for AllocHeapRequest {
    const SIZE_BYTES: usize = 8;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u32(out, 0, self.size);
        put_u32(out, 4, self.align);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            size: get_u32(buf, 0),
            align: get_u32(buf, 4),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocHeapResponse {
    /// Byte offset within the heap region, or `u32::MAX` on exhaustion.
    pub offset: u32,
}

impl WireStruct for AllocHeapResponse {
    const SIZE_BYTES: usize = 4;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u32(out, 0, self.offset);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            offset: get_u32(buf, 0),
        })
    }
}

impl AllocHeapResponse {
    pub const FAILED: Self = Self { offset: u32::MAX };

    pub fn is_failure(self) -> bool {
        self.offset == u32::MAX
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeHeapRequest {
    pub offset: u32,
}

impl WireStruct for FreeHeapRequest {
    const SIZE_BYTES: usize = 4;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u32(out, 0, self.offset);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            offset: get_u32(buf, 0),
        })
    }
}

/// `SUBMIT_COMMANDS`: tells the miniport how many bytes the UMD has staged
/// starting at the current producer pointer, so it can advance the ring and
/// ring the doorbell (`spec.md` §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitCommandsRequest {
    pub byte_count: u32,
    pub fence_value: u64,
}

impl WireStruct for SubmitCommandsRequest {
    const SIZE_BYTES: usize = 16;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u32(out, 0, self.byte_count);
        put_u64(out, 8, self.fence_value);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            byte_count: get_u32(buf, 0),
            fence_value: get_u64(buf, 8),
        })
    }
}

/// `WAIT_FENCE` request: block (subject to `timeout_ms`, 0 = infinite) until
/// `host_fence_completed >= fence_value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitFenceRequest {
    pub fence_value: u64,
    pub timeout_ms: u32,
}

impl WireStruct for WaitFenceRequest {
    const SIZE_BYTES: usize = 16;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u64(out, 0, self.fence_value);
        put_u32(out, 8, self.timeout_ms);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            fence_value: get_u64(buf, 0),
            timeout_ms: get_u32(buf, 8),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitFenceResponse {
    pub completed: u32,
}

impl WireStruct for WaitFenceResponse {
    const SIZE_BYTES: usize = 4;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u32(out, 0, self.completed);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            completed: get_u32(buf, 0),
        })
    }
}

impl WaitFenceResponse {
    pub fn new(completed: bool) -> Self {
        Self {
            completed: completed as u32,
        }
    }

    pub fn is_completed(self) -> bool {
        self.completed != 0
    }
}

/// `GET_CAPS` response: the static capability surface reported to the UMD
/// (`spec.md` §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapsResponse {
    pub features: u64,
    pub max_texture_dimension: u32,
    pub max_render_targets: u32,
    pub max_vertex_buffers: u32,
    pub max_constant_buffers: u32,
}

impl WireStruct for CapsResponse {
    const SIZE_BYTES: usize = 24;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u64(out, 0, self.features);
        put_u32(out, 8, self.max_texture_dimension);
        put_u32(out, 12, self.max_render_targets);
        put_u32(out, 16, self.max_vertex_buffers);
        put_u32(out, 20, self.max_constant_buffers);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            features: get_u64(buf, 0),
            max_texture_dimension: get_u32(buf, 8),
            max_render_targets: get_u32(buf, 12),
            max_vertex_buffers: get_u32(buf, 16),
            max_constant_buffers: get_u32(buf, 20),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetDisplayModeRequest {
    pub width: u32,
    pub height: u32,
    pub refresh: u32,
    pub format: u32,
}

impl WireStruct for SetDisplayModeRequest {
    const SIZE_BYTES: usize = 16;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u32(out, 0, self.width);
        put_u32(out, 4, self.height);
        put_u32(out, 8, self.refresh);
        put_u32(out, 12, self.format);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            width: get_u32(buf, 0),
            height: get_u32(buf, 4),
            refresh: get_u32(buf, 8),
            format: get_u32(buf, 12),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shmem_info_roundtrip() {
        let info = ShmemInfo {
            total_size: 1 << 28,
            ring_offset: 4096,
            ring_size: 0x0100_0000,
            heap_offset: 4096 + 0x0100_0000,
            heap_size: 1 << 20,
        };
        let bytes = info.to_bytes();
        assert_eq!(ShmemInfo::read_le(&bytes).unwrap(), info);
    }

    #[test]
    fn alloc_heap_failure_sentinel() {
        assert!(AllocHeapResponse::FAILED.is_failure());
        assert!(!AllocHeapResponse { offset: 0 }.is_failure());
    }

    #[test]
    fn wait_fence_response_completed_flag() {
        assert!(WaitFenceResponse::new(true).is_completed());
        assert!(!WaitFenceResponse::new(false).is_completed());
    }

    #[test]
    fn escape_code_roundtrip() {
        for v in 1..=8u32 {
            assert_eq!(EscapeCode::from_u32(v).unwrap() as u32, v);
        }
        assert!(EscapeCode::from_u32(0).is_none());
        assert!(EscapeCode::from_u32(9).is_none());
    }
}
