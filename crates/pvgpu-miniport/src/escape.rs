//! Dispatches a decoded escape call to the corresponding [`Miniport`]
//! operation and encodes the response (`spec.md` §4.4). The real
//! `D3DDDICB_ESCAPE`-shaped framing (the `{u32 escape_code, u32 status}`
//! header wrapping each payload) is the UMD's concern; this module starts
//! from the already-demultiplexed escape code and payload bytes.

use pvgpu_protocol::escape::{
    AllocHeapRequest, AllocHeapResponse, EscapeCode, FreeHeapRequest, SetDisplayModeRequest,
    SubmitCommandsRequest, WaitFenceRequest, WaitFenceResponse,
};
use pvgpu_protocol::wire::WireStruct;

use crate::device::Miniport;
use crate::error::MiniportError;

/// Decodes `payload` per `code`, invokes the matching [`Miniport`] method,
/// and encodes the result. `ring_payload` supplies the command bytes for
/// `SUBMIT_COMMANDS` (staged out-of-band by the caller, analogous to the
/// heap range the real escape call points into).
pub fn dispatch(
    miniport: &Miniport,
    code: EscapeCode,
    payload: &[u8],
    ring_payload: Option<&[u8]>,
) -> Result<Vec<u8>, MiniportError> {
    match code {
        EscapeCode::GetShmemInfo => Ok(miniport.shmem_info().to_bytes()),

        EscapeCode::AllocHeap => {
            let req = AllocHeapRequest::read_le(payload)?;
            let response = match miniport.alloc_heap(req.size, req.align) {
                Ok(offset) => AllocHeapResponse { offset },
                Err(MiniportError::Shmem(pvgpu_shmem::ShmemError::HeapExhausted { .. })) => {
                    AllocHeapResponse::FAILED
                }
                Err(err) => return Err(err),
            };
            Ok(response.to_bytes())
        }

        EscapeCode::FreeHeap => {
            let req = FreeHeapRequest::read_le(payload)?;
            miniport.free_heap(req.offset)?;
            Ok(Vec::new())
        }

        EscapeCode::SubmitCommands => {
            let req = SubmitCommandsRequest::read_le(payload)?;
            let bytes = ring_payload.ok_or(MiniportError::MissingRingPayload)?;
            debug_assert_eq!(bytes.len(), req.byte_count as usize);
            let producer_ptr = miniport.submit_commands(bytes, req.fence_value)?;
            Ok(producer_ptr.to_le_bytes().to_vec())
        }

        EscapeCode::WaitFence => {
            let req = WaitFenceRequest::read_le(payload)?;
            match miniport.wait_fence(req.fence_value, req.timeout_ms) {
                Ok(_completed) => Ok(WaitFenceResponse::new(true).to_bytes()),
                Err(MiniportError::Timeout { .. }) => Ok(WaitFenceResponse::new(false).to_bytes()),
                Err(err) => Err(err),
            }
        }

        EscapeCode::GetCaps => Ok(miniport.get_caps().to_bytes()),

        EscapeCode::RingDoorbell => {
            miniport.ring_doorbell();
            Ok(Vec::new())
        }

        EscapeCode::SetDisplayMode => {
            let req = SetDisplayModeRequest::read_le(payload)?;
            miniport.set_display_mode(req)?;
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar0::Bar0Port;
    use pvgpu_protocol::consts::MIN_SHMEM_SIZE;
    use pvgpu_shmem::region::VecRegion;
    use std::sync::Arc;

    struct NoopBar0;
    impl Bar0Port for NoopBar0 {
        fn read(&self, _offset: u64) -> u32 {
            0
        }
        fn write(&self, _offset: u64, _val: u32) {}
    }

    fn attached() -> Miniport {
        let region: Arc<dyn pvgpu_shmem::region::SharedRegion> = Arc::new(VecRegion::new(MIN_SHMEM_SIZE as usize));
        {
            let control = unsafe { &*(region.as_ptr() as *const pvgpu_protocol::control_region::ControlRegion) };
            control.init(4096, 0x0100_0000, 4096 + 0x0100_0000, MIN_SHMEM_SIZE as u32 - 4096 - 0x0100_0000);
        }
        Miniport::attach(region, Arc::new(NoopBar0)).unwrap()
    }

    #[test]
    fn alloc_heap_roundtrip_via_escape() {
        let mp = attached();
        let req = AllocHeapRequest { size: 4096, align: 4096 };
        let resp_bytes = dispatch(&mp, EscapeCode::AllocHeap, &req.to_bytes(), None).unwrap();
        let resp = AllocHeapResponse::read_le(&resp_bytes).unwrap();
        assert!(!resp.is_failure());

        let free_req = FreeHeapRequest { offset: resp.offset };
        dispatch(&mp, EscapeCode::FreeHeap, &free_req.to_bytes(), None).unwrap();
    }

    #[test]
    fn get_shmem_info_reflects_layout() {
        let mp = attached();
        let bytes = dispatch(&mp, EscapeCode::GetShmemInfo, &[], None).unwrap();
        let info = pvgpu_protocol::escape::ShmemInfo::read_le(&bytes).unwrap();
        assert_eq!(info.ring_offset, 4096);
        assert_eq!(info.ring_size, 0x0100_0000);
    }
}
