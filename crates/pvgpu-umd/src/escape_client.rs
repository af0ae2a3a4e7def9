//! Abstracts the `D3DDDICB_ESCAPE` call boundary between the user-mode
//! driver and the kernel miniport (`spec.md` §4.4, §4.5), the same way
//! `pvgpu-miniport`'s `Bar0Port` abstracts the kernel/hardware boundary one
//! layer down — this crate never talks to a `Miniport` directly so it can
//! be host-tested against a stub, and so a real driver build can swap in
//! whatever escape-call plumbing the OS actually exposes.

use std::sync::Arc;

use pvgpu_protocol::escape::EscapeCode;

use crate::error::UmdError;

pub trait EscapeClient: Send + Sync {
    /// Issues one escape call and returns its raw response payload.
    /// `ring_payload` carries the out-of-band command bytes for
    /// `SUBMIT_COMMANDS`, mirroring `pvgpu_miniport::escape::dispatch`.
    fn call(&self, code: EscapeCode, payload: &[u8], ring_payload: Option<&[u8]>) -> Result<Vec<u8>, UmdError>;

    /// Relaxed, no-escape peek at `host_fence_completed` (`spec.md` §4.5
    /// present pacing fast path).
    fn fence_completed_hint(&self) -> u64;
}

/// The real transport: escape calls become direct in-process calls into a
/// [`pvgpu_miniport::Miniport`]. A real driver would instead cross the
/// `D3DDDICB_ESCAPE` user/kernel boundary, but the call shape is identical.
pub struct MiniportEscapeClient {
    miniport: Arc<pvgpu_miniport::Miniport>,
}

impl MiniportEscapeClient {
    pub fn new(miniport: Arc<pvgpu_miniport::Miniport>) -> Self {
        Self { miniport }
    }
}

impl EscapeClient for MiniportEscapeClient {
    fn call(&self, code: EscapeCode, payload: &[u8], ring_payload: Option<&[u8]>) -> Result<Vec<u8>, UmdError> {
        Ok(pvgpu_miniport::escape::dispatch(&self.miniport, code, payload, ring_payload)?)
    }

    fn fence_completed_hint(&self) -> u64 {
        self.miniport.fence_completed_hint()
    }
}
