//! Backend IPC framing (`spec.md` §4.3, §6): the message protocol the
//! emulator device speaks to the out-of-process backend over a named pipe
//! (Windows) or Unix domain socket (the transport this workspace actually
//! implements, in `pvgpu-emulator`).
//!
//! Every message is an 8-byte header followed by a type-specific payload —
//! a length-prefixed framing chosen because `shmem_name` makes the
//! handshake payload variable-length.

use crate::error::ProtocolError;
use crate::wire::{get_u32, get_u64, need, put_u32, put_u64, WireStruct};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpcMessageType {
    Handshake = 1,
    HandshakeAck = 2,
    Doorbell = 3,
    Irq = 4,
    Shutdown = 5,
}

impl IpcMessageType {
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            1 => Self::Handshake,
            2 => Self::HandshakeAck,
            3 => Self::Doorbell,
            4 => Self::Irq,
            5 => Self::Shutdown,
            _ => return None,
        })
    }
}

/// 8-byte frame header: message type plus the payload length that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcHeader {
    pub msg_type: u32,
    pub payload_size: u32,
}

impl WireStruct for IpcHeader {
    const SIZE_BYTES: usize = 8;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u32(out, 0, self.msg_type);
        put_u32(out, 4, self.payload_size);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            msg_type: get_u32(buf, 0),
            payload_size: get_u32(buf, 4),
        })
    }
}

/// Sent by the emulator device immediately after the backend connects
/// (`spec.md` §4.3): `{u64 shmem_size, char[] shmem_name_zero_terminated}`,
/// advertising both the region's size and the named OS object (POSIX
/// shared-memory object / Windows file mapping) the backend must open to
/// map the identical memory via its BAR2. Variable-length, so unlike the
/// rest of this module it does not implement the fixed-size [`WireStruct`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePayload {
    pub shmem_size: u64,
    pub shmem_name: String,
}

impl HandshakePayload {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; 8];
        put_u64(&mut out, 0, self.shmem_size);
        out.extend_from_slice(self.shmem_name.as_bytes());
        out.push(0);
        out
    }

    pub fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), 8)?;
        let shmem_size = get_u64(buf, 0);
        let name_bytes = &buf[8..];
        let nul_pos = name_bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::MissingNulTerminator)?;
        let shmem_name = std::str::from_utf8(&name_bytes[..nul_pos])
            .map_err(|_| ProtocolError::InvalidUtf8)?
            .to_string();
        Ok(Self {
            shmem_size,
            shmem_name,
        })
    }
}

/// Backend's reply: its supported feature bitmap (`spec.md` §4.3). The
/// emulator intersects this with its own bitmap and requires
/// [`crate::control_region::Features::D3D11`] to be present in the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeAckPayload {
    pub features: u64,
}

impl WireStruct for HandshakeAckPayload {
    const SIZE_BYTES: usize = 8;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        put_u64(out, 0, self.features);
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            features: get_u64(buf, 0),
        })
    }
}

/// Doorbell notification: "new commands are on the ring, go look."
/// Carries no payload beyond the header (`payload_size == 0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DoorbellPayload;

impl WireStruct for DoorbellPayload {
    const SIZE_BYTES: usize = 0;

    fn write_le(&self, _out: &mut [u8]) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_le(_buf: &[u8]) -> Result<Self, ProtocolError> {
        Ok(DoorbellPayload)
    }
}

/// Backend-to-device interrupt request: which MSI-X vector to fire (or the
/// legacy line, via `crate::consts::MSIX_NUM_VECTORS` as a sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrqPayload {
    pub vector: u16,
}

impl WireStruct for IrqPayload {
    const SIZE_BYTES: usize = 2;

    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError> {
        need(out.len(), Self::SIZE_BYTES)?;
        out[0..2].copy_from_slice(&self.vector.to_le_bytes());
        Ok(())
    }

    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError> {
        need(buf.len(), Self::SIZE_BYTES)?;
        Ok(Self {
            vector: u16::from_le_bytes(buf[0..2].try_into().unwrap()),
        })
    }
}

/// Graceful teardown notice, either direction. No payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownPayload;

impl WireStruct for ShutdownPayload {
    const SIZE_BYTES: usize = 0;

    fn write_le(&self, _out: &mut [u8]) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn read_le(_buf: &[u8]) -> Result<Self, ProtocolError> {
        Ok(ShutdownPayload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipc_header_roundtrip() {
        let payload = HandshakePayload {
            shmem_size: 0x1000_0000,
            shmem_name: "/pvgpu-test".to_string(),
        };
        let h = IpcHeader {
            msg_type: IpcMessageType::Handshake as u32,
            payload_size: payload.to_bytes().len() as u32,
        };
        let bytes = h.to_bytes();
        assert_eq!(IpcHeader::read_le(&bytes).unwrap(), h);
    }

    #[test]
    fn handshake_payload_roundtrip() {
        let payload = HandshakePayload {
            shmem_size: 0x1000_0000,
            shmem_name: "/pvgpu-42-7".to_string(),
        };
        let bytes = payload.to_bytes();
        assert_eq!(HandshakePayload::read_le(&bytes).unwrap(), payload);
    }

    #[test]
    fn handshake_payload_rejects_missing_nul_terminator() {
        let mut bytes = vec![0u8; 8];
        bytes.extend_from_slice(b"/pvgpu-no-nul");
        assert!(matches!(
            HandshakePayload::read_le(&bytes),
            Err(ProtocolError::MissingNulTerminator)
        ));
    }

    #[test]
    fn handshake_ack_carries_feature_bitmap() {
        let ack = HandshakeAckPayload {
            features: crate::control_region::Features::D3D11.bits() | crate::control_region::Features::COMPUTE.bits(),
        };
        let bytes = ack.to_bytes();
        assert_eq!(HandshakeAckPayload::read_le(&bytes).unwrap(), ack);
    }

    #[test]
    fn message_type_roundtrip() {
        for v in 1..=5u32 {
            assert_eq!(IpcMessageType::from_u32(v).unwrap() as u32, v);
        }
        assert!(IpcMessageType::from_u32(6).is_none());
    }
}
