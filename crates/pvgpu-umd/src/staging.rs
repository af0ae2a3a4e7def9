//! Per-device staging buffer and flush loop (`spec.md` §4.5).
//!
//! DDI calls never touch the ring directly: they append a 16-byte-aligned
//! command to this buffer, which is only pushed to the miniport (and from
//! there onto the actual ring) on `Flush`/`Present`/`Map` or when it would
//! overflow. This mirrors the command-batching staging areas in the
//! teacher's GPU command processors (e.g. `aero-gpu`'s ring encoders),
//! adapted here to the explicit escape-call boundary this protocol uses
//! instead of a direct ring mapping from user mode.

use pvgpu_protocol::consts::align16;
use pvgpu_protocol::escape::SubmitCommandsRequest;
use pvgpu_protocol::header::{CommandFlags, CommandHeader};
use pvgpu_protocol::wire::WireStruct;

use crate::error::UmdError;
use crate::escape_client::EscapeClient;

/// Default staging capacity (`spec.md` §4.5).
pub const DEFAULT_STAGING_CAPACITY: usize = 256 * 1024;

const SPIN_LIMIT: u32 = 100;
const YIELD_LIMIT: u32 = 500;

pub struct StagingBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl StagingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// `PvgpuWriteCommand`: appends a command header + payload, zero-padded
    /// to 16-byte alignment, flushing first if it would not fit.
    pub fn write_command(
        &mut self,
        client: Option<&dyn EscapeClient>,
        command_type: u32,
        resource_id: u32,
        flags: CommandFlags,
        payload: &[u8],
    ) -> Result<(), UmdError> {
        let size = align16((CommandHeader::SIZE_BYTES + payload.len()) as u32);
        if self.buf.len() + size as usize > self.capacity {
            self.flush(client, 0)?;
        }
        let header = CommandHeader::new(command_type, size, resource_id, flags);
        self.buf.extend_from_slice(&header.to_bytes());
        self.buf.extend_from_slice(payload);
        self.buf.resize(
            self.buf.len() + (size as usize - CommandHeader::SIZE_BYTES - payload.len()),
            0,
        );
        Ok(())
    }

    /// `PvgpuFlushCommandBuffer`: hands the staged bytes to the miniport via
    /// `SUBMIT_COMMANDS`, retrying on `RING_FULL` with the three-phase
    /// spin/yield/sleep backoff. If `client` is `None` — shared memory was
    /// never obtained — the batch is silently discarded; the driver stays
    /// callable but produces no work (`spec.md` §4.5).
    pub fn flush(&mut self, client: Option<&dyn EscapeClient>, fence_value: u64) -> Result<(), UmdError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let Some(client) = client else {
            self.buf.clear();
            return Ok(());
        };

        let req = SubmitCommandsRequest {
            byte_count: self.buf.len() as u32,
            fence_value,
        };

        let mut spins = 0u32;
        let mut yields = 0u32;
        loop {
            match client.call(
                pvgpu_protocol::escape::EscapeCode::SubmitCommands,
                &req.to_bytes(),
                Some(&self.buf),
            ) {
                Ok(_) => {
                    self.buf.clear();
                    return Ok(());
                }
                Err(err) if err.is_ring_full() => {
                    if spins < SPIN_LIMIT {
                        spins += 1;
                        std::hint::spin_loop();
                    } else if yields < YIELD_LIMIT {
                        yields += 1;
                        std::thread::yield_now();
                    } else {
                        std::thread::sleep(std::time::Duration::from_millis(1));
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvgpu_protocol::header::CommandType;

    #[test]
    fn write_command_pads_to_16_bytes() {
        let mut staging = StagingBuffer::new(DEFAULT_STAGING_CAPACITY);
        staging
            .write_command(None, CommandType::FLUSH, 0, CommandFlags::empty(), &[1, 2, 3])
            .unwrap();
        assert_eq!(staging.len() % 16, 0);
    }

    #[test]
    fn flush_without_client_silently_discards() {
        let mut staging = StagingBuffer::new(DEFAULT_STAGING_CAPACITY);
        staging
            .write_command(None, CommandType::FLUSH, 0, CommandFlags::empty(), &[])
            .unwrap();
        assert!(!staging.is_empty());
        staging.flush(None, 1).unwrap();
        assert!(staging.is_empty());
    }

    #[test]
    fn flush_of_empty_buffer_is_a_noop() {
        let mut staging = StagingBuffer::new(DEFAULT_STAGING_CAPACITY);
        staging.flush(None, 0).unwrap();
        assert!(staging.is_empty());
    }
}
