//! The lock-free SPSC command ring (`spec.md` §3, §4.2, §9).
//!
//! The guest is the sole producer, the backend (via the emulator device's
//! IPC loop) the sole consumer. `producer_ptr`/`consumer_ptr` in the
//! [`ControlRegion`] are monotonically increasing byte counters, not
//! wrapped offsets — the physical offset into the ring buffer is always
//! `counter % ring_size`, matching `pvgpu_protocol.h`'s own indexing, which
//! only requires `ring_size` to be a multiple of 16 (checked in
//! [`CommandRing::new`]), not a power of two. Treating the counters as
//! unwrapped avoids the classic ambiguity between an empty and a full ring
//! that plain wrapped indices have.
//!
//! Cache-line isolation of the four hot counters is handled by
//! [`ControlRegion`] itself; this module only adds the acquire/release
//! discipline on top: the producer publishes new data with a `Release`
//! store to `producer_ptr` after the bytes are in place, and the consumer
//! publishes freed space with a `Release` store to `consumer_ptr` after
//! copying data out. Each side only ever loads the *other* side's counter
//! with `Acquire`.

use core::sync::atomic::Ordering;

use pvgpu_protocol::header::CommandHeader;
use pvgpu_protocol::wire::WireStruct;

use crate::error::ShmemError;
use crate::region::SharedRegion;
use pvgpu_protocol::control_region::ControlRegion;

pub struct CommandRing<'a> {
    region: &'a dyn SharedRegion,
    control: &'a ControlRegion,
    offset: usize,
    size: usize,
}

impl<'a> CommandRing<'a> {
    pub fn new(
        region: &'a dyn SharedRegion,
        control: &'a ControlRegion,
        ring_offset: u32,
        ring_size: u32,
    ) -> Result<Self, ShmemError> {
        if ring_size % pvgpu_protocol::consts::COMMAND_ALIGN != 0 {
            return Err(ShmemError::NotAligned(ring_size));
        }
        Ok(Self {
            region,
            control,
            offset: ring_offset as usize,
            size: ring_size as usize,
        })
    }

    /// Bytes the producer may still write without overtaking the consumer.
    pub fn free_space(&self) -> usize {
        let producer = self.control.producer_ptr.value.load(Ordering::Relaxed);
        let consumer = self.control.consumer_ptr.value.load(Ordering::Acquire);
        self.size - (producer - consumer) as usize
    }

    /// Bytes the consumer may read without overtaking the producer.
    pub fn available(&self) -> usize {
        let producer = self.control.producer_ptr.value.load(Ordering::Acquire);
        let consumer = self.control.consumer_ptr.value.load(Ordering::Relaxed);
        (producer - consumer) as usize
    }

    /// Producer side: appends `data` (header + payload, already assembled
    /// and 16-byte aligned in length) to the ring, or returns
    /// [`ShmemError::RingFull`] if there is not enough free space. Callers
    /// are expected to retry with the three-phase backoff described in
    /// `spec.md` §4.5 rather than block here.
    pub fn try_push(&self, data: &[u8]) -> Result<(), ShmemError> {
        if data.len() > self.size {
            return Err(ShmemError::PayloadTooLarge {
                len: data.len(),
                capacity: self.size,
            });
        }
        let free = self.free_space();
        if free < data.len() {
            return Err(ShmemError::RingFull {
                requested: data.len(),
                available: free,
            });
        }

        let producer = self.control.producer_ptr.value.load(Ordering::Relaxed);
        self.copy_into_ring(producer, data);
        // Release: the consumer must observe the fully-written bytes before
        // it observes the advanced producer_ptr.
        self.control
            .producer_ptr
            .value
            .store(producer + data.len() as u64, Ordering::Release);
        Ok(())
    }

    /// Consumer side: reads the 16-byte command header at the current read
    /// position without advancing it, so the caller can size a buffer for
    /// [`CommandRing::pop`]. Returns `None` if fewer than 16 bytes are
    /// currently available.
    pub fn peek_header(&self) -> Option<CommandHeader> {
        if self.available() < CommandHeader::SIZE_BYTES {
            return None;
        }
        let consumer = self.control.consumer_ptr.value.load(Ordering::Relaxed);
        let mut buf = [0u8; CommandHeader::SIZE_BYTES];
        self.copy_from_ring(consumer, &mut buf);
        CommandHeader::read_le(&buf).ok()
    }

    /// Consumer side: copies out and retires exactly `len` bytes starting
    /// at the current read position, advancing `consumer_ptr`. `len` must
    /// not exceed [`CommandRing::available`].
    pub fn pop(&self, len: usize) -> Vec<u8> {
        debug_assert!(len <= self.available(), "pop beyond available data");
        let consumer = self.control.consumer_ptr.value.load(Ordering::Relaxed);
        let mut out = vec![0u8; len];
        self.copy_from_ring(consumer, &mut out);
        // Release: the guest must see the freed space only after we're done
        // reading what used to occupy it.
        self.control
            .consumer_ptr
            .value
            .store(consumer + len as u64, Ordering::Release);
        out
    }

    fn copy_into_ring(&self, start: u64, data: &[u8]) {
        let phys = (start % self.size as u64) as usize;
        let first = (self.size - phys).min(data.len());
        self.region.write_bytes(self.offset + phys, &data[..first]);
        if first < data.len() {
            self.region.write_bytes(self.offset, &data[first..]);
        }
    }

    fn copy_from_ring(&self, start: u64, out: &mut [u8]) {
        let phys = (start % self.size as u64) as usize;
        let first = (self.size - phys).min(out.len());
        self.region.read_bytes(self.offset + phys, &mut out[..first]);
        if first < out.len() {
            self.region.read_bytes(self.offset, &mut out[first..]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::VecRegion;
    use pvgpu_protocol::consts::align16;
    use pvgpu_protocol::header::{CommandFlags, CommandType};

    const RING_SIZE: u32 = 256;

    fn setup() -> (VecRegion, ControlRegion) {
        let region = VecRegion::new(4096 + RING_SIZE as usize);
        let control = ControlRegion::zeroed();
        control.init(4096, RING_SIZE, 4096 + RING_SIZE, 1024);
        (region, control)
    }

    fn encode_flush() -> Vec<u8> {
        let h = CommandHeader::new(CommandType::FLUSH, align16(16), 0, CommandFlags::empty());
        h.to_bytes()
    }

    #[test]
    fn push_then_pop_roundtrip() {
        let (region, control) = setup();
        let ring = CommandRing::new(&region, &control, 4096, RING_SIZE).unwrap();

        let cmd = encode_flush();
        ring.try_push(&cmd).unwrap();
        assert_eq!(ring.available(), cmd.len());

        let header = ring.peek_header().unwrap();
        assert_eq!(header.kind(), CommandType::Flush);
        let popped = ring.pop(header.command_size as usize);
        assert_eq!(popped, cmd);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn wraparound_push_and_pop() {
        let (region, control) = setup();
        let ring = CommandRing::new(&region, &control, 4096, RING_SIZE).unwrap();

        // Push commands until the producer pointer has wrapped at least once,
        // popping as we go so the ring never reports full.
        for i in 0..40u32 {
            let cmd = encode_flush();
            ring.try_push(&cmd).unwrap();
            let header = ring.peek_header().unwrap();
            let popped = ring.pop(header.command_size as usize);
            assert_eq!(popped, cmd, "iteration {i}");
        }
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn ring_full_is_reported_rather_than_overwriting() {
        let (region, control) = setup();
        let ring = CommandRing::new(&region, &control, 4096, RING_SIZE).unwrap();

        let cmd = encode_flush();
        let mut pushed = 0;
        while ring.try_push(&cmd).is_ok() {
            pushed += cmd.len();
            assert!(pushed <= RING_SIZE as usize);
        }
        assert!(matches!(
            ring.try_push(&cmd),
            Err(ShmemError::RingFull { .. })
        ));
    }

    #[test]
    fn misaligned_size_rejected() {
        let (region, control) = setup();
        assert!(matches!(
            CommandRing::new(&region, &control, 4096, 300),
            Err(ShmemError::NotAligned(300))
        ));
    }

    #[test]
    fn non_power_of_two_ring_size_is_accepted() {
        // The protocol only requires a multiple of 16, not a power of two
        // (`examples/original_source/protocol/pvgpu_protocol.h` indexes with
        // plain `%`, not a power-of-two mask).
        const SIZE: u32 = 4096 * 3;
        let region = VecRegion::new(4096 + SIZE as usize);
        let control = ControlRegion::zeroed();
        control.init(4096, SIZE, 4096 + SIZE, 1024);
        let ring = CommandRing::new(&region, &control, 4096, SIZE).unwrap();

        for i in 0..50u32 {
            let cmd = encode_flush();
            ring.try_push(&cmd).unwrap();
            let header = ring.peek_header().unwrap();
            let popped = ring.pop(header.command_size as usize);
            assert_eq!(popped, cmd, "iteration {i}");
        }
        assert_eq!(ring.available(), 0);
    }

    proptest::proptest! {
        /// Pushing and immediately popping a run of variably-sized,
        /// 16-byte-aligned payloads always returns exactly what went in, no
        /// matter how many times the producer/consumer counters wrap around
        /// the physical buffer.
        #[test]
        fn arbitrary_pushes_survive_wraparound(
            payloads in proptest::collection::vec(
                proptest::collection::vec(proptest::num::u8::ANY, 16..96),
                1..200,
            )
        ) {
            let (region, control) = setup();
            let ring = CommandRing::new(&region, &control, 4096, RING_SIZE).unwrap();

            for payload in payloads {
                let len = align16(payload.len() as u32) as usize;
                let mut padded = payload;
                padded.resize(len, 0);

                ring.try_push(&padded).unwrap();
                let popped = ring.pop(len);
                proptest::prop_assert_eq!(popped, padded);
            }
            proptest::prop_assert_eq!(ring.available(), 0);
        }
    }
}
