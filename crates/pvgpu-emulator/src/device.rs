//! The device model proper: BAR0 register emulation and shared-memory
//! realization (`spec.md` §4.3), translated from the original QEMU device's
//! `pvgpu_bar0_read`/`pvgpu_bar0_write`/`pvgpu_realize`/`pvgpu_reset`.
//!
//! This crate does not embed a VMM — it models the device's *behavior*
//! (register semantics, shared-memory layout, IRQ routing policy) so that a
//! host process wiring up an actual PCI BAR can delegate reads/writes here,
//! and so integration tests can exercise the same logic without one.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use pvgpu_protocol::consts::*;
use pvgpu_protocol::control_region::{ControlRegion, Features, Status};
use pvgpu_shmem::region::{MmapRegion, SharedRegion, VecRegion};

use crate::error::EmulatorError;
use crate::irq::IrqSink;

/// Monotonic counter folded into generated shared-memory object names, so
/// two devices realized in the same process never collide.
static NEXT_SHMEM_ID: AtomicU64 = AtomicU64::new(0);

/// Mirrors `PvgpuState`'s BAR0-adjacent fields: values not visible through
/// the control region itself (the original keeps `status`/`irq_status` on
/// the device object, separate from `ctrl->status` in shared memory).
pub struct PvgpuDevice {
    region: Arc<dyn SharedRegion>,
    shmem_size: u64,
    /// Name of the POSIX shared-memory object backing `region`, communicated
    /// to the backend in the handshake (`spec.md` §4.2/§4.3). Empty for
    /// in-process regions (`realize_with_vec_region`) that no out-of-process
    /// backend will ever need to open.
    shmem_name: String,
    ring_size: u32,
    heap_size: u32,

    status: AtomicU32,
    irq_status: AtomicU32,
    irq_mask: AtomicU32,
    backend_connected: AtomicBool,
    doorbell_count: AtomicU64,
    doorbell_notify: tokio::sync::Notify,

    irq_sink: Arc<dyn IrqSink>,
}

impl PvgpuDevice {
    /// Realizes the device (`spec.md` §4.3 `pvgpu_realize`): validates
    /// `shmem_size`, allocates the backing region, and lays out the control
    /// region/ring/heap.
    pub fn realize(
        shmem_size: u64,
        shmem_name: String,
        region: Arc<dyn SharedRegion>,
        irq_sink: Arc<dyn IrqSink>,
    ) -> Result<Self, EmulatorError> {
        if shmem_size < MIN_SHMEM_SIZE {
            return Err(EmulatorError::ShmemTooSmall {
                min: MIN_SHMEM_SIZE,
                actual: shmem_size,
            });
        }
        let ring_size = DEFAULT_COMMAND_RING_SIZE;
        let ring_offset = CONTROL_REGION_SIZE as u32;
        let heap_offset = ring_offset + ring_size;
        let heap_size = (shmem_size as u32).saturating_sub(heap_offset);

        let dev = Self {
            region,
            shmem_size,
            shmem_name,
            ring_size,
            heap_size,
            status: AtomicU32::new(Status::READY.bits()),
            irq_status: AtomicU32::new(0),
            irq_mask: AtomicU32::new(0),
            backend_connected: AtomicBool::new(false),
            doorbell_count: AtomicU64::new(0),
            doorbell_notify: tokio::sync::Notify::new(),
            irq_sink,
        };
        dev.control().init(ring_offset, ring_size, heap_offset, heap_size);
        Ok(dev)
    }

    /// Convenience constructor for tests and in-process loopback setups:
    /// backs the device with an in-process [`VecRegion`] instead of a real
    /// mapping, so there is no named object for a backend to open.
    pub fn realize_with_vec_region(
        shmem_size: u64,
        irq_sink: Arc<dyn IrqSink>,
    ) -> Result<Self, EmulatorError> {
        let region: Arc<dyn SharedRegion> = Arc::new(VecRegion::new(shmem_size as usize));
        Self::realize(shmem_size, String::new(), region, irq_sink)
    }

    /// Realizes the device backed by a named POSIX shared-memory object
    /// (`spec.md` §4.2: BAR2 is backed by host memory simultaneously exposed
    /// to the out-of-process backend via a named OS mechanism). The name is
    /// generated uniquely per instance and handed to the backend during the
    /// handshake (`spec.md` §4.3) via [`PvgpuDevice::shmem_name`].
    pub fn realize_named(shmem_size: u64, irq_sink: Arc<dyn IrqSink>) -> Result<Self, EmulatorError> {
        let name = format!(
            "/pvgpu-{}-{}",
            std::process::id(),
            NEXT_SHMEM_ID.fetch_add(1, Ordering::Relaxed)
        );
        let region = MmapRegion::create_named(&name, shmem_size as usize).map_err(EmulatorError::Map)?;
        Self::realize(shmem_size, name, Arc::new(region), irq_sink)
    }

    /// Name of the named shared-memory object backing this device, or an
    /// empty string for in-process-only regions. Sent verbatim in the
    /// handshake's `shmem_name` field.
    pub fn shmem_name(&self) -> &str {
        &self.shmem_name
    }

    /// Safety: the control region lives at offset 0 of `self.region` and was
    /// laid out by `realize`/`reset`, which only this type calls.
    pub fn control(&self) -> &ControlRegion {
        unsafe { &*(self.region.as_ptr() as *const ControlRegion) }
    }

    pub fn region(&self) -> &dyn SharedRegion {
        self.region.as_ref()
    }

    /// Hands out a clone of the owning `Arc`, so another component in the
    /// same process (e.g. `pvgpu-miniport` in an integration test) can map
    /// the identical shared memory without a second copy.
    pub fn region_arc(&self) -> Arc<dyn SharedRegion> {
        self.region.clone()
    }

    pub fn shmem_size(&self) -> u64 {
        self.shmem_size
    }

    pub fn ring_size(&self) -> u32 {
        self.ring_size
    }

    pub fn heap_size(&self) -> u32 {
        self.heap_size
    }

    pub fn doorbell_count(&self) -> u64 {
        self.doorbell_count.load(Ordering::Relaxed)
    }

    /// Resolves the next time the guest rings the doorbell. Used by
    /// [`crate::backend_loop::run`] to forward a `DOORBELL` IPC message to
    /// the backend without polling.
    pub async fn wait_doorbell(&self) {
        self.doorbell_notify.notified().await;
    }

    pub fn is_backend_connected(&self) -> bool {
        self.backend_connected.load(Ordering::Acquire)
    }

    pub(crate) fn set_backend_connected(&self, connected: bool) {
        self.backend_connected.store(connected, Ordering::Release);
        if connected {
            self.control().set_status(self.control().status() | Status::BACKEND_CONN);
        } else {
            self.control()
                .set_status(self.control().status() & !Status::BACKEND_CONN);
        }
    }

    /// `pvgpu_bar0_read`.
    pub fn read_bar0(&self, offset: u64) -> u32 {
        match offset {
            REG_VERSION => PVGPU_VERSION,
            REG_FEATURES_LO => (self.control().features().bits() & 0xFFFF_FFFF) as u32,
            REG_FEATURES_HI => (self.control().features().bits() >> 32) as u32,
            REG_STATUS => {
                let mut s = Status::from_bits_truncate(self.status.load(Ordering::Relaxed));
                if self.is_backend_connected() {
                    s |= Status::BACKEND_CONN;
                }
                s.bits()
            }
            REG_IRQ_STATUS => self.irq_status.load(Ordering::Relaxed),
            REG_IRQ_MASK => self.irq_mask.load(Ordering::Relaxed),
            REG_SHMEM_SIZE => self.shmem_size as u32,
            REG_RING_SIZE => self.ring_size,
            _ => {
                tracing::warn!(offset, "read from unknown pvgpu BAR0 register");
                0
            }
        }
    }

    /// `pvgpu_bar0_write`.
    pub fn write_bar0(&self, offset: u64, val: u32) {
        match offset {
            REG_STATUS => {
                // Only the ERROR bit is guest-clearable.
                let cur = self.status.load(Ordering::Relaxed);
                self.status
                    .store(cur & !(val & Status::ERROR.bits()), Ordering::Relaxed);
            }
            REG_DOORBELL => {
                self.doorbell_count.fetch_add(1, Ordering::Relaxed);
                self.doorbell_notify.notify_one();
            }
            REG_IRQ_STATUS => {
                // Write-1-to-clear.
                self.irq_status.fetch_and(!val, Ordering::Relaxed);
            }
            REG_IRQ_MASK => {
                self.irq_mask.store(val, Ordering::Relaxed);
            }
            REG_RESET => {
                if val == 1 {
                    self.reset_pointers_only();
                }
            }
            _ => {
                tracing::warn!(offset, val, "write to unknown pvgpu BAR0 register");
            }
        }
    }

    /// Guest-initiated reset via `REG_RESET`: resets ring pointers/fences
    /// and clears status, but does not renegotiate the shared-memory layout
    /// (`spec.md` §4.3 Reset semantics; the original only touches `ctrl->*_ptr`
    /// here, unlike the full `dc->reset` path).
    fn reset_pointers_only(&self) {
        self.status.store(Status::READY.bits(), Ordering::Relaxed);
        self.irq_status.store(0, Ordering::Relaxed);
        self.control().reset_pointers();
    }

    /// Device-level reset (`spec.md` §4.3; mirrors `pvgpu_reset`/`dc->reset`
    /// in the original, which fully reinitializes shared memory).
    pub fn device_reset(&self) {
        self.status.store(Status::READY.bits(), Ordering::Relaxed);
        self.irq_status.store(0, Ordering::Relaxed);
        self.irq_mask.store(0, Ordering::Relaxed);
        let ring_offset = CONTROL_REGION_SIZE as u32;
        let heap_offset = ring_offset + self.ring_size;
        self.control()
            .init(ring_offset, self.ring_size, heap_offset, self.heap_size);
    }

    /// `pvgpu_raise_irq`: ORs `irq_bits` into `irq_status`, and notifies the
    /// guest only if the result intersects `irq_mask`.
    pub fn raise_irq(&self, irq_bits: u32, vector: u16) {
        self.irq_status.fetch_or(irq_bits, Ordering::Relaxed);
        let status = self.irq_status.load(Ordering::Relaxed);
        let mask = self.irq_mask.load(Ordering::Relaxed);
        if status & mask != 0 {
            self.irq_sink.raise(vector);
        }
    }

    /// Marks the device as having lost its backend (`spec.md` §7:
    /// `DEVICE_LOST` is sticky until a reset) and raises the error vector.
    pub fn mark_device_lost(&self) {
        self.set_backend_connected(false);
        self.control()
            .set_status(self.control().status() | Status::DEVICE_LOST | Status::ERROR);
        self.raise_irq(1 << MSIX_VECTOR_ERROR, MSIX_VECTOR_ERROR);
    }
}

impl Drop for PvgpuDevice {
    fn drop(&mut self) {
        if !self.shmem_name.is_empty() {
            if let Err(err) = pvgpu_shmem::region::unlink_named(&self.shmem_name) {
                tracing::warn!(name = %self.shmem_name, %err, "failed to unlink named shared memory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::irq::CountingIrqSink;

    fn device() -> PvgpuDevice {
        let sink = Arc::new(CountingIrqSink::default());
        PvgpuDevice::realize_with_vec_region(MIN_SHMEM_SIZE, sink).unwrap()
    }

    #[test]
    fn rejects_too_small_shmem() {
        let sink = Arc::new(CountingIrqSink::default());
        let err = PvgpuDevice::realize_with_vec_region(MIN_SHMEM_SIZE - 1, sink).unwrap_err();
        assert!(matches!(err, EmulatorError::ShmemTooSmall { .. }));
    }

    #[test]
    fn vec_region_device_has_no_shmem_name() {
        assert_eq!(device().shmem_name(), "");
    }

    #[test]
    fn named_device_is_mappable_by_name_and_cleans_up_on_drop() {
        let sink = Arc::new(CountingIrqSink::default());
        let dev = PvgpuDevice::realize_named(MIN_SHMEM_SIZE, sink).unwrap();
        let name = dev.shmem_name().to_string();
        assert!(!name.is_empty());

        let reopened = pvgpu_shmem::region::MmapRegion::open_named(&name).unwrap();
        let mut magic = [0u8; 4];
        reopened.read_bytes(0, &mut magic);
        assert_eq!(u32::from_le_bytes(magic), PVGPU_MAGIC);

        drop(reopened);
        drop(dev);
        assert!(pvgpu_shmem::region::MmapRegion::open_named(&name).is_err());
    }

    #[test]
    fn version_register_matches_protocol_constant() {
        let dev = device();
        assert_eq!(dev.read_bar0(REG_VERSION), PVGPU_VERSION);
    }

    #[test]
    fn features_register_split_across_lo_hi() {
        let dev = device();
        let lo = dev.read_bar0(REG_FEATURES_LO) as u64;
        let hi = dev.read_bar0(REG_FEATURES_HI) as u64;
        assert_eq!(lo | (hi << 32), Features::MVP.bits());
    }

    #[test]
    fn doorbell_write_increments_counter() {
        let dev = device();
        assert_eq!(dev.doorbell_count(), 0);
        dev.write_bar0(REG_DOORBELL, 1);
        dev.write_bar0(REG_DOORBELL, 1);
        assert_eq!(dev.doorbell_count(), 2);
    }

    #[test]
    fn irq_status_write_one_clears_bits() {
        let dev = device();
        dev.write_bar0(REG_IRQ_MASK, 0xFFFF_FFFF);
        dev.raise_irq(0b101, 0);
        assert_eq!(dev.read_bar0(REG_IRQ_STATUS), 0b101);
        dev.write_bar0(REG_IRQ_STATUS, 0b001);
        assert_eq!(dev.read_bar0(REG_IRQ_STATUS), 0b100);
    }

    #[test]
    fn irq_only_notifies_sink_when_unmasked() {
        let sink = Arc::new(CountingIrqSink::default());
        let dev = PvgpuDevice::realize_with_vec_region(MIN_SHMEM_SIZE, sink.clone()).unwrap();

        dev.write_bar0(REG_IRQ_MASK, 0);
        dev.raise_irq(1, 0);
        assert_eq!(sink.count(), 0, "masked IRQ must not notify");

        dev.write_bar0(REG_IRQ_MASK, 1);
        dev.raise_irq(1, 0);
        assert_eq!(sink.count(), 1);
    }

    #[test]
    fn reset_register_clears_ring_pointers_but_keeps_layout() {
        let dev = device();
        dev.control().producer_ptr.value.store(123, Ordering::Relaxed);
        dev.write_bar0(REG_RESET, 1);
        assert_eq!(dev.control().producer_ptr.value.load(Ordering::Relaxed), 0);
        assert_eq!(dev.control().ring_size.load(Ordering::Relaxed), dev.ring_size);
    }

    #[test]
    fn device_lost_is_sticky_and_clears_backend_connected() {
        let dev = device();
        dev.set_backend_connected(true);
        dev.mark_device_lost();
        assert!(!dev.is_backend_connected());
        assert!(dev.control().status().contains(Status::DEVICE_LOST));
    }
}
