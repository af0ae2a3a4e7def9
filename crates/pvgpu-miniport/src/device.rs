//! The guest kernel broker proper (`spec.md` §4.4): fields the UMD escape
//! interface, translates `SUBMIT_COMMANDS` into actual ring writes, and
//! handles BAR0 interrupts.
//!
//! Modeled as ordinary (non-`no_std`) Rust: the spinlock-under-IRQL submit
//! path is a [`std::sync::Mutex`] guarding the critical section, and
//! `WAIT_FENCE`'s poll uses [`std::thread::yield_now`] plus a bounded sleep
//! rather than a busy spin, matching `spec.md` §4.4/§5 in effect (mutual
//! exclusion, bounded-latency polling) without a kernel target.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use pvgpu_protocol::consts::*;
use pvgpu_protocol::control_region::{ControlRegion, Status};
use pvgpu_protocol::escape::{CapsResponse, SetDisplayModeRequest, ShmemInfo};
use pvgpu_shmem::heap::HeapAllocator;
use pvgpu_shmem::region::SharedRegion;
use pvgpu_shmem::ring::CommandRing;

use crate::bar0::Bar0Port;
use crate::display::DisplayShadow;
use crate::error::MiniportError;

/// D3D11 feature-level-11.0 caps the original header reports generously
/// (`spec.md` §4.6); the backend validates the real limits at resource
/// creation time.
const MAX_TEXTURE_DIMENSION: u32 = 16384;
const MAX_RENDER_TARGETS: u32 = 8;
const MAX_VERTEX_BUFFERS: u32 = 16;
const MAX_CONSTANT_BUFFERS: u32 = 14;

/// Carries the lower 32 bits of a completed fence value up to the graphics
/// kernel, the deferred-procedure payload described in `spec.md` §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FenceNotification {
    pub fence_low: u32,
}

pub struct Miniport {
    region: Arc<dyn SharedRegion>,
    bar0: Arc<dyn Bar0Port>,
    ring_offset: u32,
    ring_size: u32,
    heap_offset: u32,
    submit_lock: Mutex<()>,
    heap: Mutex<HeapAllocator>,
    display: Mutex<DisplayShadow>,
}

impl Miniport {
    /// Attach/init path: verifies magic and version, then reads the
    /// negotiated ring/heap layout out of the control region.
    pub fn attach(region: Arc<dyn SharedRegion>, bar0: Arc<dyn Bar0Port>) -> Result<Self, MiniportError> {
        let (magic, version, ring_offset, ring_size, heap_offset, heap_size, display) = {
            let control = control_region(&*region);
            (
                control.magic.load(Ordering::Acquire),
                control.version.load(Ordering::Acquire),
                control.ring_offset.load(Ordering::Relaxed),
                control.ring_size.load(Ordering::Relaxed),
                control.heap_offset.load(Ordering::Relaxed),
                control.heap_size.load(Ordering::Relaxed),
                DisplayShadow {
                    width: control.display_width.load(Ordering::Relaxed),
                    height: control.display_height.load(Ordering::Relaxed),
                    refresh: control.display_refresh.load(Ordering::Relaxed),
                    format: control.display_format.load(Ordering::Relaxed),
                },
            )
        };
        if magic != PVGPU_MAGIC {
            return Err(MiniportError::BadMagic { expected: PVGPU_MAGIC, actual: magic });
        }
        if version_major(version) != PVGPU_VERSION_MAJOR {
            return Err(MiniportError::VersionMismatch {
                expected_major: PVGPU_VERSION_MAJOR,
                actual: version,
            });
        }
        Ok(Self {
            region,
            bar0,
            ring_offset,
            ring_size,
            heap_offset,
            submit_lock: Mutex::new(()),
            heap: Mutex::new(HeapAllocator::new(heap_size)),
            display: Mutex::new(display),
        })
    }

    fn control(&self) -> &ControlRegion {
        control_region(&*self.region)
    }

    /// `GET_SHMEM_INFO`.
    pub fn shmem_info(&self) -> ShmemInfo {
        ShmemInfo {
            total_size: self.region.len() as u64,
            ring_offset: self.ring_offset,
            ring_size: self.ring_size,
            heap_offset: self.heap_offset,
            heap_size: self.control().heap_size.load(Ordering::Relaxed),
        }
    }

    /// `ALLOC_HEAP(size, alignment)`.
    pub fn alloc_heap(&self, size: u32, align: u32) -> Result<u32, MiniportError> {
        let mut heap = self.heap.lock().unwrap();
        Ok(heap.alloc(size, align)?)
    }

    /// `FREE_HEAP(offset, size)`. `size` is accepted for ABI symmetry with
    /// the original escape call but unused: the allocator already tracks
    /// each allocation's true block count.
    pub fn free_heap(&self, offset: u32) -> Result<(), MiniportError> {
        let mut heap = self.heap.lock().unwrap();
        Ok(heap.free(offset)?)
    }

    /// `SUBMIT_COMMANDS(command_offset, command_size, fence_value)`: copies
    /// `bytes` into the ring under the submit lock, publishes the requested
    /// fence, and rings the doorbell. Returns the new producer pointer.
    pub fn submit_commands(&self, bytes: &[u8], fence_value: u64) -> Result<u64, MiniportError> {
        let _guard = self.submit_lock.lock().unwrap();
        let control = self.control();
        let ring = CommandRing::new(&*self.region, control, self.ring_offset, self.ring_size)?;
        ring.try_push(bytes)?;
        control.guest_fence_request.value.store(fence_value, Ordering::Release);
        self.bar0.write(REG_DOORBELL, 1);
        Ok(control.producer_ptr.value.load(Ordering::Relaxed))
    }

    /// `WAIT_FENCE(fence_value, timeout_ms)`: polls `host_fence_completed`,
    /// yielding between checks. `timeout_ms == 0` waits indefinitely.
    /// Aborts immediately on `SHUTDOWN`/`DEVICE_LOST` or a sticky device
    /// error rather than waiting out the timeout.
    pub fn wait_fence(&self, fence_value: u64, timeout_ms: u32) -> Result<u64, MiniportError> {
        let control = self.control();
        let deadline = (timeout_ms != 0).then(|| Instant::now() + Duration::from_millis(timeout_ms as u64));

        loop {
            let status = control.status();
            if status.contains(Status::SHUTDOWN) || status.contains(Status::DEVICE_LOST) {
                return Err(MiniportError::DeviceRemoved { status });
            }
            let error_code = control.error_code.load(Ordering::Acquire);
            if error_code != 0 {
                return Err(MiniportError::DeviceError {
                    code: pvgpu_protocol::error::PvgpuErrorCode::from_u32(error_code),
                });
            }
            let completed = control.host_fence_completed.value.load(Ordering::Acquire);
            if completed >= fence_value {
                return Ok(completed);
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(MiniportError::Timeout { timeout_ms });
                }
            }
            std::thread::yield_now();
            std::thread::sleep(Duration::from_micros(200));
        }
    }

    /// `GET_CAPS`.
    pub fn get_caps(&self) -> CapsResponse {
        CapsResponse {
            features: self.control().features().bits(),
            max_texture_dimension: MAX_TEXTURE_DIMENSION,
            max_render_targets: MAX_RENDER_TARGETS,
            max_vertex_buffers: MAX_VERTEX_BUFFERS,
            max_constant_buffers: MAX_CONSTANT_BUFFERS,
        }
    }

    /// `RING_DOORBELL`: best-effort, errors are swallowed by construction
    /// (a register write cannot itself fail at this layer).
    pub fn ring_doorbell(&self) {
        self.bar0.write(REG_DOORBELL, 1);
    }

    /// `SET_DISPLAY_MODE(width, height, refresh, flags)`.
    pub fn set_display_mode(&self, req: SetDisplayModeRequest) -> Result<(), MiniportError> {
        if req.width == 0 || req.height == 0 || req.refresh == 0 {
            return Err(MiniportError::InvalidDisplayMode);
        }
        let control = self.control();
        control.display_width.store(req.width, Ordering::Relaxed);
        control.display_height.store(req.height, Ordering::Relaxed);
        control.display_refresh.store(req.refresh, Ordering::Relaxed);
        control.display_format.store(req.format, Ordering::Relaxed);
        *self.display.lock().unwrap() = DisplayShadow {
            width: req.width,
            height: req.height,
            refresh: req.refresh,
            format: req.format,
        };
        Ok(())
    }

    pub fn display_shadow(&self) -> DisplayShadow {
        *self.display.lock().unwrap()
    }

    /// Relaxed, no-escape peek at `host_fence_completed`, for the UMD's
    /// present-pacing fast path (`spec.md` §4.5: "a relaxed read of
    /// host_fence_completed via the shared memory, fast path, no escape").
    pub fn fence_completed_hint(&self) -> u64 {
        self.control().host_fence_completed.value.load(Ordering::Relaxed)
    }

    /// Interrupt pathway (`spec.md` §4.4): acknowledges observed IRQ_STATUS
    /// bits by writing them back, then reads `host_fence_completed` for the
    /// deferred-procedure notification.
    pub fn handle_irq(&self) -> Option<FenceNotification> {
        let status = self.bar0.read(REG_IRQ_STATUS);
        if status == 0 {
            return None;
        }
        self.bar0.write(REG_IRQ_STATUS, status);
        let completed = self.control().host_fence_completed.value.load(Ordering::Acquire);
        if completed == 0 {
            return None;
        }
        Some(FenceNotification {
            fence_low: completed as u32,
        })
    }
}

fn control_region(region: &dyn SharedRegion) -> &ControlRegion {
    // Safety: the control region always lives at offset 0 of the mapped
    // shared memory, laid out by the emulator's `PvgpuDevice::realize`.
    unsafe { &*(region.as_ptr() as *const ControlRegion) }
}
