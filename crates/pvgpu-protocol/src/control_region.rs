//! The 4 KiB control region at offset 0 of shared memory (`spec.md` §3).
//!
//! `producer_ptr`, `consumer_ptr`, `guest_fence_request`, and
//! `host_fence_completed` each get their own cache line — `spec.md` §9 calls
//! this out as a correctness invariant, not a perf nicety ("An unpadded
//! layout will not just be slow — it will corrupt performance benchmarks and
//! cause coherence-traffic deadlocks under heavy contention on some hosts"),
//! so `CacheLinePadded` is a hard 64-byte-aligned wrapper rather than a
//! `#[repr(align)]` hint applied loosely.

use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use bitflags::bitflags;

use crate::consts::CONTROL_REGION_SIZE;

/// Wraps a single atomic on its own padded 64-byte cache line.
#[repr(align(64))]
pub struct CacheLinePadded<T> {
    pub value: T,
    _pad: [u8; 0],
}

impl<T> CacheLinePadded<T> {
    pub const fn new(value: T) -> Self {
        Self { value, _pad: [] }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Features: u64 {
        const D3D11         = 1 << 0;
        const D3D12         = 1 << 1;
        const COMPUTE       = 1 << 2;
        const GEOMETRY      = 1 << 3;
        const TESSELLATION  = 1 << 4;
        const MSAA          = 1 << 5;
        const HDR           = 1 << 6;
        const VSYNC         = 1 << 7;
        const TRIPLE_BUFFER = 1 << 8;
    }
}

impl Features {
    /// Minimum viable feature set the original header ships as default.
    pub const MVP: Self = Self::D3D11.union(Self::COMPUTE).union(Self::VSYNC);
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u32 {
        const READY         = 1 << 0;
        const ERROR         = 1 << 1;
        const BACKEND_CONN  = 1 << 2;
        const DEVICE_LOST   = 1 << 3;
        const BACKEND_BUSY  = 1 << 4;
        const RESIZING      = 1 << 5;
        const RECOVERY      = 1 << 6;
        const SHUTDOWN      = 1 << 7;
    }
}

/// Mirrors `PvgpuControlRegion` from the original header, widened so the
/// four hot atomics are individually cache-line isolated while the struct as
/// a whole stays exactly 4096 bytes (`spec.md` §8 layout invariant).
#[repr(C)]
pub struct ControlRegion {
    pub magic: AtomicU32,
    pub version: AtomicU32,
    pub features: AtomicU64,

    pub ring_offset: AtomicU32,
    pub ring_size: AtomicU32,
    pub heap_offset: AtomicU32,
    pub heap_size: AtomicU32,

    /// Written only by the guest (producer).
    pub producer_ptr: CacheLinePadded<AtomicU64>,
    /// Written only by the host (consumer).
    pub consumer_ptr: CacheLinePadded<AtomicU64>,
    /// Latest fence value requested by the guest.
    pub guest_fence_request: CacheLinePadded<AtomicU64>,
    /// Latest fence value completed by the host.
    pub host_fence_completed: CacheLinePadded<AtomicU64>,

    pub status: AtomicU32,
    pub error_code: AtomicU32,
    pub error_data: AtomicU32,
    _reserved1: AtomicU32,

    pub display_width: AtomicU32,
    pub display_height: AtomicU32,
    pub display_refresh: AtomicU32,
    pub display_format: AtomicU32,

    _reserved: [u8; ControlRegion::RESERVED_BYTES],
}

impl ControlRegion {
    // Header proper up to (but not including) the cache-line-padded pointers:
    // magic+version+features+ring*4+heap*4 = 4+4+8+4+4+4+4 = 32 bytes.
    const HEADER_BYTES: usize = 32;
    // Four cache-line-padded u64 counters, 64 bytes each.
    const PADDED_COUNTERS_BYTES: usize = 64 * 4;
    // status+error_code+error_data+reserved1+display*4 = 4*4 + 4*4 = 32 bytes.
    const TAIL_BYTES: usize = 32;
    const RESERVED_BYTES: usize = CONTROL_REGION_SIZE
        - Self::HEADER_BYTES
        - Self::PADDED_COUNTERS_BYTES
        - Self::TAIL_BYTES;

    /// Builds a zeroed-logical control region (all atomics default to 0,
    /// except as set by `init`).
    pub fn zeroed() -> Self {
        Self {
            magic: AtomicU32::new(0),
            version: AtomicU32::new(0),
            features: AtomicU64::new(0),
            ring_offset: AtomicU32::new(0),
            ring_size: AtomicU32::new(0),
            heap_offset: AtomicU32::new(0),
            heap_size: AtomicU32::new(0),
            producer_ptr: CacheLinePadded::new(AtomicU64::new(0)),
            consumer_ptr: CacheLinePadded::new(AtomicU64::new(0)),
            guest_fence_request: CacheLinePadded::new(AtomicU64::new(0)),
            host_fence_completed: CacheLinePadded::new(AtomicU64::new(0)),
            status: AtomicU32::new(0),
            error_code: AtomicU32::new(0),
            error_data: AtomicU32::new(0),
            _reserved1: AtomicU32::new(0),
            display_width: AtomicU32::new(0),
            display_height: AtomicU32::new(0),
            display_refresh: AtomicU32::new(0),
            display_format: AtomicU32::new(0),
            _reserved: [0u8; Self::RESERVED_BYTES],
        }
    }

    /// Device-realization-time initialization (`spec.md` §4.3 `pvgpu_init_shmem`):
    /// sets magic/version/features/ring+heap layout and display defaults.
    /// Called exactly once per shared-memory instance; a `RESET` does not
    /// repeat this (`spec.md` §4.3 Reset semantics).
    pub fn init(&self, ring_offset: u32, ring_size: u32, heap_offset: u32, heap_size: u32) {
        self.magic.store(crate::consts::PVGPU_MAGIC, Ordering::Relaxed);
        self.version.store(crate::consts::PVGPU_VERSION, Ordering::Relaxed);
        self.features.store(Features::MVP.bits(), Ordering::Relaxed);
        self.ring_offset.store(ring_offset, Ordering::Relaxed);
        self.ring_size.store(ring_size, Ordering::Relaxed);
        self.heap_offset.store(heap_offset, Ordering::Relaxed);
        self.heap_size.store(heap_size, Ordering::Relaxed);
        self.producer_ptr.value.store(0, Ordering::Relaxed);
        self.consumer_ptr.value.store(0, Ordering::Relaxed);
        self.guest_fence_request.value.store(0, Ordering::Relaxed);
        self.host_fence_completed.value.store(0, Ordering::Relaxed);
        self.status.store(Status::READY.bits(), Ordering::Relaxed);
        self.error_code.store(0, Ordering::Relaxed);
        self.error_data.store(0, Ordering::Relaxed);
        self.display_width.store(1920, Ordering::Relaxed);
        self.display_height.store(1080, Ordering::Relaxed);
        self.display_refresh.store(60, Ordering::Relaxed);
        self.display_format.store(87, Ordering::Relaxed); // B8G8R8A8_UNORM
    }

    /// `RESET` semantics: reinitializes pointers/fences/IRQ-adjacent status
    /// but does not renegotiate features or touch ring/heap layout
    /// (`spec.md` §4.3 Reset).
    pub fn reset_pointers(&self) {
        self.producer_ptr.value.store(0, Ordering::Relaxed);
        self.consumer_ptr.value.store(0, Ordering::Relaxed);
        self.guest_fence_request.value.store(0, Ordering::Relaxed);
        self.host_fence_completed.value.store(0, Ordering::Relaxed);
        self.status.store(Status::READY.bits(), Ordering::Relaxed);
        self.error_code.store(0, Ordering::Relaxed);
        self.error_data.store(0, Ordering::Relaxed);
    }

    pub fn status(&self) -> Status {
        Status::from_bits_truncate(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, s: Status) {
        self.status.store(s.bits(), Ordering::Release);
    }

    pub fn features(&self) -> Features {
        Features::from_bits_truncate(self.features.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{align_of, size_of};

    #[test]
    fn control_region_is_exactly_4096_bytes() {
        assert_eq!(size_of::<ControlRegion>(), CONTROL_REGION_SIZE);
    }

    #[test]
    fn hot_counters_are_cache_line_isolated() {
        assert_eq!(align_of::<CacheLinePadded<AtomicU64>>(), 64);
        assert_eq!(size_of::<CacheLinePadded<AtomicU64>>(), 64);
    }

    #[test]
    fn init_sets_magic_and_version() {
        let cr = ControlRegion::zeroed();
        cr.init(4096, 0x0100_0000, 4096 + 0x0100_0000, 1 << 20);
        assert_eq!(cr.magic.load(Ordering::Relaxed), crate::consts::PVGPU_MAGIC);
        assert_eq!(cr.version.load(Ordering::Relaxed), crate::consts::PVGPU_VERSION);
        assert!(cr.status().contains(Status::READY));
        assert_eq!(cr.features(), Features::MVP);
    }

    #[test]
    fn reset_pointers_preserves_layout_and_features() {
        let cr = ControlRegion::zeroed();
        cr.init(4096, 0x0100_0000, 4096 + 0x0100_0000, 1 << 20);
        cr.producer_ptr.value.store(123, Ordering::Relaxed);
        cr.consumer_ptr.value.store(100, Ordering::Relaxed);
        cr.reset_pointers();
        assert_eq!(cr.producer_ptr.value.load(Ordering::Relaxed), 0);
        assert_eq!(cr.consumer_ptr.value.load(Ordering::Relaxed), 0);
        // Layout and features untouched by reset.
        assert_eq!(cr.ring_size.load(Ordering::Relaxed), 0x0100_0000);
        assert_eq!(cr.features(), Features::MVP);
    }
}
