//! Protocol-wide constants: magic/version, default sizing, and PCI identity.
//!
//! Values are reproduced bit-for-bit from the original `pvgpu_protocol.h`
//! header so that guest, host, and any future non-Rust component agree on
//! the wire.

/// `"PVGP"` read as a little-endian u32.
pub const PVGPU_MAGIC: u32 = 0x5056_4750;

pub const PVGPU_VERSION_MAJOR: u32 = 1;
pub const PVGPU_VERSION_MINOR: u32 = 0;

/// `major << 16 | minor`.
pub const fn version(major: u32, minor: u32) -> u32 {
    (major << 16) | (minor & 0xFFFF)
}

pub const PVGPU_VERSION: u32 = version(PVGPU_VERSION_MAJOR, PVGPU_VERSION_MINOR);

pub const fn version_major(v: u32) -> u32 {
    v >> 16
}

pub const fn version_minor(v: u32) -> u32 {
    v & 0xFFFF
}

/// Control region size: exactly 4 KiB (`spec.md` §3, §8 layout invariant).
pub const CONTROL_REGION_SIZE: usize = 0x1000;

/// Default command ring size: 16 MiB.
pub const DEFAULT_COMMAND_RING_SIZE: u32 = 0x0100_0000;

/// Default total shared-memory size: 256 MiB.
pub const DEFAULT_SHMEM_SIZE: u64 = 0x1000_0000;

/// Minimum allowed shared-memory size (§6 CLI/config: `shmem_size` rejected below 64 MiB).
pub const MIN_SHMEM_SIZE: u64 = 64 * 1024 * 1024;

pub const BAR0_SIZE: u64 = 0x1000;
pub const BAR2_SIZE_DEFAULT: u64 = DEFAULT_SHMEM_SIZE;

/// Heap block size: 4 KiB blocks, bitmap allocator (`spec.md` §3).
pub const HEAP_BLOCK_SIZE: u32 = 4096;
/// Maximum blocks a single heap allocator instance may track (`spec.md` §3).
pub const HEAP_MAX_BLOCKS: usize = 4096;

/// Command payloads are padded to 16-byte alignment on the ring.
pub const COMMAND_ALIGN: u32 = 16;

pub const fn align16(x: u32) -> u32 {
    (x + (COMMAND_ALIGN - 1)) & !(COMMAND_ALIGN - 1)
}

// PCI identity (`spec.md` §6).
pub const PVGPU_VENDOR_ID: u16 = 0x1AF4;
pub const PVGPU_DEVICE_ID: u16 = 0x10F0;
pub const PVGPU_SUBSYSTEM_VENDOR_ID: u16 = 0x1AF4;
pub const PVGPU_SUBSYSTEM_ID: u16 = 0x0001;
pub const PVGPU_REVISION: u8 = 0x01;
/// VGA compatible 3D controller.
pub const PVGPU_PCI_CLASS: u32 = 0x0302_00;

// BAR0 register offsets (`spec.md` §4.3).
pub const REG_VERSION: u64 = 0x00;
pub const REG_FEATURES_LO: u64 = 0x04;
pub const REG_FEATURES_HI: u64 = 0x08;
pub const REG_STATUS: u64 = 0x0C;
pub const REG_DOORBELL: u64 = 0x10;
pub const REG_IRQ_STATUS: u64 = 0x14;
pub const REG_IRQ_MASK: u64 = 0x18;
pub const REG_SHMEM_SIZE: u64 = 0x1C;
pub const REG_RING_SIZE: u64 = 0x20;
pub const REG_RESET: u64 = 0x24;

pub const MSIX_VECTOR_FENCE_COMPLETE: u16 = 0;
pub const MSIX_VECTOR_ERROR: u16 = 1;
pub const MSIX_NUM_VECTORS: u16 = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_spells_pvgp() {
        assert_eq!(&PVGPU_MAGIC.to_le_bytes(), b"PVGP");
    }

    #[test]
    fn version_roundtrips() {
        let v = version(1, 0);
        assert_eq!(v, 0x0001_0000);
        assert_eq!(version_major(v), 1);
        assert_eq!(version_minor(v), 0);
    }

    #[test]
    fn align16_rounds_up() {
        assert_eq!(align16(0), 0);
        assert_eq!(align16(1), 16);
        assert_eq!(align16(16), 16);
        assert_eq!(align16(17), 32);
    }
}
