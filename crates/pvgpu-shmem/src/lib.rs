//! Shared-memory substrate (`spec.md` §4.2): the command ring and heap
//! allocator that sit on top of a mapped region, plus the region
//! abstraction itself. Used by both `pvgpu-emulator` (host/consumer side)
//! and `pvgpu-miniport`/`pvgpu-umd` (guest/producer side).

pub mod error;
pub mod heap;
pub mod region;
pub mod ring;

pub use error::ShmemError;
pub use heap::HeapAllocator;
pub use region::{MmapRegion, SharedRegion, VecRegion};
pub use ring::CommandRing;
