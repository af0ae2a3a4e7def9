//! Abstraction over BAR0 MMIO access (`spec.md` §4.4): the miniport reads
//! and writes device registers through this trait rather than a concrete
//! VMM's MMIO bus, so the same escape-handling logic can be driven by a
//! real guest MMIO window or, in tests, a [`pvgpu_emulator::PvgpuDevice`]
//! directly in-process.
pub trait Bar0Port: Send + Sync {
    fn read(&self, offset: u64) -> u32;
    fn write(&self, offset: u64, val: u32);
}
