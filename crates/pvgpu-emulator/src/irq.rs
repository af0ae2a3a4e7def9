//! Interrupt delivery, abstracted away from any particular VMM's IRQ chip
//! (`spec.md` §4.3: MSI-X with legacy-line fallback).

/// Delivers a single interrupt to the guest. A real integration implements
/// this over the VMM's MSI-X/legacy IRQ plumbing; tests use
/// [`CountingIrqSink`].
pub trait IrqSink: Send + Sync {
    /// `vector` is one of the `MSIX_VECTOR_*` constants in
    /// `pvgpu_protocol::consts`. Implementations that only have a legacy
    /// line available should collapse every vector onto it.
    fn raise(&self, vector: u16);
}

#[derive(Default)]
pub struct CountingIrqSink {
    count: std::sync::atomic::AtomicUsize,
    last_vector: std::sync::atomic::AtomicU16,
}

impl IrqSink for CountingIrqSink {
    fn raise(&self, vector: u16) {
        self.count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.last_vector.store(vector, std::sync::atomic::Ordering::Relaxed);
    }
}

impl CountingIrqSink {
    pub fn count(&self) -> usize {
        self.count.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn last_vector(&self) -> u16 {
        self.last_vector.load(std::sync::atomic::Ordering::Relaxed)
    }
}
