//! Host-side emulator for the paravirtual GPU device (`spec.md` §4.3): the
//! BAR0 register model plus the IPC loop that hands command-ring activity
//! off to an out-of-process rendering backend.
//!
//! This crate models device *behavior*, not a VMM — a host process wiring up
//! a real PCI BAR delegates register reads/writes to [`device::PvgpuDevice`]
//! and spawns [`backend_loop::run`] once a backend connects.

pub mod backend_loop;
pub mod device;
pub mod error;
pub mod irq;

pub use device::PvgpuDevice;
pub use error::EmulatorError;
pub use irq::{CountingIrqSink, IrqSink};
