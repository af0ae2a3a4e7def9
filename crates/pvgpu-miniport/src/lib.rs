//! Guest kernel-mode broker (`spec.md` §4.4): maps the device's shared
//! memory, verifies magic/version, fields the UMD escape interface, and
//! bridges BAR0 interrupts to fence-completion notifications.
//!
//! This crate is ordinary (non-`no_std`) Rust — see `bar0::Bar0Port` for how
//! the real MMIO/IRQL-specific pieces are kept behind a trait so the same
//! logic is testable on the host.

pub mod bar0;
pub mod device;
pub mod display;
pub mod error;
pub mod escape;

pub use bar0::Bar0Port;
pub use device::{FenceNotification, Miniport};
pub use display::DisplayShadow;
pub use error::MiniportError;
