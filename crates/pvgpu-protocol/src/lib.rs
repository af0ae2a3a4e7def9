//! Wire-format types shared by every component that speaks the paravirtual
//! GPU protocol: the emulator device, the guest miniport, and the guest
//! user-mode driver.
//!
//! This crate is deliberately `no_std`-friendly in spirit (no heap
//! allocation in hot-path types, no I/O) even though it does not declare
//! `#![no_std]` itself, since `pvgpu-miniport` links it from a kernel-mode
//! context. Everything here is plain data plus pure encode/decode logic.

pub mod commands;
pub mod consts;
pub mod control_region;
pub mod error;
pub mod escape;
pub mod header;
pub mod ipc;
pub mod resource;
pub mod wire;

pub use control_region::{ControlRegion, Features, Status};
pub use error::{ProtocolError, PvgpuErrorCode};
pub use header::{CommandFlags, CommandHeader, CommandType};
pub use wire::WireStruct;
