//! Guest user-mode driver (`spec.md` §4.5): DDI-facing device object, pipeline
//! shadow, staging buffer, and the `D3DDDICB_ESCAPE` client boundary down to
//! `pvgpu-miniport`.
//!
//! This crate is ordinary (non-`no_std`) Rust — the UMD runs in a normal
//! guest process, not a kernel driver context, so it carries no hardware
//! abstraction of its own beyond the [`EscapeClient`] trait.

pub mod caps;
pub mod device;
pub mod error;
pub mod escape_client;
pub mod handles;
pub mod resource;
pub mod shadow;
pub mod staging;

pub use device::{Device, MappedRegion};
pub use error::UmdError;
pub use escape_client::{EscapeClient, MiniportEscapeClient};
