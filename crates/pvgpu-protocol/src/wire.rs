//! Small helpers for hand-rolled little-endian struct encode/decode.
//!
//! The wire format is bit-exact and externally fixed (shared with the
//! original C header), so structs implement `WireStruct` by hand rather
//! than deriving a general-purpose serialization format. The teacher's own
//! `aero-protocol` crate takes the same no-derive, byte-exact-offset stance
//! for its `aerogpu_cmd` structs (its test suite addresses fields by
//! `core::mem::offset_of!` rather than going through a derived codec), even
//! though this workspace doesn't carry `aero-protocol`'s own source.

use crate::error::ProtocolError;

/// A fixed-size, little-endian wire struct.
pub trait WireStruct: Sized {
    /// Encoded size in bytes.
    const SIZE_BYTES: usize;

    /// Encode `self` into `out`, which must be at least `SIZE_BYTES` long.
    fn write_le(&self, out: &mut [u8]) -> Result<(), ProtocolError>;

    /// Decode from `buf`, which must be at least `SIZE_BYTES` long.
    fn read_le(buf: &[u8]) -> Result<Self, ProtocolError>;

    /// Convenience: allocate a fresh `Vec<u8>` and encode into it.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::SIZE_BYTES];
        // SIZE_BYTES is always sufficient by construction.
        self.write_le(&mut buf).expect("fixed-size buffer");
        buf
    }
}

#[inline]
pub fn need(buf_len: usize, required: usize) -> Result<(), ProtocolError> {
    if buf_len < required {
        Err(ProtocolError::BufferTooSmall {
            need: required,
            have: buf_len,
        })
    } else {
        Ok(())
    }
}

#[inline]
pub fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

#[inline]
pub fn get_i32(buf: &[u8], off: usize) -> i32 {
    i32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

#[inline]
pub fn get_u64(buf: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(buf[off..off + 8].try_into().unwrap())
}

#[inline]
pub fn get_f32(buf: &[u8], off: usize) -> f32 {
    f32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

#[inline]
pub fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn put_i32(buf: &mut [u8], off: usize, v: i32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

#[inline]
pub fn put_f32(buf: &mut [u8], off: usize, v: f32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}
