//! Abstraction over the raw bytes backing shared memory (`spec.md` §4.2).
//!
//! Production code maps the region with `memmap2` over the file descriptor
//! or `HANDLE` the transport hands over; tests run the identical ring/heap
//! logic over a plain `Vec<u8>`, the same split the teacher's `aero-mem`
//! crate draws between `PhysicalMemory` and its in-test byte buffers.

use std::sync::atomic::{AtomicU8, Ordering};

/// A fixed-size block of memory shared between guest and host, addressed by
/// byte offset. Implementors must guarantee the backing storage stays valid
/// and at a stable address for the trait object's lifetime — both
/// [`MmapRegion`] (a live mapping) and [`VecRegion`] (owned heap storage)
/// satisfy this.
pub trait SharedRegion: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw pointer to the start of the region. Callers are responsible for
    /// bounds-checking and for not creating overlapping `&mut` accesses;
    /// the ring and heap allocator in this crate only ever hand out
    /// non-overlapping byte ranges.
    fn as_ptr(&self) -> *const u8;

    fn as_mut_ptr(&self) -> *mut u8;

    /// Copies `dst.len()` bytes starting at `offset`.
    fn read_bytes(&self, offset: usize, dst: &mut [u8]) {
        assert!(offset + dst.len() <= self.len(), "read out of bounds");
        unsafe {
            std::ptr::copy_nonoverlapping(self.as_ptr().add(offset), dst.as_mut_ptr(), dst.len());
        }
    }

    /// Copies `src` into the region starting at `offset`.
    fn write_bytes(&self, offset: usize, src: &[u8]) {
        assert!(offset + src.len() <= self.len(), "write out of bounds");
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), self.as_mut_ptr().add(offset), src.len());
        }
    }

    /// Views `len` bytes at `offset` as a byte-oriented atomic, for the
    /// handful of call sites (ring wraparound sentinel bytes) that need a
    /// single-byte atomic rather than going through [`crate::control_region`].
    fn atomic_u8_at(&self, offset: usize) -> &AtomicU8 {
        assert!(offset < self.len(), "atomic_u8_at out of bounds");
        unsafe { &*(self.as_mut_ptr().add(offset) as *const AtomicU8) }
    }
}

/// A live `mmap`ing of the shared-memory file descriptor (`spec.md` §4.2:
/// "created by the emulator device realization and mapped by both the guest
/// miniport and the out-of-process backend").
pub struct MmapRegion {
    mmap: memmap2::MmapMut,
}

impl MmapRegion {
    pub fn from_mmap(mmap: memmap2::MmapMut) -> Self {
        Self { mmap }
    }

    /// Creates and maps an anonymous region of `size` bytes. Used by the
    /// emulator when it owns shared-memory provisioning directly rather
    /// than importing an externally created descriptor.
    pub fn anonymous(size: usize) -> std::io::Result<Self> {
        Ok(Self {
            mmap: memmap2::MmapMut::map_anon(size)?,
        })
    }

    /// Creates a named POSIX shared-memory object (`shm_open`) and maps it
    /// (`spec.md` §4.2/§4.3: BAR2 must be backed by a named OS object so the
    /// out-of-process backend can map the identical pages after learning the
    /// name during the handshake).
    pub fn create_named(name: &str, size: usize) -> std::io::Result<Self> {
        let file = shm_open_file(name, libc::O_CREAT | libc::O_RDWR)?;
        file.set_len(size as u64)?;
        let mmap = unsafe { memmap2::MmapMut::map_mut(&file)? };
        Ok(Self { mmap })
    }

    /// Opens a named POSIX shared-memory object created by
    /// [`MmapRegion::create_named`] in another process — the backend's half
    /// of the handshake (`spec.md` §4.3).
    pub fn open_named(name: &str) -> std::io::Result<Self> {
        let file = shm_open_file(name, libc::O_RDWR)?;
        let mmap = unsafe { memmap2::MmapMut::map_mut(&file)? };
        Ok(Self { mmap })
    }
}

/// Opens `name` via `shm_open` with the given flags and wraps the resulting
/// descriptor as a `File` so the rest of mapping/resizing goes through the
/// ordinary `std::fs`/`memmap2` path.
fn shm_open_file(name: &str, flags: libc::c_int) -> std::io::Result<std::fs::File> {
    use std::ffi::CString;
    use std::os::fd::FromRawFd;

    let c_name = CString::new(name)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "shmem name contains a NUL byte"))?;
    let fd = unsafe { libc::shm_open(c_name.as_ptr(), flags, 0o600) };
    if fd < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(unsafe { std::fs::File::from_raw_fd(fd) })
}

/// Removes a named shared-memory object (`shm_unlink`), so the emulator can
/// clean up after itself once every mapper has detached.
pub fn unlink_named(name: &str) -> std::io::Result<()> {
    use std::ffi::CString;

    let c_name = CString::new(name)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "shmem name contains a NUL byte"))?;
    if unsafe { libc::shm_unlink(c_name.as_ptr()) } < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

impl SharedRegion for MmapRegion {
    fn len(&self) -> usize {
        self.mmap.len()
    }

    fn as_ptr(&self) -> *const u8 {
        self.mmap.as_ptr()
    }

    fn as_mut_ptr(&self) -> *mut u8 {
        self.mmap.as_ptr() as *mut u8
    }
}

/// An owned, heap-allocated region — the `VecGuestMemory`-style test double
/// used throughout this workspace's integration tests, where mapping a real
/// file descriptor would just add noise.
pub struct VecRegion {
    buf: std::cell::UnsafeCell<Vec<u8>>,
}

// SAFETY: access is mediated entirely through `SharedRegion`'s pointer-based
// API, which callers already use under the same non-overlapping-access
// discipline required by `MmapRegion`.
unsafe impl Send for VecRegion {}
unsafe impl Sync for VecRegion {}

impl VecRegion {
    pub fn new(size: usize) -> Self {
        Self {
            buf: std::cell::UnsafeCell::new(vec![0u8; size]),
        }
    }
}

impl SharedRegion for VecRegion {
    fn len(&self) -> usize {
        unsafe { (*self.buf.get()).len() }
    }

    fn as_ptr(&self) -> *const u8 {
        unsafe { (*self.buf.get()).as_ptr() }
    }

    fn as_mut_ptr(&self) -> *mut u8 {
        unsafe { (*self.buf.get()).as_mut_ptr() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_region_read_write_roundtrip() {
        let r = VecRegion::new(4096);
        r.write_bytes(16, &[1, 2, 3, 4]);
        let mut out = [0u8; 4];
        r.read_bytes(16, &mut out);
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn atomic_u8_at_observes_writes() {
        let r = VecRegion::new(4096);
        r.write_bytes(0, &[7]);
        assert_eq!(r.atomic_u8_at(0).load(Ordering::Relaxed), 7);
        r.atomic_u8_at(0).store(9, Ordering::Relaxed);
        let mut out = [0u8; 1];
        r.read_bytes(0, &mut out);
        assert_eq!(out, [9]);
    }

    #[test]
    fn named_region_is_visible_under_its_own_name() {
        let name = format!("/pvgpu-region-test-{}", std::process::id());
        let created = MmapRegion::create_named(&name, 4096).unwrap();
        created.write_bytes(0, &[1, 2, 3, 4]);

        let opened = MmapRegion::open_named(&name).unwrap();
        let mut out = [0u8; 4];
        opened.read_bytes(0, &mut out);
        assert_eq!(out, [1, 2, 3, 4]);

        drop(created);
        drop(opened);
        unlink_named(&name).unwrap();
    }

    #[test]
    #[should_panic(expected = "read out of bounds")]
    fn read_bounds_checked() {
        let r = VecRegion::new(16);
        let mut out = [0u8; 4];
        r.read_bytes(15, &mut out);
    }
}
