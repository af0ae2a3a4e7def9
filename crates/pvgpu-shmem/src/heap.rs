//! Bitmap allocator for the heap region of shared memory (`spec.md` §3, §4.3):
//! backs `ALLOC_HEAP`/`FREE_HEAP` escape calls on the host side. One
//! allocator instance tracks one heap region; blocks are fixed-size
//! (`HEAP_BLOCK_SIZE`), up to `HEAP_MAX_BLOCKS` of them.

use std::collections::HashMap;

use pvgpu_protocol::consts::{HEAP_BLOCK_SIZE, HEAP_MAX_BLOCKS};

use crate::error::ShmemError;

pub struct HeapAllocator {
    num_blocks: usize,
    /// One bit per block; `1` means allocated. Packed into `u64` words the
    /// same way the original bitmap heap does, so a full allocator is a
    /// handful of cache lines rather than one byte per block.
    bitmap: Vec<u64>,
    /// Maps an allocation's starting block index to its block count, so
    /// `free` can release the exact run `alloc` reserved without the caller
    /// having to remember the size.
    allocations: HashMap<usize, usize>,
}

impl HeapAllocator {
    pub fn new(heap_size: u32) -> Self {
        let num_blocks = ((heap_size / HEAP_BLOCK_SIZE) as usize).min(HEAP_MAX_BLOCKS);
        let words = num_blocks.div_ceil(64).max(1);
        Self {
            num_blocks,
            bitmap: vec![0u64; words],
            allocations: HashMap::new(),
        }
    }

    fn is_free(&self, i: usize) -> bool {
        self.bitmap[i / 64] & (1 << (i % 64)) == 0
    }

    fn set_used(&mut self, i: usize) {
        self.bitmap[i / 64] |= 1 << (i % 64);
    }

    fn set_free(&mut self, i: usize) {
        self.bitmap[i / 64] &= !(1 << (i % 64));
    }

    /// Allocates a byte range at least `size` bytes long, aligned to
    /// `align`. Returns the byte offset within the heap region, or
    /// `Err(HeapExhausted)` if no run of free blocks satisfies the request —
    /// the caller reports this back to the guest as `OUT_OF_MEMORY`
    /// (`spec.md` §7).
    pub fn alloc(&mut self, size: u32, align: u32) -> Result<u32, ShmemError> {
        let blocks_needed = (size.max(1)).div_ceil(HEAP_BLOCK_SIZE) as usize;
        let align = align.max(1);
        // Every block start is already HEAP_BLOCK_SIZE-aligned; only
        // alignments coarser than that constrain which block indices work.
        let align_blocks = if align as u64 > HEAP_BLOCK_SIZE as u64 {
            (align as u64).div_ceil(HEAP_BLOCK_SIZE as u64) as usize
        } else {
            1
        };

        let mut start = 0usize;
        while start + blocks_needed <= self.num_blocks {
            if start % align_blocks != 0 {
                start += 1;
                continue;
            }
            if (start..start + blocks_needed).all(|i| self.is_free(i)) {
                for i in start..start + blocks_needed {
                    self.set_used(i);
                }
                self.allocations.insert(start, blocks_needed);
                return Ok((start as u32) * HEAP_BLOCK_SIZE);
            }
            start += 1;
        }
        Err(ShmemError::HeapExhausted { size, align })
    }

    pub fn free(&mut self, offset: u32) -> Result<(), ShmemError> {
        if offset % HEAP_BLOCK_SIZE != 0 {
            return Err(ShmemError::UnknownAllocation { offset });
        }
        let start = (offset / HEAP_BLOCK_SIZE) as usize;
        let blocks = self
            .allocations
            .remove(&start)
            .ok_or(ShmemError::UnknownAllocation { offset })?;
        for i in start..start + blocks {
            self.set_free(i);
        }
        Ok(())
    }

    pub fn allocated_blocks(&self) -> usize {
        self.allocations.values().sum()
    }

    pub fn capacity_blocks(&self) -> usize {
        self.num_blocks
    }
}
