//! Per-frame linear allocator for transient GPU data.
//!
//! Each frame slot owns one [`ScratchAllocator`]. Small per-frame uploads
//! (uniform blocks, dynamic vertices, indirect arguments) are bump-allocated
//! from host-visible chunks instead of creating a buffer per upload. The
//! allocator is reset when its frame slot is begun again, which is after the
//! slot's fences were waited, so the GPU is done reading every region.
//!
//! ```text
//!   chunk 0 [####|##|######......]   <- full enough, moved past
//!   chunk 1 [###|#####.........]     <- current, bump offset
//!   chunk 2 [....................]   <- kept from an earlier frame
//! ```
//!
//! Chunks are never freed while the context lives; a busy frame grows the
//! chunk list once and later frames reuse it.

use crate::resources::ResourceHandle;

/// A sub-allocation from a scratch chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScratchAllocation {
    /// Buffer backing the allocation.
    pub buffer: ResourceHandle,
    /// Byte offset into the buffer.
    pub offset: u64,
    /// Size of the allocation in bytes.
    pub size: u64,
}

impl ScratchAllocation {
    /// Get the end offset (offset + size).
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

#[derive(Debug, Clone, Copy)]
struct ScratchChunk {
    buffer: ResourceHandle,
    capacity: u64,
}

/// Chunked bump allocator, reset once per frame.
#[derive(Debug)]
pub struct ScratchAllocator {
    chunk_size: u64,
    chunks: Vec<ScratchChunk>,
    current: usize,
    write_offset: u64,
    used: u64,
}

impl ScratchAllocator {
    /// Default alignment for allocations (256 bytes).
    ///
    /// This matches the typical minimum uniform buffer offset alignment
    /// required by most GPUs.
    pub const DEFAULT_ALIGNMENT: u64 = 256;

    /// Create an allocator that grows by `chunk_size` bytes at a time.
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size,
            chunks: Vec::new(),
            current: 0,
            write_offset: 0,
            used: 0,
        }
    }

    /// Size of a regular chunk.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of chunks owned by the allocator.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Bytes handed out since the last reset, excluding padding.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Size a new chunk must have to satisfy a `size`-byte request.
    pub fn required_chunk_size(&self, size: u64) -> u64 {
        self.chunk_size.max(size)
    }

    /// Allocate from the existing chunks.
    ///
    /// Returns `None` if no remaining chunk has room; the caller then adds a
    /// chunk of at least [`required_chunk_size`](Self::required_chunk_size)
    /// bytes with [`push_chunk`](Self::push_chunk) and retries.
    pub fn allocate(&mut self, size: u64, alignment: u64) -> Option<ScratchAllocation> {
        debug_assert!(alignment.is_power_of_two(), "alignment must be power of 2");

        while let Some(chunk) = self.chunks.get(self.current) {
            let aligned_offset = align_up(self.write_offset, alignment);
            if aligned_offset + size <= chunk.capacity {
                self.write_offset = aligned_offset + size;
                self.used += size;
                return Some(ScratchAllocation {
                    buffer: chunk.buffer,
                    offset: aligned_offset,
                    size,
                });
            }
            self.current += 1;
            self.write_offset = 0;
        }
        None
    }

    /// Add a chunk backed by `buffer` and make it current.
    pub fn push_chunk(&mut self, buffer: ResourceHandle, capacity: u64) {
        self.chunks.push(ScratchChunk { buffer, capacity });
        self.current = self.chunks.len() - 1;
        self.write_offset = 0;
    }

    /// Reclaim every chunk.
    ///
    /// Only call once the GPU has finished reading this frame's allocations.
    pub fn reset(&mut self) {
        self.current = 0;
        self.write_offset = 0;
        self.used = 0;
    }

    /// Remove every chunk, returning the backing buffers for destruction.
    pub fn take_chunks(&mut self) -> Vec<ResourceHandle> {
        self.reset();
        self.chunks.drain(..).map(|chunk| chunk.buffer).collect()
    }
}

/// Align a value up to the given alignment.
#[inline]
pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceKind;
    use ringframe_core::HandleAllocator;

    fn chunk_handles(count: usize) -> Vec<ResourceHandle> {
        let mut allocator = HandleAllocator::new(2);
        (0..count)
            .map(|_| allocator.allocate(ResourceKind::Buffer))
            .collect()
    }

    #[test]
    fn test_empty_allocator_needs_chunk() {
        let mut scratch = ScratchAllocator::new(1024);
        assert!(scratch.allocate(16, 16).is_none());
        assert_eq!(scratch.required_chunk_size(16), 1024);
        assert_eq!(scratch.required_chunk_size(4096), 4096);
    }

    #[test]
    fn test_scratch_alignment() {
        let handles = chunk_handles(1);
        let mut scratch = ScratchAllocator::new(1024);
        scratch.push_chunk(handles[0], 1024);

        let alloc1 = scratch.allocate(100, 256).unwrap();
        assert_eq!(alloc1.offset, 0);
        assert_eq!(alloc1.end(), 100);

        // Next allocation should be aligned to 256
        let alloc2 = scratch.allocate(50, 256).unwrap();
        assert_eq!(alloc2.offset, 256);
        assert_eq!(scratch.used(), 150);
    }

    #[test]
    fn test_scratch_moves_to_next_chunk() {
        let handles = chunk_handles(2);
        let mut scratch = ScratchAllocator::new(512);
        scratch.push_chunk(handles[0], 512);

        scratch.allocate(400, 64).unwrap();
        assert!(scratch.allocate(200, 64).is_none());

        scratch.push_chunk(handles[1], 512);
        let alloc = scratch.allocate(200, 64).unwrap();
        assert_eq!(alloc.buffer, handles[1]);
        assert_eq!(alloc.offset, 0);
    }

    #[test]
    fn test_scratch_reset_reuses_chunks() {
        let handles = chunk_handles(2);
        let mut scratch = ScratchAllocator::new(512);
        scratch.push_chunk(handles[0], 512);
        scratch.allocate(512, 64).unwrap();
        assert!(scratch.allocate(1, 64).is_none());
        scratch.push_chunk(handles[1], 512);
        scratch.allocate(256, 64).unwrap();

        scratch.reset();
        let alloc = scratch.allocate(256, 64).unwrap();
        assert_eq!(alloc.buffer, handles[0]);
        assert_eq!(scratch.chunk_count(), 2);

        // Spills into the second chunk without growing
        let alloc = scratch.allocate(300, 64).unwrap();
        assert_eq!(alloc.buffer, handles[1]);
        assert_eq!(scratch.take_chunks(), handles);
        assert_eq!(scratch.chunk_count(), 0);
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(255, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
        assert_eq!(align_up(100, 64), 128);
    }
}
