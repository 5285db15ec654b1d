//! Frame slots and the frame ring.
//!
//! GPU commands execute asynchronously: when the CPU records frame `f + 1`
//! the GPU may still be working on frame `f`. Every per-frame object
//! (command pools, scratch memory, semaphores) therefore exists once per
//! frame slot, and objects destroyed during a frame are parked in that
//! slot's deferred queue until the slot comes around again.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                         FrameRing                         │
//! │  ┌──────────────┐  ┌──────────────┐                       │
//! │  │   Frame 0    │  │   Frame 1    │  ...  (N slots)       │
//! │  │ pools/fences │  │ pools/fences │                       │
//! │  │ scratch      │  │ scratch      │                       │
//! │  │ deferred     │  │ deferred     │                       │
//! │  └──────────────┘  └──────────────┘                       │
//! └───────────────────────────────────────────────────────────┘
//!
//! Frame::begin (slot i reused):
//!   1. wait + reset slot i's fences   <- only steady-state CPU stall
//!   2. reset command pools, scratch, semaphores
//!   3. destroy slot i's deferred objects
//!   4. hand pooled descriptor sets back to their layouts
//! ```

mod deferred;

pub use deferred::DeferredObject;

use crate::backend::{
    GpuBackend, GpuCommandBuffer, GpuCommandPool, GpuFence, GpuSemaphore, SubmitInfo,
};
use crate::error::GraphicsError;
use crate::resources::{ResourceHandle, ScratchAllocator};
use crate::sync::PipelineStages;
use crate::types::QueueKind;

/// Index of a semaphore in the current frame slot's semaphore pool.
///
/// Only meaningful within the frame it was allocated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemaphoreId(u32);

/// A batch of command buffers for one queue submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitBatch {
    /// Command buffers, executed in order.
    pub command_buffers: Vec<GpuCommandBuffer>,
    /// Semaphores to wait on before the given stages.
    pub waits: Vec<(SemaphoreId, PipelineStages)>,
    /// Semaphores to signal on completion.
    pub signals: Vec<SemaphoreId>,
    /// Attach a frame fence to the submission.
    pub signal_fence: bool,
}

#[derive(Debug)]
struct QueueCommands {
    pool: GpuCommandPool,
    buffers: Vec<GpuCommandBuffer>,
    used: usize,
}

/// Per-slot state of the frame ring.
#[derive(Debug)]
pub struct Frame {
    index: usize,
    queues: [Option<QueueCommands>; 3],
    fences: Vec<GpuFence>,
    fences_used: usize,
    semaphores: Vec<GpuSemaphore>,
    semaphores_used: usize,
    scratch: ScratchAllocator,
    deferred: Vec<DeferredObject>,
    returned_sets: Vec<(ResourceHandle, ResourceHandle)>,
    submissions: usize,
    /// Queues whose latest submission this frame carries no fence.
    unfenced: [bool; 3],
}

impl Frame {
    /// Create an empty slot. Backend objects are created lazily.
    pub fn new(index: usize, scratch_chunk_size: u64) -> Self {
        Self {
            index,
            queues: [None, None, None],
            fences: Vec::new(),
            fences_used: 0,
            semaphores: Vec::new(),
            semaphores_used: 0,
            scratch: ScratchAllocator::new(scratch_chunk_size),
            deferred: Vec::new(),
            returned_sets: Vec::new(),
            submissions: 0,
            unfenced: [false; 3],
        }
    }

    /// Position of the slot in the ring.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Make the slot reusable.
    ///
    /// Waits for every fence submitted the last time the slot was used, then
    /// resets per-frame allocators and destroys the deferred objects. Returns
    /// the `(layout, set)` pairs of descriptor sets that may now be reused.
    ///
    /// A failing fence wait means the device is lost and is not retried.
    pub fn begin(
        &mut self,
        backend: &dyn GpuBackend,
    ) -> Result<Vec<(ResourceHandle, ResourceHandle)>, GraphicsError> {
        ringframe_core::profile_scope!("frame_begin");

        if self.fences_used > 0 {
            let fences: Vec<&GpuFence> = self.fences[..self.fences_used].iter().collect();
            if let Err(e) = backend.wait_fences(&fences) {
                log::error!("Frame {}: fence wait failed: {}", self.index, e);
                return Err(GraphicsError::DeviceLost);
            }
            backend.reset_fences(&fences)?;
            self.fences_used = 0;
        }

        for commands in self.queues.iter_mut().flatten() {
            backend.reset_command_pool(&commands.pool)?;
            commands.used = 0;
        }
        self.semaphores_used = 0;
        self.submissions = 0;
        self.unfenced = [false; 3];
        self.scratch.reset();

        if !self.deferred.is_empty() {
            log::trace!(
                "Frame {}: destroying {} deferred objects",
                self.index,
                self.deferred.len()
            );
        }
        for object in self.deferred.drain(..) {
            object.destroy(backend);
        }

        Ok(std::mem::take(&mut self.returned_sets))
    }

    /// Get a command buffer for `queue`, reusing one from an earlier frame
    /// when available. The buffer is not begun.
    pub fn command_buffer(
        &mut self,
        backend: &dyn GpuBackend,
        queue: QueueKind,
    ) -> Result<GpuCommandBuffer, GraphicsError> {
        let commands = match &mut self.queues[queue.index()] {
            Some(commands) => commands,
            slot @ None => slot.insert(QueueCommands {
                pool: backend.create_command_pool(queue)?,
                buffers: Vec::new(),
                used: 0,
            }),
        };

        if commands.used == commands.buffers.len() {
            let cmd = backend.allocate_command_buffer(&commands.pool)?;
            commands.buffers.push(cmd);
        }
        let cmd = commands.buffers[commands.used];
        commands.used += 1;
        Ok(cmd)
    }

    /// Get an unsignaled semaphore for this frame.
    pub fn semaphore(&mut self, backend: &dyn GpuBackend) -> Result<SemaphoreId, GraphicsError> {
        if self.semaphores_used == self.semaphores.len() {
            self.semaphores.push(backend.create_semaphore()?);
        }
        let id = SemaphoreId(self.semaphores_used as u32);
        self.semaphores_used += 1;
        Ok(id)
    }

    /// Resolve a semaphore id allocated this frame.
    ///
    /// # Panics
    ///
    /// Panics if the id was not allocated during the current frame.
    pub fn semaphore_ref(&self, id: SemaphoreId) -> &GpuSemaphore {
        assert!(
            (id.0 as usize) < self.semaphores_used,
            "semaphore {:?} was not allocated this frame",
            id
        );
        &self.semaphores[id.0 as usize]
    }

    /// Submit a batch to `queue`, attaching a fresh slot fence if requested.
    pub fn submit(
        &mut self,
        backend: &dyn GpuBackend,
        queue: QueueKind,
        batch: &SubmitBatch,
    ) -> Result<(), GraphicsError> {
        ringframe_core::profile_scope!("queue_submit");

        let fence_index = if batch.signal_fence {
            if self.fences_used == self.fences.len() {
                self.fences.push(backend.create_fence(false)?);
            }
            self.fences_used += 1;
            Some(self.fences_used - 1)
        } else {
            None
        };

        let info = SubmitInfo {
            command_buffers: batch.command_buffers.clone(),
            wait_semaphores: batch
                .waits
                .iter()
                .map(|(id, stages)| (self.semaphore_ref(*id), *stages))
                .collect(),
            signal_semaphores: batch
                .signals
                .iter()
                .map(|id| self.semaphore_ref(*id))
                .collect(),
            fence: fence_index.map(|i| &self.fences[i]),
        };
        backend.submit(queue, &info)?;
        self.submissions += 1;
        self.unfenced[queue.index()] = fence_index.is_none();
        Ok(())
    }

    /// Returns true if at least one submission this frame carries a fence.
    pub fn is_fenced(&self) -> bool {
        self.fences_used > 0
    }

    /// Queues with work submitted after their last fenced submission.
    pub fn unfenced_queues(&self) -> impl Iterator<Item = QueueKind> + '_ {
        QueueKind::ALL
            .into_iter()
            .filter(|queue| self.unfenced[queue.index()])
    }

    /// Number of submissions made this frame.
    pub fn submission_count(&self) -> usize {
        self.submissions
    }

    /// Park an object until this slot is begun again.
    pub fn defer(&mut self, object: DeferredObject) {
        log::trace!("Frame {}: deferring {}", self.index, object.kind_name());
        self.deferred.push(object);
    }

    /// Return a descriptor set to its layout's free list once this slot is
    /// begun again.
    pub fn defer_descriptor_set_return(&mut self, layout: ResourceHandle, set: ResourceHandle) {
        self.returned_sets.push((layout, set));
    }

    /// Number of objects waiting for destruction.
    pub fn pending_destructions(&self) -> usize {
        self.deferred.len()
    }

    /// The slot's scratch allocator.
    pub fn scratch(&self) -> &ScratchAllocator {
        &self.scratch
    }

    /// The slot's scratch allocator, mutably.
    pub fn scratch_mut(&mut self) -> &mut ScratchAllocator {
        &mut self.scratch
    }

    /// Wait for outstanding work and destroy everything the slot owns.
    ///
    /// Returned descriptor sets are handed back to the caller as in
    /// [`begin`](Self::begin).
    pub fn destroy(
        &mut self,
        backend: &dyn GpuBackend,
    ) -> Result<Vec<(ResourceHandle, ResourceHandle)>, GraphicsError> {
        let returned = self.begin(backend)?;
        for commands in self.queues.iter_mut().filter_map(Option::take) {
            backend.destroy_command_pool(commands.pool);
        }
        for fence in self.fences.drain(..) {
            backend.destroy_fence(fence);
        }
        for semaphore in self.semaphores.drain(..) {
            backend.destroy_semaphore(semaphore);
        }
        Ok(returned)
    }
}

/// Ring of [`Frame`] slots, advanced once per rendered frame.
#[derive(Debug)]
pub struct FrameRing {
    frames: Vec<Frame>,
    current: usize,
    frame_number: u64,
}

impl FrameRing {
    /// Create a ring of `frames_in_flight` slots.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is zero.
    pub fn new(frames_in_flight: usize, scratch_chunk_size: u64) -> Self {
        assert!(frames_in_flight > 0, "frame ring needs at least one slot");
        Self {
            frames: (0..frames_in_flight)
                .map(|i| Frame::new(i, scratch_chunk_size))
                .collect(),
            current: 0,
            frame_number: 0,
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false; a ring has at least one slot.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Index of the current slot.
    pub fn index(&self) -> usize {
        self.current
    }

    /// Number of completed [`advance`](Self::advance) calls.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// The current slot.
    pub fn current(&self) -> &Frame {
        &self.frames[self.current]
    }

    /// The current slot, mutably.
    pub fn current_mut(&mut self) -> &mut Frame {
        &mut self.frames[self.current]
    }

    /// Move to the next slot.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.frames.len();
        self.frame_number += 1;
    }

    /// Every slot, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Frame> {
        self.frames.iter_mut()
    }

    /// Every slot.
    pub fn iter(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter()
    }
}
