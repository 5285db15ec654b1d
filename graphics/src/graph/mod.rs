//! Render graph.
//!
//! A render graph is declared anew every frame: a sequence of passes, each
//! naming the virtual resources it reads and writes and the state it needs
//! them in. The graph then works out everything in between:
//!
//! - graph-owned textures and buffers are taken from ring-aged pools
//! - state transitions and cross-queue ownership transfers become barriers
//! - cross-queue edges become semaphores between submissions
//! - render passes get cached render pass and framebuffer objects
//!
//! Declaration order is execution order; passes are never reordered.
//!
//! # Lifecycle
//!
//! ```text
//! Declaring --compile--> Compiled --evaluate--> Evaluated
//!     ^                                             |
//!     +---------------- clean_up / reset -----------+
//! ```
//!
//! # Example
//!
//! ```ignore
//! let mut graph = RenderGraph::new();
//! graph.create_texture("hdr", hdr_descriptor);
//! graph.import_swapchain_image("backbuffer", &image);
//!
//! graph.add_fn_pass(
//!     &ctx,
//!     "scene",
//!     |builder| {
//!         builder
//!             .render()
//!             .clear_texture("hdr", ResourceState::COLOR_ATTACHMENT, ClearValue::BLACK);
//!     },
//!     |resources, recorder| {
//!         // bind, draw...
//!         Ok(())
//!     },
//! );
//! graph.add_pass(&ctx, "tonemap", Tonemap::default());
//!
//! graph.compile(&mut ctx)?;
//! graph.evaluate(&mut ctx)?;
//! graph.clean_up(&mut ctx);
//! ```

mod builder;
mod compiler;
mod registry;
mod statistics;

use std::time::Instant;

pub use builder::{PassBuilder, PassNode};
pub use registry::{PassRegistry, VirtualKind};
pub use statistics::{GraphStatistics, PassTiming};

use builder::{FnPass, PassDecl};
use compiler::CompiledGraph;
use registry::{ResourceOrigin, ResourceTable};

use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::frame::SubmitBatch;
use crate::recorder::CommandRecorder;
use crate::resources::ResourceHandle;
use crate::swapchain::SwapchainImage;
use crate::sync::{AccessFlags, ImageLayout, PipelineStages, ResourceState};
use crate::types::{BufferDescriptor, QueueKind, TextureDescriptor};

/// Handle to a pass in the render graph.
///
/// `PassHandle` is `Copy` and cheap to pass around. It is only valid within
/// the `RenderGraph` that created it, until the next clean-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassHandle(u32);

impl PassHandle {
    fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Position of the pass in declaration order.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where a graph is in its per-frame lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Accepting resources and passes.
    Declaring,
    /// Barriers, semaphores and render passes are resolved.
    Compiled,
    /// Commands are recorded and submitted.
    Evaluated,
}

/// Command buffers submitted together on one queue.
#[derive(Debug)]
struct PendingSubmit {
    queue: QueueKind,
    batch: SubmitBatch,
}

/// The render graph of one frame.
pub struct RenderGraph {
    state: GraphState,
    passes: Vec<PassDecl>,
    resources: ResourceTable,
    compiled: Option<CompiledGraph>,
    statistics: GraphStatistics,
}

impl Default for RenderGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            state: GraphState::Declaring,
            passes: Vec::new(),
            resources: ResourceTable::default(),
            compiled: None,
            statistics: GraphStatistics::default(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GraphState {
        self.state
    }

    /// Number of declared passes.
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Name of a declared pass.
    pub fn pass_name(&self, pass: PassHandle) -> &str {
        &self.passes[pass.index()].name
    }

    /// Queue a declared pass runs on.
    pub fn pass_queue(&self, pass: PassHandle) -> QueueKind {
        self.passes[pass.index()].queue
    }

    /// Earlier passes whose writes `pass` depends on.
    pub fn dependencies(&self, pass: PassHandle) -> impl Iterator<Item = PassHandle> + '_ {
        self.passes[pass.index()]
            .dependencies
            .iter()
            .map(|&index| PassHandle::new(index))
    }

    /// Counters of the last compile and evaluate.
    pub fn statistics(&self) -> &GraphStatistics {
        &self.statistics
    }

    fn assert_declaring(&self, operation: &str) {
        assert_eq!(
            self.state,
            GraphState::Declaring,
            "{} on a render graph that is already compiled",
            operation
        );
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Make a caller-owned texture available under `name`, currently in
    /// `initial_state`.
    pub fn import_texture(
        &mut self,
        name: &str,
        texture: ResourceHandle,
        initial_state: ResourceState,
    ) -> &mut Self {
        self.assert_declaring("import_texture");
        self.resources.declare(
            name,
            VirtualKind::Texture,
            ResourceOrigin::Imported {
                handle: texture,
                initial_state,
            },
        );
        self
    }

    /// Make a caller-owned buffer available under `name`, currently in
    /// `initial_state`.
    pub fn import_buffer(
        &mut self,
        name: &str,
        buffer: ResourceHandle,
        initial_state: ResourceState,
    ) -> &mut Self {
        self.assert_declaring("import_buffer");
        self.resources.declare(
            name,
            VirtualKind::Buffer,
            ResourceOrigin::Imported {
                handle: buffer,
                initial_state,
            },
        );
        self
    }

    /// Import an acquired swapchain image.
    ///
    /// The first pass using the image waits on its acquire semaphore, the
    /// last one signals its present semaphore, and the image is left in
    /// [`ResourceState::PRESENT`].
    pub fn import_swapchain_image(&mut self, name: &str, image: &SwapchainImage) -> &mut Self {
        self.import_texture(
            name,
            image.texture,
            ResourceState::new(
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                AccessFlags::empty(),
                ImageLayout::Undefined,
            ),
        );
        let id = self.resources.lookup(name, VirtualKind::Texture);
        let resource = self.resources.get_mut(id);
        resource.export = Some(ResourceState::PRESENT);
        resource.swapchain = Some(*image);
        self
    }

    /// Declare a graph-owned texture, taken from the texture pool at compile.
    pub fn create_texture(&mut self, name: &str, descriptor: TextureDescriptor) -> &mut Self {
        self.assert_declaring("create_texture");
        self.resources.declare(
            name,
            VirtualKind::Texture,
            ResourceOrigin::Texture(descriptor),
        );
        self
    }

    /// Declare a graph-owned buffer, taken from the buffer pool at compile.
    pub fn create_buffer(&mut self, name: &str, descriptor: BufferDescriptor) -> &mut Self {
        self.assert_declaring("create_buffer");
        self.resources
            .declare(name, VirtualKind::Buffer, ResourceOrigin::Buffer(descriptor));
        self
    }

    /// Leave a texture in `final_state` after the last pass using it.
    pub fn export_texture(&mut self, name: &str, final_state: ResourceState) -> &mut Self {
        self.assert_declaring("export_texture");
        let id = self.resources.lookup(name, VirtualKind::Texture);
        self.resources.get_mut(id).export = Some(final_state);
        self
    }

    /// Leave a buffer in `final_state` after the last pass using it.
    pub fn export_buffer(&mut self, name: &str, final_state: ResourceState) -> &mut Self {
        self.assert_declaring("export_buffer");
        let id = self.resources.lookup(name, VirtualKind::Buffer);
        self.resources.get_mut(id).export = Some(final_state);
        self
    }

    // ------------------------------------------------------------------
    // Passes
    // ------------------------------------------------------------------

    /// Add a pass. Its [`setup`](PassNode::setup) runs immediately.
    ///
    /// # Panics
    ///
    /// Panics if the graph is already compiled, or if setup uses a name that
    /// was never declared or reads a resource nothing wrote yet.
    pub fn add_pass(
        &mut self,
        ctx: &RenderContext,
        name: &str,
        node: impl PassNode + 'static,
    ) -> PassHandle {
        self.assert_declaring("add_pass");
        let mut node: Box<dyn PassNode> = Box::new(node);
        let index = self.passes.len();
        let mut builder = PassBuilder::new(ctx, &mut self.resources, index, name);
        node.setup(&mut builder);
        let decl = builder.finish(node);
        self.passes.push(decl);
        PassHandle::new(index)
    }

    /// Add a pass from a setup closure and an execute closure.
    pub fn add_fn_pass<S, E>(
        &mut self,
        ctx: &RenderContext,
        name: &str,
        setup: S,
        execute: E,
    ) -> PassHandle
    where
        S: FnOnce(&mut PassBuilder<'_>),
        E: FnMut(&PassRegistry<'_>, &mut CommandRecorder<'_>) -> Result<(), GraphicsError>
            + 'static,
    {
        self.assert_declaring("add_fn_pass");
        let index = self.passes.len();
        let mut builder = PassBuilder::new(ctx, &mut self.resources, index, name);
        setup(&mut builder);
        let decl = builder.finish(Box::new(FnPass { execute }));
        self.passes.push(decl);
        PassHandle::new(index)
    }

    // ------------------------------------------------------------------
    // Compile / evaluate
    // ------------------------------------------------------------------

    /// Resolve resources and compute all synchronization.
    ///
    /// # Panics
    ///
    /// Panics if called twice, or outside a frame.
    pub fn compile(&mut self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        assert_eq!(
            self.state,
            GraphState::Declaring,
            "render graph compiled twice"
        );
        assert!(ctx.is_in_frame(), "render graph compiled outside of a frame");
        ringframe_core::profile_scope!("graph compile");

        let start = Instant::now();
        let compiled = compiler::compile(ctx, &self.passes, &mut self.resources)?;
        self.statistics = GraphStatistics {
            pass_count: self.passes.len(),
            resource_count: self.resources.len(),
            barrier_count: compiled.barrier_count,
            ownership_transfers: compiled.ownership_transfers,
            semaphore_count: compiled.semaphore_count,
            submission_count: 0,
            compile_time: start.elapsed(),
            pass_timings: Vec::new(),
        };
        self.compiled = Some(compiled);
        self.state = GraphState::Compiled;
        Ok(())
    }

    /// Record every pass and submit the work.
    ///
    /// Consecutive passes on one queue share a submission until a pass
    /// waits on or signals a semaphore. An error from a pass's execute
    /// aborts evaluation and is returned as is.
    ///
    /// # Panics
    ///
    /// Panics unless the graph is compiled and not yet evaluated.
    pub fn evaluate(&mut self, ctx: &mut RenderContext) -> Result<(), GraphicsError> {
        assert_eq!(
            self.state,
            GraphState::Compiled,
            "render graph evaluated without a fresh compile"
        );
        ringframe_core::profile_scope!("graph evaluate");

        let compiled = match &self.compiled {
            Some(compiled) => compiled,
            None => panic!("compiled render graph lost its compile output"),
        };
        let mut submissions = 0;

        for prologue in &compiled.prologues {
            let mut recorder = CommandRecorder::begin(ctx, prologue.queue)?;
            recorder.pipeline_barrier(&prologue.barriers.textures, &prologue.barriers.buffers);
            let cmd = recorder.finish()?;
            ctx.submit(
                prologue.queue,
                &SubmitBatch {
                    command_buffers: vec![cmd],
                    signals: prologue.signals.clone(),
                    ..SubmitBatch::default()
                },
            )?;
            submissions += 1;
        }

        let registry = PassRegistry {
            table: &self.resources,
        };
        let mut pending: Vec<PendingSubmit> = Vec::new();
        let mut open: [Option<usize>; 3] = [None; 3];
        let mut timings = Vec::with_capacity(self.passes.len());

        for (decl, pass) in self.passes.iter_mut().zip(&compiled.passes) {
            ringframe_core::profile_scope_dynamic!(decl.name.as_str());
            let start = Instant::now();
            let mut recorder = CommandRecorder::begin(ctx, decl.queue)?;
            recorder.begin_label(&decl.name);
            recorder.pipeline_barrier(&pass.pre.textures, &pass.pre.buffers);
            if let Some(target) = &pass.target {
                recorder.begin_render_pass(
                    target.render_pass,
                    target.framebuffer,
                    &target.clear_values,
                );
            }
            if let Err(e) = decl.node.execute(&registry, &mut recorder) {
                log::error!("Render graph pass '{}' failed: {}", decl.name, e);
                return Err(e);
            }
            if pass.target.is_some() {
                recorder.end_render_pass();
            }
            recorder.pipeline_barrier(&pass.post.textures, &pass.post.buffers);
            recorder.end_label();
            let cmd = recorder.finish()?;
            timings.push(PassTiming {
                name: decl.name.clone(),
                queue: decl.queue,
                record_time: start.elapsed(),
            });

            let slot = &mut open[decl.queue.index()];
            let batch_index = match *slot {
                Some(index) if pass.waits.is_empty() => index,
                _ => {
                    pending.push(PendingSubmit {
                        queue: decl.queue,
                        batch: SubmitBatch::default(),
                    });
                    pending.len() - 1
                }
            };
            let batch = &mut pending[batch_index].batch;
            batch.command_buffers.push(cmd);
            batch.waits.extend_from_slice(&pass.waits);
            batch.signals.extend_from_slice(&pass.signals);
            *slot = if pass.signals.is_empty() {
                Some(batch_index)
            } else {
                None
            };
        }

        if ctx.config().signal_frame_fences {
            for queue in QueueKind::ALL {
                if let Some(last) = pending.iter_mut().rev().find(|p| p.queue == queue) {
                    last.batch.signal_fence = true;
                }
            }
        }
        for submit in &pending {
            ctx.submit(submit.queue, &submit.batch)?;
        }
        submissions += pending.len();

        let frame = ctx.frame_number();
        for last in &compiled.final_uses {
            let resources = &mut ctx.resources;
            let (state, owner, last_frame) = match last.kind {
                VirtualKind::Texture => {
                    let record = resources.texture_mut(last.handle);
                    (&mut record.state, &mut record.owner, &mut record.last_frame)
                }
                VirtualKind::Buffer => {
                    let record = resources.buffer_mut(last.handle);
                    (&mut record.state, &mut record.owner, &mut record.last_frame)
                }
            };
            *state = last.state;
            *owner = Some(last.queue);
            *last_frame = Some(frame);
        }

        self.statistics.submission_count = submissions;
        self.statistics.pass_timings = timings;
        self.state = GraphState::Evaluated;
        Ok(())
    }

    /// Return graph-owned resources to their pools, age every cache the
    /// graph uses and start declaring again.
    ///
    /// Call once per frame, after evaluate. Statistics of the last run are
    /// kept.
    pub fn clean_up(&mut self, ctx: &mut RenderContext) {
        ringframe_core::profile_scope!("graph clean-up");
        let (resources, caches) = ctx.split_mut();
        caches.advance(resources);
        self.passes.clear();
        self.resources.clear();
        self.compiled = None;
        self.state = GraphState::Declaring;
    }

    /// [`clean_up`](Self::clean_up), also clearing statistics.
    pub fn reset(&mut self, ctx: &mut RenderContext) {
        self.clean_up(ctx);
        self.statistics = GraphStatistics::default();
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("state", &self.state)
            .field("passes", &self.passes)
            .field("resources", &self.resources.len())
            .finish()
    }
}
