//! Graph compilation.
//!
//! Compilation walks the passes once, in declaration order, tracking for
//! every virtual resource the state it was last used in, the queue that used
//! it and the pass that did. Each declared access is compared against that
//! record:
//!
//! | Previous use | Barrier emitted |
//! |--------------|-----------------|
//! | none, graph-owned | discard: layout `Undefined` to the new state |
//! | other queue family | release after the source pass, acquire before this pass |
//! | other queue, same family | plain barrier before this pass |
//! | same queue | plain barrier if [`ResourceState::needs_barrier_to`] |
//!
//! Every cross-queue edge also gets a binary semaphore, signaled by the
//! source pass's submission and waited on by this pass's. Passes are never
//! reordered.
//!
//! Edges only exist within one frame. A pooled object is therefore taken for
//! a graph-owned resource only if its last user ran on the queue of the
//! resource's first pass, where a plain barrier orders the two, or if the
//! frame of that last use has been retired by its fences.

use std::collections::HashMap;

use super::builder::PassDecl;
use super::registry::{ResourceOrigin, ResourceTable, VirtualId, VirtualKind};
use crate::context::{FramebufferKey, GpuResources, RenderContext};
use crate::error::GraphicsError;
use crate::frame::SemaphoreId;
use crate::resources::ResourceHandle;
use crate::sync::{
    AccessFlags, BufferBarrier, ImageLayout, PipelineStages, QueueTransfer, ResourceState,
    SubresourceRange, TextureBarrier,
};
use crate::types::{
    AttachmentDescription, ClearValue, Extent3d, LoadOp, QueueKind, RenderPassLayout, StoreOp,
};

/// Render pass instance opened around a render pass's execute.
#[derive(Debug, Clone)]
pub(crate) struct RenderTarget {
    pub(crate) render_pass: ResourceHandle,
    pub(crate) framebuffer: ResourceHandle,
    pub(crate) extent: Extent3d,
    pub(crate) clear_values: Vec<ClearValue>,
}

/// Barriers recorded on one side of a pass.
#[derive(Debug, Clone, Default)]
pub(crate) struct BarrierBatch {
    pub(crate) textures: Vec<TextureBarrier>,
    pub(crate) buffers: Vec<BufferBarrier>,
}

impl BarrierBatch {
    pub(crate) fn len(&self) -> usize {
        self.textures.len() + self.buffers.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&mut self, kind: VirtualKind, handle: ResourceHandle, barrier: Barrier) {
        match kind {
            VirtualKind::Texture => self.textures.push(TextureBarrier {
                texture: handle,
                src: barrier.src,
                dst: barrier.dst,
                range: SubresourceRange::ALL,
                transfer: barrier.transfer,
            }),
            VirtualKind::Buffer => self.buffers.push(BufferBarrier {
                buffer: handle,
                src: barrier.src,
                dst: barrier.dst,
                transfer: barrier.transfer,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Barrier {
    src: ResourceState,
    dst: ResourceState,
    transfer: Option<QueueTransfer>,
}

/// Everything evaluation needs for one pass.
#[derive(Debug, Clone, Default)]
pub(crate) struct CompiledPass {
    pub(crate) pre: BarrierBatch,
    pub(crate) post: BarrierBatch,
    pub(crate) target: Option<RenderTarget>,
    pub(crate) waits: Vec<(SemaphoreId, PipelineStages)>,
    pub(crate) signals: Vec<SemaphoreId>,
}

/// Releases of imported resources still owned by another queue family,
/// recorded and submitted on that queue before any pass.
#[derive(Debug, Clone)]
pub(crate) struct Prologue {
    pub(crate) queue: QueueKind,
    pub(crate) barriers: BarrierBatch,
    pub(crate) signals: Vec<SemaphoreId>,
}

/// State a resource is left in once the graph ran.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FinalUse {
    pub(crate) kind: VirtualKind,
    pub(crate) handle: ResourceHandle,
    pub(crate) state: ResourceState,
    pub(crate) queue: QueueKind,
}

/// Output of [`compile`].
#[derive(Debug, Default)]
pub(crate) struct CompiledGraph {
    pub(crate) passes: Vec<CompiledPass>,
    pub(crate) prologues: Vec<Prologue>,
    pub(crate) final_uses: Vec<FinalUse>,
    pub(crate) barrier_count: usize,
    pub(crate) ownership_transfers: usize,
    pub(crate) semaphore_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum EdgeSource {
    Pass(usize),
    Prologue(QueueKind),
}

/// Last known use of a virtual resource during the walk.
#[derive(Debug, Clone, Copy)]
struct Tracker {
    state: ResourceState,
    queue: Option<QueueKind>,
    pass: Option<usize>,
    has_contents: bool,
    graph_owned: bool,
}

/// Destination half of a release.
fn release_state(next: ResourceState) -> ResourceState {
    ResourceState::new(
        PipelineStages::BOTTOM_OF_PIPE,
        AccessFlags::empty(),
        next.layout,
    )
}

/// Source half of an acquire.
fn acquire_state(previous: ResourceState) -> ResourceState {
    ResourceState::new(
        PipelineStages::TOP_OF_PIPE,
        AccessFlags::empty(),
        previous.layout,
    )
}

struct Walk<'a> {
    ctx: &'a mut RenderContext,
    passes: Vec<CompiledPass>,
    prologues: Vec<Prologue>,
    semaphores: HashMap<(EdgeSource, usize), SemaphoreId>,
    ownership_transfers: usize,
}

impl Walk<'_> {
    fn family(&self, queue: QueueKind) -> u32 {
        self.ctx.resources.backend.queue_family(queue)
    }

    /// Semaphore from `source` to pass `dst`, created once per edge.
    fn edge(
        &mut self,
        source: EdgeSource,
        dst: usize,
        stages: PipelineStages,
    ) -> Result<(), GraphicsError> {
        if let Some(&semaphore) = self.semaphores.get(&(source, dst)) {
            if let Some(wait) = self.passes[dst]
                .waits
                .iter_mut()
                .find(|(id, _)| *id == semaphore)
            {
                wait.1 |= stages;
            }
            return Ok(());
        }

        let backend = self.ctx.resources.backend.clone();
        let semaphore = self
            .ctx
            .resources
            .frames
            .current_mut()
            .semaphore(backend.as_ref())?;
        self.semaphores.insert((source, dst), semaphore);
        self.passes[dst].waits.push((semaphore, stages));
        match source {
            EdgeSource::Pass(src) => self.passes[src].signals.push(semaphore),
            EdgeSource::Prologue(queue) => self.prologue(queue).signals.push(semaphore),
        }
        Ok(())
    }

    fn prologue(&mut self, queue: QueueKind) -> &mut Prologue {
        let index = match self.prologues.iter().position(|p| p.queue == queue) {
            Some(index) => index,
            None => {
                self.prologues.push(Prologue {
                    queue,
                    barriers: BarrierBatch::default(),
                    signals: Vec::new(),
                });
                self.prologues.len() - 1
            }
        };
        &mut self.prologues[index]
    }
}

/// Compile a declared graph.
///
/// Resolves graph-owned resources through the context's pools, computes all
/// barriers, semaphores and render pass instances.
pub(crate) fn compile(
    ctx: &mut RenderContext,
    passes: &[PassDecl],
    table: &mut ResourceTable,
) -> Result<CompiledGraph, GraphicsError> {
    ringframe_core::profile_function!();

    resolve_physical(ctx, passes, table)?;

    let mut last_use: Vec<Option<usize>> = vec![None; table.len()];
    for (index, pass) in passes.iter().enumerate() {
        for access in &pass.accesses {
            last_use[access.resource.index()] = Some(index);
        }
    }

    let mut trackers: Vec<Tracker> = table
        .iter()
        .map(|(_, resource)| match &resource.origin {
            ResourceOrigin::Imported { handle, initial_state } => {
                let owner = match resource.kind {
                    VirtualKind::Texture => ctx.resources.texture(*handle).owner,
                    VirtualKind::Buffer => ctx.resources.buffer(*handle).owner,
                };
                Tracker {
                    state: *initial_state,
                    queue: owner,
                    pass: None,
                    has_contents: resource.kind == VirtualKind::Buffer
                        || initial_state.layout != ImageLayout::Undefined,
                    graph_owned: false,
                }
            }
            ResourceOrigin::Texture(_) | ResourceOrigin::Buffer(_) => Tracker {
                state: ResourceState::UNDEFINED,
                queue: None,
                pass: None,
                has_contents: false,
                graph_owned: true,
            },
        })
        .collect();

    let mut walk = Walk {
        ctx,
        passes: vec![CompiledPass::default(); passes.len()],
        prologues: Vec::new(),
        semaphores: HashMap::new(),
        ownership_transfers: 0,
    };
    // Whether each attachment had meaningful contents when its pass began.
    let mut contents_before: Vec<Vec<bool>> = Vec::with_capacity(passes.len());

    for (index, pass) in passes.iter().enumerate() {
        let family = walk.family(pass.queue);
        let mut before = Vec::with_capacity(pass.accesses.len());

        for access in &pass.accesses {
            let resource = table.get(access.resource);
            let handle = physical(table, access.resource);
            let tracker = trackers[access.resource.index()];
            let next = access.state;
            before.push(tracker.has_contents);

            if tracker.pass.is_none() && tracker.graph_owned {
                let src = discard_state(walk.ctx, resource.kind, handle, pass.queue);
                let needed = match resource.kind {
                    VirtualKind::Texture => {
                        next.layout != ImageLayout::Undefined || !src.access.is_empty()
                    }
                    VirtualKind::Buffer => !src.access.is_empty(),
                };
                if needed {
                    walk.passes[index].pre.push(
                        resource.kind,
                        handle,
                        Barrier {
                            src,
                            dst: next,
                            transfer: None,
                        },
                    );
                }
            } else if let Some(previous) = tracker.queue.filter(|q| *q != pass.queue) {
                let previous_family = walk.family(previous);
                if previous_family != family && tracker.has_contents {
                    let transfer = QueueTransfer {
                        src_family: previous_family,
                        dst_family: family,
                    };
                    let release = Barrier {
                        src: tracker.state,
                        dst: release_state(next),
                        transfer: Some(transfer),
                    };
                    let source = match tracker.pass {
                        Some(src_pass) => {
                            walk.passes[src_pass]
                                .post
                                .push(resource.kind, handle, release);
                            EdgeSource::Pass(src_pass)
                        }
                        None => {
                            walk.prologue(previous)
                                .barriers
                                .push(resource.kind, handle, release);
                            EdgeSource::Prologue(previous)
                        }
                    };
                    walk.edge(source, index, next.stages)?;
                    walk.passes[index].pre.push(
                        resource.kind,
                        handle,
                        Barrier {
                            src: acquire_state(tracker.state),
                            dst: next,
                            transfer: Some(transfer),
                        },
                    );
                    walk.ownership_transfers += 1;
                } else {
                    let src = if tracker.has_contents {
                        tracker.state
                    } else {
                        ResourceState::UNDEFINED
                    };
                    walk.passes[index].pre.push(
                        resource.kind,
                        handle,
                        Barrier {
                            src,
                            dst: next,
                            transfer: None,
                        },
                    );
                    if let Some(src_pass) = tracker.pass {
                        walk.edge(EdgeSource::Pass(src_pass), index, next.stages)?;
                    }
                }
            } else if tracker.state.needs_barrier_to(&next) {
                walk.passes[index].pre.push(
                    resource.kind,
                    handle,
                    Barrier {
                        src: tracker.state,
                        dst: next,
                        transfer: None,
                    },
                );
            }

            let tracker = &mut trackers[access.resource.index()];
            tracker.state = next;
            tracker.queue = Some(pass.queue);
            tracker.pass = Some(index);
            tracker.has_contents |= access.write;
        }
        contents_before.push(before);
    }

    // Exports and swapchain semaphores.
    let mut final_uses = Vec::new();
    for (id, resource) in table.iter() {
        let tracker = trackers[id.index()];
        let handle = physical(table, id);
        if let Some(image) = resource.swapchain {
            let first = passes
                .iter()
                .position(|p| p.accesses.iter().any(|a| a.resource == id));
            let (Some(first), Some(last)) = (first, tracker.pass) else {
                panic!(
                    "swapchain image '{}' imported but no pass uses it",
                    resource.name
                );
            };
            walk.passes[first]
                .waits
                .push((image.acquire, PipelineStages::COLOR_ATTACHMENT_OUTPUT));
            walk.passes[last].signals.push(image.present);
        }
        let mut state = tracker.state;
        if let (Some(export), Some(last)) = (resource.export, tracker.pass) {
            if tracker.state.needs_barrier_to(&export) {
                walk.passes[last].post.push(
                    resource.kind,
                    handle,
                    Barrier {
                        src: tracker.state,
                        dst: export,
                        transfer: None,
                    },
                );
            }
            state = export;
        }
        if let Some(queue) = tracker.queue.filter(|_| tracker.pass.is_some()) {
            final_uses.push(FinalUse {
                kind: resource.kind,
                handle,
                state,
                queue,
            });
        }
    }

    for (index, pass) in passes.iter().enumerate() {
        if pass.render {
            let target = render_target(
                walk.ctx,
                table,
                pass,
                index,
                &contents_before[index],
                &last_use,
            )?;
            walk.passes[index].target = Some(target);
        } else if let Some(access) = pass.accesses.iter().find(|a| a.clear.is_some()) {
            panic!(
                "pass '{}' clears '{}' but is not a render pass",
                pass.name,
                table.get(access.resource).name
            );
        }
    }

    let barrier_count = walk
        .passes
        .iter()
        .map(|p| p.pre.len() + p.post.len())
        .chain(walk.prologues.iter().map(|p| p.barriers.len()))
        .sum();
    let semaphore_count = walk.semaphores.len();
    log::debug!(
        "Compiled render graph: {} passes, {} barriers, {} ownership transfers, {} semaphores",
        passes.len(),
        barrier_count,
        walk.ownership_transfers,
        semaphore_count
    );

    Ok(CompiledGraph {
        passes: walk.passes,
        prologues: walk.prologues,
        final_uses,
        barrier_count,
        ownership_transfers: walk.ownership_transfers,
        semaphore_count,
    })
}

/// Take every graph-owned resource from its pool.
///
/// A free object is only reused if the queue of the resource's first pass
/// is ordered after the object's last use: either it is the same queue, or
/// that use belongs to a retired frame.
fn resolve_physical(
    ctx: &mut RenderContext,
    passes: &[PassDecl],
    table: &mut ResourceTable,
) -> Result<(), GraphicsError> {
    let mut first_queue: Vec<Option<QueueKind>> = vec![None; table.len()];
    for pass in passes {
        for access in &pass.accesses {
            let first = &mut first_queue[access.resource.index()];
            if first.is_none() {
                *first = Some(pass.queue);
            }
        }
    }

    let (resources, caches) = ctx.split_mut();
    for (index, resource) in table.iter_mut().enumerate() {
        let queue = first_queue[index];
        let handle = match &resource.origin {
            ResourceOrigin::Imported { handle, .. } => *handle,
            ResourceOrigin::Texture(descriptor) => {
                caches
                    .textures
                    .request_matching(resources, descriptor, |resources, handle| {
                        let record = resources.texture(*handle);
                        reusable(resources, record.owner, record.last_frame, queue)
                    })?
            }
            ResourceOrigin::Buffer(descriptor) => {
                caches
                    .buffers
                    .request_matching(resources, descriptor, |resources, handle| {
                        let record = resources.buffer(*handle);
                        reusable(resources, record.owner, record.last_frame, queue)
                    })?
            }
        };
        resource.physical = Some(handle);
    }
    Ok(())
}

fn reusable(
    resources: &GpuResources,
    owner: Option<QueueKind>,
    last_frame: Option<u64>,
    queue: Option<QueueKind>,
) -> bool {
    match (owner, queue) {
        (None, _) | (_, None) => true,
        (Some(owner), Some(queue)) if owner == queue => true,
        _ => last_frame.is_none_or(|frame| resources.is_frame_retired(frame)),
    }
}

fn physical(table: &ResourceTable, id: VirtualId) -> ResourceHandle {
    match table.get(id).physical {
        Some(handle) => handle,
        None => panic!("graph resource '{}' has no physical object", table.get(id).name),
    }
}

/// Source state of a first use that discards the contents.
///
/// Pooled objects keep the stages of their previous use so the new use
/// still waits for it. Objects last used by another queue start fresh;
/// [`resolve_physical`] only hands those out once their frame retired.
fn discard_state(
    ctx: &RenderContext,
    kind: VirtualKind,
    handle: ResourceHandle,
    queue: QueueKind,
) -> ResourceState {
    let (state, owner) = match kind {
        VirtualKind::Texture => {
            let record = ctx.resources.texture(handle);
            (record.state, record.owner)
        }
        VirtualKind::Buffer => {
            let record = ctx.resources.buffer(handle);
            (record.state, record.owner)
        }
    };
    if owner == Some(queue) {
        state.with_layout(ImageLayout::Undefined)
    } else {
        ResourceState::UNDEFINED
    }
}

/// Build the render pass instance of a render pass.
///
/// Attachments are the pass's textures in attachment layouts, colors in
/// declaration order followed by at most one depth attachment.
fn render_target(
    ctx: &mut RenderContext,
    table: &ResourceTable,
    pass: &PassDecl,
    index: usize,
    contents_before: &[bool],
    last_use: &[Option<usize>],
) -> Result<RenderTarget, GraphicsError> {
    let mut layout = RenderPassLayout::default();
    let mut colors = Vec::new();
    let mut color_clears = Vec::new();
    let mut depth = None;
    let mut extent: Option<Extent3d> = None;

    for (access, had_contents) in pass.accesses.iter().zip(contents_before) {
        let resource = table.get(access.resource);
        let attachment_layout = access.state.layout;
        if resource.kind != VirtualKind::Texture || !attachment_layout.is_attachment() {
            continue;
        }
        let handle = physical(table, access.resource);
        let record = ctx.resources.texture(handle);
        match extent {
            None => extent = Some(record.size()),
            Some(size) => assert_eq!(
                size,
                record.size(),
                "render pass '{}' attachments differ in size",
                pass.name
            ),
        }

        let load_op = if access.clear.is_some() {
            LoadOp::Clear
        } else if *had_contents {
            LoadOp::Load
        } else {
            LoadOp::DontCare
        };
        let keep = resource.is_imported()
            || resource.export.is_some()
            || last_use[access.resource.index()].is_some_and(|last| last > index);
        let description = AttachmentDescription {
            format: record.format(),
            sample_count: record.descriptor().sample_count,
            load_op,
            store_op: if keep { StoreOp::Store } else { StoreOp::DontCare },
            initial_layout: attachment_layout,
            final_layout: attachment_layout,
        };

        if attachment_layout.is_depth_attachment() {
            assert!(
                depth.is_none(),
                "render pass '{}' has more than one depth attachment",
                pass.name
            );
            layout.depth_stencil_attachment = Some(description);
            depth = Some((handle, access.clear.unwrap_or(ClearValue::DEPTH_ONE)));
        } else {
            layout.color_attachments.push(description);
            colors.push(handle);
            color_clears.push(access.clear.unwrap_or(ClearValue::BLACK));
        }
    }

    let Some(extent) = extent else {
        panic!("render pass '{}' has no attachments", pass.name);
    };

    let mut attachments = colors;
    let mut clear_values = color_clears;
    if let Some((handle, clear)) = depth {
        attachments.push(handle);
        clear_values.push(clear);
    }

    let (resources, caches) = ctx.split_mut();
    let render_pass = caches.render_passes.request(resources, &layout)?;
    let framebuffer = caches.framebuffers.request(
        resources,
        &FramebufferKey {
            render_pass,
            attachments,
            extent,
        },
    )?;
    Ok(RenderTarget {
        render_pass,
        framebuffer,
        extent,
        clear_values,
    })
}
