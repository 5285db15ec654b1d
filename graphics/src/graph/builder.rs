//! Pass declaration.
//!
//! Passes are declared in two phases. [`PassNode::setup`] runs immediately
//! when the pass is added and declares, through a [`PassBuilder`], which
//! graph resources the pass touches and how. [`PassNode::execute`] runs
//! during evaluation and records the pass's commands.

use super::registry::{PassRegistry, ResourceOrigin, ResourceTable, VirtualId, VirtualKind};
use crate::context::RenderContext;
use crate::error::GraphicsError;
use crate::recorder::CommandRecorder;
use crate::sync::ResourceState;
use crate::types::{BufferDescriptor, ClearValue, QueueKind, TextureDescriptor};

/// A node of the render graph.
///
/// # Example
///
/// ```ignore
/// struct Blur;
///
/// impl PassNode for Blur {
///     fn setup(&mut self, builder: &mut PassBuilder<'_>) {
///         builder.queue(QueueKind::Compute);
///         builder.read_texture("hdr", ResourceState::COMPUTE_SAMPLED);
///         builder.write_texture("blurred", ResourceState::COMPUTE_STORAGE_WRITE);
///     }
///
///     fn execute(
///         &mut self,
///         resources: &PassRegistry<'_>,
///         recorder: &mut CommandRecorder<'_>,
///     ) -> Result<(), GraphicsError> {
///         let output = resources.texture("blurred");
///         // bind, dispatch...
///         Ok(())
///     }
/// }
/// ```
pub trait PassNode {
    /// Declare the resources this pass uses.
    fn setup(&mut self, builder: &mut PassBuilder<'_>);

    /// Record the pass's commands.
    ///
    /// Barriers and, for render passes, the render pass instance are
    /// already recorded around this call.
    fn execute(
        &mut self,
        resources: &PassRegistry<'_>,
        recorder: &mut CommandRecorder<'_>,
    ) -> Result<(), GraphicsError>;
}

/// Adapts an execute closure to [`PassNode`]; setup runs up front.
pub(crate) struct FnPass<F> {
    pub(crate) execute: F,
}

impl<F> PassNode for FnPass<F>
where
    F: FnMut(&PassRegistry<'_>, &mut CommandRecorder<'_>) -> Result<(), GraphicsError>,
{
    fn setup(&mut self, _builder: &mut PassBuilder<'_>) {}

    fn execute(
        &mut self,
        resources: &PassRegistry<'_>,
        recorder: &mut CommandRecorder<'_>,
    ) -> Result<(), GraphicsError> {
        (self.execute)(resources, recorder)
    }
}

/// One declared use of a resource by a pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Access {
    pub(crate) resource: VirtualId,
    pub(crate) state: ResourceState,
    pub(crate) write: bool,
    pub(crate) clear: Option<ClearValue>,
}

/// A declared pass.
pub(crate) struct PassDecl {
    pub(crate) name: String,
    pub(crate) queue: QueueKind,
    pub(crate) render: bool,
    pub(crate) accesses: Vec<Access>,
    /// Earlier passes whose writes this pass depends on.
    pub(crate) dependencies: Vec<usize>,
    pub(crate) node: Box<dyn PassNode>,
}

impl std::fmt::Debug for PassDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassDecl")
            .field("name", &self.name)
            .field("queue", &self.queue)
            .field("render", &self.render)
            .field("accesses", &self.accesses)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Declares the resource uses of one pass.
///
/// Handed to [`PassNode::setup`]. Every read must name a resource that was
/// imported, or written by an earlier pass.
pub struct PassBuilder<'a> {
    ctx: &'a RenderContext,
    table: &'a mut ResourceTable,
    index: usize,
    name: &'a str,
    queue: QueueKind,
    render: bool,
    accesses: Vec<Access>,
    dependencies: Vec<usize>,
}

impl<'a> PassBuilder<'a> {
    pub(crate) fn new(
        ctx: &'a RenderContext,
        table: &'a mut ResourceTable,
        index: usize,
        name: &'a str,
    ) -> Self {
        Self {
            ctx,
            table,
            index,
            name,
            queue: QueueKind::Graphics,
            render: false,
            accesses: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub(crate) fn finish(self, node: Box<dyn PassNode>) -> PassDecl {
        PassDecl {
            name: self.name.to_string(),
            queue: self.queue,
            render: self.render,
            accesses: self.accesses,
            dependencies: self.dependencies,
            node,
        }
    }

    /// The render context, for queries during setup.
    pub fn context(&self) -> &RenderContext {
        self.ctx
    }

    /// Name of the pass being declared.
    pub fn name(&self) -> &str {
        self.name
    }

    /// Run the pass on `queue`. Defaults to [`QueueKind::Graphics`].
    pub fn queue(&mut self, queue: QueueKind) -> &mut Self {
        self.queue = queue;
        self
    }

    /// Make this a render pass: attachment-layout textures become the
    /// attachments of a render pass instance opened around execute.
    pub fn render(&mut self) -> &mut Self {
        self.render = true;
        self
    }

    // ------------------------------------------------------------------
    // Resource declaration
    // ------------------------------------------------------------------

    /// Create a graph-owned texture, taken from the texture pool at compile.
    pub fn create_texture(&mut self, name: &str, descriptor: TextureDescriptor) -> &mut Self {
        self.table.declare(
            name,
            VirtualKind::Texture,
            ResourceOrigin::Texture(descriptor),
        );
        self
    }

    /// Create a graph-owned buffer, taken from the buffer pool at compile.
    pub fn create_buffer(&mut self, name: &str, descriptor: BufferDescriptor) -> &mut Self {
        self.table
            .declare(name, VirtualKind::Buffer, ResourceOrigin::Buffer(descriptor));
        self
    }

    // ------------------------------------------------------------------
    // Textures
    // ------------------------------------------------------------------

    /// Read a texture in `state`.
    pub fn read_texture(&mut self, name: &str, state: ResourceState) -> &mut Self {
        let id = self.table.lookup(name, VirtualKind::Texture);
        self.access(id, state, true, false, None)
    }

    /// Write a texture in `state`, keeping its contents.
    pub fn write_texture(&mut self, name: &str, state: ResourceState) -> &mut Self {
        let id = self.table.lookup(name, VirtualKind::Texture);
        self.access(id, state, false, true, None)
    }

    /// Write a render pass attachment, clearing it to `value` first.
    pub fn clear_texture(
        &mut self,
        name: &str,
        state: ResourceState,
        value: ClearValue,
    ) -> &mut Self {
        let id = self.table.lookup(name, VirtualKind::Texture);
        self.access(id, state, false, true, Some(value))
    }

    /// Read and write a texture in `state`.
    pub fn read_write_texture(&mut self, name: &str, state: ResourceState) -> &mut Self {
        let id = self.table.lookup(name, VirtualKind::Texture);
        self.access(id, state, true, true, None)
    }

    // ------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------

    /// Read a buffer in `state`.
    pub fn read_buffer(&mut self, name: &str, state: ResourceState) -> &mut Self {
        let id = self.table.lookup(name, VirtualKind::Buffer);
        self.access(id, state, true, false, None)
    }

    /// Write a buffer in `state`.
    pub fn write_buffer(&mut self, name: &str, state: ResourceState) -> &mut Self {
        let id = self.table.lookup(name, VirtualKind::Buffer);
        self.access(id, state, false, true, None)
    }

    /// Read and write a buffer in `state`.
    pub fn read_write_buffer(&mut self, name: &str, state: ResourceState) -> &mut Self {
        let id = self.table.lookup(name, VirtualKind::Buffer);
        self.access(id, state, true, true, None)
    }

    fn access(
        &mut self,
        id: VirtualId,
        state: ResourceState,
        read: bool,
        write: bool,
        clear: Option<ClearValue>,
    ) -> &mut Self {
        let resource = self.table.get_mut(id);
        assert!(
            !self.accesses.iter().any(|a| a.resource == id),
            "pass '{}' declares '{}' more than once",
            self.name,
            resource.name
        );
        if read {
            assert!(
                resource.last_writer.is_some() || resource.has_initial_contents(),
                "pass '{}' reads '{}' before any pass wrote it",
                self.name,
                resource.name
            );
        }
        if let Some(writer) = resource.last_writer {
            if !self.dependencies.contains(&writer) {
                self.dependencies.push(writer);
            }
        }
        if write {
            resource.last_writer = Some(self.index);
        }
        self.accesses.push(Access {
            resource: id,
            state,
            write,
            clear,
        });
        self
    }
}
