//! Virtual resources of a render graph.

use std::collections::HashMap;

use crate::resources::ResourceHandle;
use crate::swapchain::SwapchainImage;
use crate::sync::ResourceState;
use crate::types::{BufferDescriptor, TextureDescriptor};

/// Index of a virtual resource within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct VirtualId(pub(crate) u32);

impl VirtualId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Texture or buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VirtualKind {
    /// A texture.
    Texture,
    /// A buffer.
    Buffer,
}

/// Where the physical object behind a virtual resource comes from.
#[derive(Debug, Clone)]
pub(crate) enum ResourceOrigin {
    /// Caller-owned object with a known state.
    Imported {
        handle: ResourceHandle,
        initial_state: ResourceState,
    },
    /// Graph-owned texture taken from the texture pool at compile time.
    Texture(TextureDescriptor),
    /// Graph-owned buffer taken from the buffer pool at compile time.
    Buffer(BufferDescriptor),
}

/// A named resource as the graph sees it.
#[derive(Debug, Clone)]
pub(crate) struct VirtualResource {
    pub(crate) name: String,
    pub(crate) kind: VirtualKind,
    pub(crate) origin: ResourceOrigin,
    /// Resolved at compile time for graph-owned resources.
    pub(crate) physical: Option<ResourceHandle>,
    /// Pass that wrote the resource last during declaration.
    pub(crate) last_writer: Option<usize>,
    /// State to leave the resource in after the last pass.
    pub(crate) export: Option<ResourceState>,
    /// Acquire and present semaphores of an imported swapchain image.
    pub(crate) swapchain: Option<SwapchainImage>,
}

impl VirtualResource {
    pub(crate) fn is_imported(&self) -> bool {
        matches!(self.origin, ResourceOrigin::Imported { .. })
    }

    /// Readable before any pass writes it.
    pub(crate) fn has_initial_contents(&self) -> bool {
        match self.origin {
            ResourceOrigin::Imported { .. } => true,
            ResourceOrigin::Texture(_) | ResourceOrigin::Buffer(_) => false,
        }
    }
}

/// Name table of a graph's virtual resources.
#[derive(Debug, Default)]
pub(crate) struct ResourceTable {
    resources: Vec<VirtualResource>,
    by_name: HashMap<String, VirtualId>,
}

impl ResourceTable {
    /// Declare a new virtual resource.
    ///
    /// # Panics
    ///
    /// Panics if the name is already taken.
    pub(crate) fn declare(
        &mut self,
        name: &str,
        kind: VirtualKind,
        origin: ResourceOrigin,
    ) -> VirtualId {
        assert!(
            !self.by_name.contains_key(name),
            "graph resource '{}' declared twice",
            name
        );
        let id = VirtualId(self.resources.len() as u32);
        let physical = match origin {
            ResourceOrigin::Imported { handle, .. } => Some(handle),
            _ => None,
        };
        self.resources.push(VirtualResource {
            name: name.to_string(),
            kind,
            origin,
            physical,
            last_writer: None,
            export: None,
            swapchain: None,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Look a name up, checking its kind.
    ///
    /// # Panics
    ///
    /// Panics if the name was never imported or created, or names the other
    /// kind of resource.
    pub(crate) fn lookup(&self, name: &str, kind: VirtualKind) -> VirtualId {
        let Some(&id) = self.by_name.get(name) else {
            panic!("graph resource '{}' was never imported or created", name);
        };
        let actual = self.resources[id.index()].kind;
        assert_eq!(
            actual, kind,
            "graph resource '{}' is a {:?}, used as a {:?}",
            name, actual, kind
        );
        id
    }

    pub(crate) fn get(&self, id: VirtualId) -> &VirtualResource {
        &self.resources[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: VirtualId) -> &mut VirtualResource {
        &mut self.resources[id.index()]
    }

    pub(crate) fn len(&self) -> usize {
        self.resources.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (VirtualId, &VirtualResource)> {
        self.resources
            .iter()
            .enumerate()
            .map(|(i, r)| (VirtualId(i as u32), r))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut VirtualResource> {
        self.resources.iter_mut()
    }

    pub(crate) fn clear(&mut self) {
        self.resources.clear();
        self.by_name.clear();
    }
}

/// Resolved physical handles, handed to every pass's execute callback.
#[derive(Debug)]
pub struct PassRegistry<'a> {
    pub(crate) table: &'a ResourceTable,
}

impl PassRegistry<'_> {
    /// Physical texture behind a graph name.
    ///
    /// # Panics
    ///
    /// Panics if the name is unknown or not a texture.
    pub fn texture(&self, name: &str) -> ResourceHandle {
        self.resolve(name, VirtualKind::Texture)
    }

    /// Physical buffer behind a graph name.
    ///
    /// # Panics
    ///
    /// Panics if the name is unknown or not a buffer.
    pub fn buffer(&self, name: &str) -> ResourceHandle {
        self.resolve(name, VirtualKind::Buffer)
    }

    /// Returns true if the graph declares `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.table.by_name.contains_key(name)
    }

    fn resolve(&self, name: &str, kind: VirtualKind) -> ResourceHandle {
        let id = self.table.lookup(name, kind);
        match self.table.get(id).physical {
            Some(handle) => handle,
            None => panic!("graph resource '{}' resolved before compile", name),
        }
    }
}
