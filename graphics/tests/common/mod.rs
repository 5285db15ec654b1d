//! Common utilities for render graph integration tests.
//!
//! Every test runs against the dummy backend, which records each call into an
//! ordered event log. The helpers here pull barriers, submissions and render
//! pass instances back out of that log.

use std::sync::Arc;

use ringframe_graphics::backend::dummy::{
    DummyBackend, DummyBufferBarrier, DummyCommand, DummyEvent, DummyTextureBarrier,
};
use ringframe_graphics::{
    PipelineStages, QueueKind, RenderContext, RenderContextConfig, ResourceHandle,
};

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Backend configurations the tests run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend with one queue family per queue kind.
    Dummy,
    /// Dummy backend whose three queues all share one family.
    DummySharedFamily,
}

impl Backend {
    /// Check if this backend is currently available.
    pub fn is_available(&self) -> bool {
        match self {
            Backend::Dummy | Backend::DummySharedFamily => true,
        }
    }

    /// Get the backend name for display.
    #[allow(dead_code)]
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Dummy => "dummy",
            Backend::DummySharedFamily => "dummy-shared-family",
        }
    }

    fn create(self) -> Arc<DummyBackend> {
        match self {
            Backend::Dummy => Arc::new(DummyBackend::new()),
            Backend::DummySharedFamily => Arc::new(DummyBackend::with_queue_families([0, 0, 0])),
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// A render context plus the backend it runs on, for event inspection.
pub struct TestContext {
    pub backend: Arc<DummyBackend>,
    pub ctx: RenderContext,
}

impl TestContext {
    /// Create a context with the default configuration.
    ///
    /// Returns `None` if the backend is not available.
    pub fn new(backend: Backend) -> Option<Self> {
        Self::with_config(backend, RenderContextConfig::default())
    }

    /// Create a context with an explicit configuration.
    pub fn with_config(backend: Backend, config: RenderContextConfig) -> Option<Self> {
        if !backend.is_available() {
            eprintln!("Skipping test: {} backend not available", backend.name());
            return None;
        }
        let _ = env_logger::builder().is_test(true).try_init();

        let dummy = backend.create();
        let ctx = RenderContext::new(dummy.clone(), config.with_label("test"))
            .expect("Failed to create render context");
        Some(Self {
            backend: dummy,
            ctx,
        })
    }

    /// Raw backend id of a texture.
    pub fn texture_id(&self, texture: ResourceHandle) -> u64 {
        self.ctx.texture(texture).raw().raw_id()
    }

    /// Raw backend id of a buffer.
    pub fn buffer_id(&self, buffer: ResourceHandle) -> u64 {
        self.ctx.buffer(buffer).raw().raw_id()
    }
}

// ============================================================================
// Event Log Queries
// ============================================================================

/// A queue submission taken from the event log.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub queue: QueueKind,
    pub command_buffers: Vec<u64>,
    pub waits: Vec<(u64, PipelineStages)>,
    pub signals: Vec<u64>,
    pub fenced: bool,
}

/// Every texture barrier recorded, in order.
pub fn texture_barriers(events: &[DummyEvent]) -> Vec<DummyTextureBarrier> {
    events
        .iter()
        .filter_map(|event| match event {
            DummyEvent::Command {
                command: DummyCommand::Barrier { textures, .. },
                ..
            } => Some(textures.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

/// Every buffer barrier recorded, in order.
pub fn buffer_barriers(events: &[DummyEvent]) -> Vec<DummyBufferBarrier> {
    events
        .iter()
        .filter_map(|event| match event {
            DummyEvent::Command {
                command: DummyCommand::Barrier { buffers, .. },
                ..
            } => Some(buffers.clone()),
            _ => None,
        })
        .flatten()
        .collect()
}

/// Submissions that carry command buffers, in order.
///
/// The empty fenced submission `end_frame` may add is left out.
pub fn submissions(events: &[DummyEvent]) -> Vec<Submission> {
    events
        .iter()
        .filter_map(|event| match event {
            DummyEvent::Submit {
                queue,
                command_buffers,
                waits,
                signals,
                fence,
            } if !command_buffers.is_empty() => Some(Submission {
                queue: *queue,
                command_buffers: command_buffers.clone(),
                waits: waits.clone(),
                signals: signals.clone(),
                fenced: fence.is_some(),
            }),
            _ => None,
        })
        .collect()
}

/// Render pass ids of every render pass instance begun, in order.
pub fn begun_render_passes(events: &[DummyEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|event| match event {
            DummyEvent::Command {
                command: DummyCommand::BeginRenderPass { render_pass, .. },
                ..
            } => Some(*render_pass),
            _ => None,
        })
        .collect()
}

/// Debug labels opened, in order. Passes open one named after themselves.
#[allow(dead_code)]
pub fn labels(events: &[DummyEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            DummyEvent::Command {
                command: DummyCommand::BeginLabel(label),
                ..
            } => Some(label.clone()),
            _ => None,
        })
        .collect()
}
