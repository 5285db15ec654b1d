//! Render pass attachment layouts.
//!
//! A [`RenderPassLayout`] is the full content key of a render pass object:
//! two passes with equal layouts share one backend render pass through the
//! content-addressed cache.

use super::TextureFormat;
use crate::sync::ImageLayout;

/// What happens to an attachment's contents when the render pass begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadOp {
    /// Preserve the existing contents.
    Load,
    /// Clear to the pass's clear value.
    Clear,
    /// Contents are undefined; nothing useful was there.
    #[default]
    DontCare,
}

/// What happens to an attachment's contents when the render pass ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Write the results back to memory.
    #[default]
    Store,
    /// Results may be discarded; nobody reads them afterwards.
    DontCare,
}

/// One attachment of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentDescription {
    /// Attachment format.
    pub format: TextureFormat,
    /// Sample count.
    pub sample_count: u32,
    /// Load operation.
    pub load_op: LoadOp,
    /// Store operation.
    pub store_op: StoreOp,
    /// Layout the attachment is in when the pass begins.
    pub initial_layout: ImageLayout,
    /// Layout the attachment is left in when the pass ends.
    pub final_layout: ImageLayout,
}

/// Attachment set of a render pass, in binding order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RenderPassLayout {
    /// Color attachments.
    pub color_attachments: Vec<AttachmentDescription>,
    /// Optional depth/stencil attachment.
    pub depth_stencil_attachment: Option<AttachmentDescription>,
}

impl RenderPassLayout {
    /// Total number of attachments.
    pub fn attachment_count(&self) -> usize {
        self.color_attachments.len() + usize::from(self.depth_stencil_attachment.is_some())
    }

    /// Iterate over all attachments, colors first.
    pub fn attachments(&self) -> impl Iterator<Item = &AttachmentDescription> {
        self.color_attachments
            .iter()
            .chain(self.depth_stencil_attachment.iter())
    }
}
