use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::input::InputClasses;

/// Attributes requested when creating the 3D graphics context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsAttribs {
    pub alpha_size: u32,
    pub depth_size: u32,
    pub stencil_size: u32,
    pub samples: u32,
    pub sample_buffers: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for GraphicsAttribs {
    fn default() -> Self {
        Self {
            alpha_size: 8,
            depth_size: 24,
            stencil_size: 8,
            samples: 0,
            sample_buffers: 0,
            width: 640,
            height: 480,
        }
    }
}

impl GraphicsAttribs {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// Opaque handle to a graphics context created by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u64);

/// Services the embedding plugin runtime provides to the adapter.
///
/// Everything here is called from the host's main thread. `swap_buffers`
/// completes asynchronously: the runtime later calls
/// [`App::on_swap_complete`](crate::app::App::on_swap_complete).
pub trait Host {
    /// Identifier of this plugin instance, prefixed to diagnostics.
    fn instance_id(&self) -> i64;

    fn create_context(&mut self, attribs: &GraphicsAttribs) -> Result<ContextHandle>;

    fn bind_graphics(&mut self, context: ContextHandle) -> Result<()>;

    fn swap_buffers(&mut self, context: ContextHandle);

    /// Sends a text message to the embedding page.
    fn post_message(&mut self, message: String);

    fn request_input_events(&mut self, classes: InputClasses);

    fn request_filtering_input_events(&mut self, classes: InputClasses);
}
