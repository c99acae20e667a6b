//! Frame lifecycle for the hello-triangle renderer.
//!
//! This crate drives one frame at a time through the fixed sequence
//! wait → acquire → record → submit → present → advance:
//! - [`FrameScheduler`] owns the cursor and the resize policy
//! - [`FrameBackend`] is the seam between the scheduler and the GPU
//! - [`CommandRecorder`] records the per-image command stream
//! - [`VulkanBackend`] implements the backend on top of `triangle_rhi`

pub mod backend;
mod error;
pub mod recorder;
pub mod resize;
pub mod scheduler;
pub mod ubo;
pub mod vulkan;

pub use backend::FrameBackend;
pub use error::{RendererError, RendererResult};
pub use recorder::{CommandEncoder, CommandRecorder, DrawResources, RenderTarget};
pub use resize::ResizeSignal;
pub use scheduler::{FrameCursor, FrameOutcome, FrameScheduler};
pub use ubo::UniformBufferObject;
pub use vulkan::VulkanBackend;
