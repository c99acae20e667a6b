//! The seam between the frame scheduler and the GPU.

use triangle_rhi::RhiResult;
use triangle_rhi::swapchain::{AcquireOutcome, PresentOutcome, RecreateOutcome};
use triangle_rhi::sync::SlotWait;

/// Per-frame GPU operations driven by [`FrameScheduler`](crate::FrameScheduler).
///
/// The scheduler calls these in a fixed order and owns every decision about
/// retries, rebuilds and cursor movement. Implementations only perform the
/// requested operation and report what happened.
pub trait FrameBackend {
    /// Number of frame slots.
    fn frames_in_flight(&self) -> usize;

    /// Number of swapchain images in the current generation.
    fn image_count(&self) -> usize;

    /// Bounded wait for `slot`'s previous submission.
    fn wait_for_slot(&mut self, slot: usize, timeout_ns: u64) -> RhiResult<SlotWait>;

    /// Clears `slot`'s completion signal. Only called after a `Ready` wait.
    fn reset_slot(&mut self, slot: usize) -> RhiResult<()>;

    /// Requests the next image, signaling `slot`'s acquire semaphore.
    fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome>;

    /// Records `slot`'s command buffer to draw into `image_index`.
    fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Submits `slot`'s command buffer for `image_index`.
    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()>;

    /// Presents `image_index` once its rendering completes.
    fn present(&mut self, image_index: u32) -> RhiResult<PresentOutcome>;

    /// Current framebuffer size in pixels. `(0, 0)` while minimized.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Rebuilds the swapchain and everything sized by it.
    ///
    /// Called only after [`FrameBackend::wait_idle`] and with a non-zero size.
    /// The surface may still report a zero extent, in which case nothing is
    /// rebuilt and [`RecreateOutcome::ZeroExtent`] is returned.
    fn recreate_swapchain(&mut self, width: u32, height: u32) -> RhiResult<RecreateOutcome>;

    /// Blocks until the device has no outstanding work.
    fn wait_idle(&mut self) -> RhiResult<()>;
}
