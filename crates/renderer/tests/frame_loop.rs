//! Frame loop behavior across a minimize/restore cycle, driven through the
//! public scheduler API with a simulated GPU.

use triangle_renderer::{FrameBackend, FrameOutcome, FrameScheduler};
use triangle_rhi::RhiResult;
use triangle_rhi::swapchain::{AcquireOutcome, PresentOutcome, RecreateOutcome};
use triangle_rhi::sync::SlotWait;

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Simulated GPU where a submission finishes `latency` slot-waits after it
/// was made.
struct SimulatedGpu {
    frames_in_flight: usize,
    image_count: usize,
    size: (u32, u32),
    latency: u32,
    /// Remaining waits before each slot's submission completes.
    busy: Vec<u32>,
    /// Set by a successful wait, cleared by a reset.
    confirmed: Vec<bool>,
    next_image: u32,
    presented: Vec<u32>,
    recreated: Vec<(u32, u32)>,
    violations: usize,
}

impl SimulatedGpu {
    fn new(frames_in_flight: usize, image_count: usize, latency: u32) -> Self {
        Self {
            frames_in_flight,
            image_count,
            size: (640, 480),
            latency,
            busy: vec![0; frames_in_flight],
            confirmed: vec![false; frames_in_flight],
            next_image: 0,
            presented: Vec::new(),
            recreated: Vec::new(),
            violations: 0,
        }
    }
}

impl FrameBackend for SimulatedGpu {
    fn frames_in_flight(&self) -> usize {
        self.frames_in_flight
    }

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn wait_for_slot(&mut self, slot: usize, _timeout_ns: u64) -> RhiResult<SlotWait> {
        if self.busy[slot] > 0 {
            self.busy[slot] -= 1;
            return Ok(SlotWait::TimedOut);
        }
        self.confirmed[slot] = true;
        Ok(SlotWait::Ready)
    }

    fn reset_slot(&mut self, slot: usize) -> RhiResult<()> {
        if !self.confirmed[slot] {
            self.violations += 1;
        }
        self.confirmed[slot] = false;
        Ok(())
    }

    fn acquire_image(&mut self, _slot: usize) -> RhiResult<AcquireOutcome> {
        if self.size == (0, 0) {
            return Ok(AcquireOutcome::OutOfDate);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count as u32;
        Ok(AcquireOutcome::Ready {
            image_index,
            suboptimal: false,
        })
    }

    fn record(&mut self, _slot: usize, _image_index: u32) -> RhiResult<()> {
        Ok(())
    }

    fn submit(&mut self, slot: usize, _image_index: u32) -> RhiResult<()> {
        self.busy[slot] = self.latency;
        Ok(())
    }

    fn present(&mut self, image_index: u32) -> RhiResult<PresentOutcome> {
        self.presented.push(image_index);
        Ok(PresentOutcome::Presented)
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn recreate_swapchain(&mut self, width: u32, height: u32) -> RhiResult<RecreateOutcome> {
        self.recreated.push((width, height));
        self.next_image = 0;
        Ok(RecreateOutcome::Recreated)
    }

    fn wait_idle(&mut self) -> RhiResult<()> {
        self.busy.iter_mut().for_each(|b| *b = 0);
        Ok(())
    }
}

#[test]
fn test_minimize_and_restore() {
    init_test_logging();
    let mut scheduler = FrameScheduler::new(SimulatedGpu::new(2, 3, 0), 1_000);
    let resize = scheduler.resize_signal();

    for _ in 0..4 {
        assert_eq!(scheduler.draw_frame().unwrap(), FrameOutcome::Presented);
    }

    // Minimize: the window reports a zero size and a resize event.
    scheduler.backend_mut().size = (0, 0);
    resize.raise();
    for _ in 0..5 {
        assert_eq!(scheduler.draw_frame().unwrap(), FrameOutcome::Deferred);
    }

    // Restore at a new size.
    scheduler.backend_mut().size = (1280, 720);
    resize.raise();
    assert_eq!(
        scheduler.draw_frame().unwrap(),
        FrameOutcome::SwapchainRecreated
    );

    for _ in 0..4 {
        assert_eq!(scheduler.draw_frame().unwrap(), FrameOutcome::Presented);
    }

    let gpu = scheduler.backend();
    assert_eq!(gpu.recreated, [(1280, 720)]);
    assert_eq!(gpu.presented.len(), 8);
    assert_eq!(gpu.violations, 0);
    assert_eq!(scheduler.recreations(), 1);
}

#[test]
fn test_slow_gpu_only_costs_retries() {
    init_test_logging();
    let mut scheduler = FrameScheduler::new(SimulatedGpu::new(2, 2, 3), 1_000);

    for _ in 0..10 {
        assert_eq!(scheduler.draw_frame().unwrap(), FrameOutcome::Presented);
    }

    // Slots 0 and 1 are each reused four times after their first frame.
    assert_eq!(scheduler.timeouts(), 8 * 3);
    assert_eq!(scheduler.backend().violations, 0);
    assert_eq!(scheduler.backend().presented.len(), 10);
}
