//! Frame scheduling.
//!
//! [`FrameScheduler`] runs one loop iteration per [`FrameScheduler::draw_frame`]
//! call:
//!
//! ```text
//! WAIT_SLOT -> ACQUIRE_IMAGE -> RECORD -> SUBMIT -> PRESENT -> ADVANCE
//!                   |                                  |
//!                   +------> recreate swapchain <------+
//! ```
//!
//! A stale or suboptimal acquire, or a pending resize, rebuilds the swapchain
//! and ends the iteration before anything is submitted. A stale present, or a
//! resize that arrived mid-frame, rebuilds after the present was queued.
//! [`FrameScheduler::drain`] is the terminal step: it blocks until the device
//! has no outstanding work.
//!
//! # Example
//!
//! ```no_run
//! use triangle_renderer::{FrameBackend, FrameScheduler};
//!
//! # fn example<B: FrameBackend>(backend: B) -> Result<(), triangle_rhi::RhiError> {
//! let mut scheduler = FrameScheduler::new(backend, 65_535);
//! let resize = scheduler.resize_signal();
//!
//! // Window event handler: resize.raise();
//! for _ in 0..3 {
//!     scheduler.draw_frame()?;
//! }
//! scheduler.drain()?;
//! # Ok(())
//! # }
//! ```

use tracing::{debug, info, warn};
use triangle_rhi::RhiResult;
use triangle_rhi::swapchain::{AcquireOutcome, RecreateOutcome};
use triangle_rhi::sync::SlotWait;

use crate::backend::FrameBackend;
use crate::resize::ResizeSignal;

/// Loop position carried between iterations.
///
/// The two counters use different moduli and advance independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCursor {
    /// Current frame slot, modulo the in-flight depth.
    pub frame_slot: usize,
    /// Current present-signal index, modulo the swapchain image count.
    pub present_slot: usize,
}

impl FrameCursor {
    /// Returns the cursor for the next iteration.
    pub fn advanced(self, frames_in_flight: usize, image_count: usize) -> Self {
        Self {
            frame_slot: (self.frame_slot + 1) % frames_in_flight.max(1),
            present_slot: (self.present_slot + 1) % image_count.max(1),
        }
    }
}

/// How one [`FrameScheduler::draw_frame`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A frame was submitted and queued for presentation.
    Presented,
    /// The swapchain was rebuilt. A frame may or may not have been presented.
    SwapchainRecreated,
    /// A rebuild is needed but the framebuffer or the surface has zero size.
    /// Nothing was submitted; the next call tries again.
    Deferred,
}

/// Drives the per-frame state machine over a [`FrameBackend`].
pub struct FrameScheduler<B: FrameBackend> {
    backend: B,
    cursor: FrameCursor,
    /// Set while a rebuild is owed but the window is minimized.
    pending_recreate: bool,
    resize: ResizeSignal,
    slot_wait_timeout_ns: u64,
    /// Slot waits that hit their timeout, over the scheduler's lifetime.
    timeouts: u64,
    recreations: u64,
}

impl<B: FrameBackend> FrameScheduler<B> {
    /// Creates a scheduler starting at frame slot 0 and present slot 0.
    ///
    /// `slot_wait_timeout_ns` bounds a single wait attempt. Timed-out waits
    /// are retried without limit.
    pub fn new(backend: B, slot_wait_timeout_ns: u64) -> Self {
        info!(
            "Frame scheduler ready: {} frame slot(s), {} image(s)",
            backend.frames_in_flight(),
            backend.image_count()
        );

        Self {
            backend,
            cursor: FrameCursor::default(),
            pending_recreate: false,
            resize: ResizeSignal::new(),
            slot_wait_timeout_ns,
            timeouts: 0,
            recreations: 0,
        }
    }

    /// Returns a handle the window layer raises on framebuffer resize.
    pub fn resize_signal(&self) -> ResizeSignal {
        self.resize.clone()
    }

    /// Current loop position.
    #[inline]
    pub fn cursor(&self) -> FrameCursor {
        self.cursor
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Number of slot waits that timed out and were retried.
    #[inline]
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    /// Number of successful swapchain rebuilds.
    #[inline]
    pub fn recreations(&self) -> u64 {
        self.recreations
    }

    /// Runs one loop iteration.
    ///
    /// # Errors
    ///
    /// Returns any error the backend reports. Stale swapchains and wait
    /// timeouts are handled here and never surface as errors.
    pub fn draw_frame(&mut self) -> RhiResult<FrameOutcome> {
        if self.pending_recreate {
            return self.recreate_swapchain();
        }

        let slot = self.cursor.frame_slot;

        // WAIT_SLOT
        while self.backend.wait_for_slot(slot, self.slot_wait_timeout_ns)? == SlotWait::TimedOut {
            self.timeouts += 1;
            warn!(
                "Frame slot {} still busy after {} ns, waiting again",
                slot, self.slot_wait_timeout_ns
            );
        }

        // ACQUIRE_IMAGE
        let image_index = match self.backend.acquire_image(slot)? {
            AcquireOutcome::OutOfDate => {
                debug!("Swapchain out of date at acquire");
                return self.recreate_swapchain();
            }
            AcquireOutcome::Ready {
                suboptimal: true, ..
            } => {
                debug!("Swapchain suboptimal at acquire");
                return self.recreate_swapchain();
            }
            AcquireOutcome::Ready { image_index, .. } => {
                if self.resize.take() {
                    debug!("Resize pending at acquire");
                    return self.recreate_swapchain();
                }
                image_index
            }
        };

        // RECORD
        self.backend.reset_slot(slot)?;
        self.backend.record(slot, image_index)?;

        // SUBMIT
        self.backend.submit(slot, image_index)?;

        // PRESENT
        let presented = self.backend.present(image_index)?;
        let resized = self.resize.take();
        if presented.is_stale() || resized {
            debug!(
                "Rebuilding after present (outcome {:?}, resized {})",
                presented, resized
            );
            // The cursor still moves past the frame that was just submitted.
            self.advance();
            return self.recreate_swapchain();
        }

        // ADVANCE
        self.advance();
        Ok(FrameOutcome::Presented)
    }

    fn advance(&mut self) {
        self.cursor = self
            .cursor
            .advanced(self.backend.frames_in_flight(), self.backend.image_count());
    }

    /// Rebuilds the swapchain at the current framebuffer size.
    ///
    /// While the framebuffer or the surface is zero-sized the rebuild is
    /// deferred and retried on the next [`FrameScheduler::draw_frame`] call,
    /// so any number of zero-size observations leads to exactly one rebuild.
    ///
    /// # Errors
    ///
    /// Returns an error if the idle wait or the rebuild fails.
    pub fn recreate_swapchain(&mut self) -> RhiResult<FrameOutcome> {
        let (width, height) = self.backend.framebuffer_size();
        if width == 0 || height == 0 {
            if !self.pending_recreate {
                debug!("Framebuffer is {}x{}, deferring swapchain rebuild", width, height);
            }
            self.pending_recreate = true;
            return Ok(FrameOutcome::Deferred);
        }

        self.backend.wait_idle()?;
        if self.backend.recreate_swapchain(width, height)? == RecreateOutcome::ZeroExtent {
            if !self.pending_recreate {
                debug!(
                    "Surface extent is zero at {}x{}, deferring swapchain rebuild",
                    width, height
                );
            }
            self.pending_recreate = true;
            return Ok(FrameOutcome::Deferred);
        }

        self.pending_recreate = false;
        // Resizes seen before this point are covered by the new generation.
        self.resize.take();
        self.cursor.present_slot = 0;
        self.recreations += 1;

        info!(
            "Swapchain rebuilt at {}x{} with {} image(s)",
            width,
            height,
            self.backend.image_count()
        );

        Ok(FrameOutcome::SwapchainRecreated)
    }

    /// Blocks until the device has finished all submitted work.
    ///
    /// Call once the loop has stopped and before any resource is released.
    ///
    /// # Errors
    ///
    /// Returns an error if the idle wait fails.
    pub fn drain(&mut self) -> RhiResult<()> {
        self.backend.wait_idle()?;
        info!(
            "Frame loop drained ({} rebuild(s), {} slot wait timeout(s))",
            self.recreations, self.timeouts
        );
        Ok(())
    }

    /// Consumes the scheduler, returning the backend.
    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use triangle_rhi::RhiError;
    use triangle_rhi::swapchain::PresentOutcome;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Wait(usize),
        Reset(usize),
        Acquire(usize),
        Record(usize, u32),
        Submit(usize, u32),
        Present(u32),
        WaitIdle,
        Recreate(u32, u32),
    }

    /// Simulated GPU: every submission completes one "cycle" after it was made,
    /// i.e. by the time the same slot is waited on again.
    struct FakeBackend {
        frames_in_flight: usize,
        image_count: usize,
        next_image: u32,
        framebuffer_sizes: VecDeque<(u32, u32)>,
        framebuffer_size: (u32, u32),
        acquire_script: VecDeque<RhiResult<AcquireOutcome>>,
        present_script: VecDeque<PresentOutcome>,
        recreate_script: VecDeque<RecreateOutcome>,
        timeouts_before_ready: VecDeque<u32>,
        /// Raised during the next submit, like a window event arriving mid-frame.
        resize_on_submit: Option<ResizeSignal>,
        /// Per slot: waited since the last reset.
        slot_confirmed: Vec<bool>,
        reset_violations: usize,
        calls: Vec<Call>,
    }

    impl FakeBackend {
        fn new(frames_in_flight: usize, image_count: usize) -> Self {
            Self {
                frames_in_flight,
                image_count,
                next_image: 0,
                framebuffer_sizes: VecDeque::new(),
                framebuffer_size: (800, 600),
                acquire_script: VecDeque::new(),
                present_script: VecDeque::new(),
                recreate_script: VecDeque::new(),
                timeouts_before_ready: VecDeque::new(),
                resize_on_submit: None,
                slot_confirmed: vec![false; frames_in_flight],
                reset_violations: 0,
                calls: Vec::new(),
            }
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls.iter().filter(|c| pred(c)).count()
        }

        fn records(&self) -> Vec<(usize, u32)> {
            self.calls
                .iter()
                .filter_map(|c| match c {
                    Call::Record(slot, image) => Some((*slot, *image)),
                    _ => None,
                })
                .collect()
        }
    }

    impl FrameBackend for FakeBackend {
        fn frames_in_flight(&self) -> usize {
            self.frames_in_flight
        }

        fn image_count(&self) -> usize {
            self.image_count
        }

        fn wait_for_slot(&mut self, slot: usize, _timeout_ns: u64) -> RhiResult<SlotWait> {
            self.calls.push(Call::Wait(slot));
            if let Some(remaining) = self.timeouts_before_ready.front_mut() {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(SlotWait::TimedOut);
                }
                self.timeouts_before_ready.pop_front();
            }
            self.slot_confirmed[slot] = true;
            Ok(SlotWait::Ready)
        }

        fn reset_slot(&mut self, slot: usize) -> RhiResult<()> {
            self.calls.push(Call::Reset(slot));
            if !self.slot_confirmed[slot] {
                self.reset_violations += 1;
            }
            self.slot_confirmed[slot] = false;
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> RhiResult<AcquireOutcome> {
            self.calls.push(Call::Acquire(slot));
            if let Some(scripted) = self.acquire_script.pop_front() {
                return scripted;
            }
            let image_index = self.next_image;
            self.next_image = (self.next_image + 1) % self.image_count as u32;
            Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal: false,
            })
        }

        fn record(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
            self.calls.push(Call::Submit(slot, image_index));
            if let Some(resize) = self.resize_on_submit.take() {
                resize.raise();
            }
            Ok(())
        }

        fn present(&mut self, image_index: u32) -> RhiResult<PresentOutcome> {
            self.calls.push(Call::Present(image_index));
            Ok(self
                .present_script
                .pop_front()
                .unwrap_or(PresentOutcome::Presented))
        }

        fn framebuffer_size(&self) -> (u32, u32) {
            self.framebuffer_size
        }

        fn recreate_swapchain(&mut self, width: u32, height: u32) -> RhiResult<RecreateOutcome> {
            self.calls.push(Call::Recreate(width, height));
            let outcome = self
                .recreate_script
                .pop_front()
                .unwrap_or(RecreateOutcome::Recreated);
            if outcome == RecreateOutcome::Recreated {
                self.next_image = 0;
            }
            Ok(outcome)
        }

        fn wait_idle(&mut self) -> RhiResult<()> {
            self.calls.push(Call::WaitIdle);
            // Every slot is complete once the device is idle.
            self.slot_confirmed.iter_mut().for_each(|c| *c = true);
            Ok(())
        }
    }

    impl FakeBackend {
        /// Applies the next queued framebuffer size, if any.
        fn step_framebuffer(&mut self) {
            if let Some(size) = self.framebuffer_sizes.pop_front() {
                self.framebuffer_size = size;
            }
        }
    }

    #[test]
    fn test_cursor_advances_independently() {
        let mut cursor = FrameCursor::default();
        let mut seen = Vec::new();
        for _ in 0..6 {
            seen.push((cursor.frame_slot, cursor.present_slot));
            cursor = cursor.advanced(2, 3);
        }
        assert_eq!(seen, [(0, 0), (1, 1), (0, 2), (1, 0), (0, 1), (1, 2)]);
    }

    #[test]
    fn test_slot_waited_before_every_reset() {
        let mut scheduler = FrameScheduler::new(FakeBackend::new(2, 3), 100);
        for _ in 0..20 {
            assert_eq!(scheduler.draw_frame().unwrap(), FrameOutcome::Presented);
        }

        let backend = scheduler.backend();
        assert_eq!(backend.reset_violations, 0);
        assert_eq!(backend.count(|c| matches!(c, Call::Reset(_))), 20);
    }

    #[test]
    fn test_call_order_within_one_frame() {
        let mut scheduler = FrameScheduler::new(FakeBackend::new(2, 2), 100);
        scheduler.draw_frame().unwrap();

        assert_eq!(
            scheduler.backend().calls,
            [
                Call::Wait(0),
                Call::Acquire(0),
                Call::Reset(0),
                Call::Record(0, 0),
                Call::Submit(0, 0),
                Call::Present(0),
            ]
        );
    }

    #[test]
    fn test_frame_and_present_cycles_differ() {
        let mut scheduler = FrameScheduler::new(FakeBackend::new(2, 3), 100);
        let mut frame_slots = Vec::new();
        let mut present_slots = Vec::new();

        for _ in 0..6 {
            let cursor = scheduler.cursor();
            frame_slots.push(cursor.frame_slot);
            present_slots.push(cursor.present_slot);
            scheduler.draw_frame().unwrap();
        }

        assert_eq!(frame_slots, [0, 1, 0, 1, 0, 1]);
        assert_eq!(present_slots, [0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_ten_frames_without_events() {
        let mut scheduler = FrameScheduler::new(FakeBackend::new(2, 2), 100);
        for _ in 0..10 {
            assert_eq!(scheduler.draw_frame().unwrap(), FrameOutcome::Presented);
        }

        let backend = scheduler.backend();
        assert_eq!(backend.records().len(), 10);
        // Each wait completed on its first attempt.
        assert_eq!(scheduler.timeouts(), 0);
        assert_eq!(backend.count(|c| matches!(c, Call::Wait(_))), 10);
        assert_eq!(backend.count(|c| matches!(c, Call::Recreate(..))), 0);
    }

    #[test]
    fn test_wait_timeouts_are_retried() {
        let mut backend = FakeBackend::new(2, 2);
        backend.timeouts_before_ready.push_back(3);
        let mut scheduler = FrameScheduler::new(backend, 100);

        assert_eq!(scheduler.draw_frame().unwrap(), FrameOutcome::Presented);
        assert_eq!(scheduler.timeouts(), 3);
        assert_eq!(scheduler.backend().count(|c| *c == Call::Wait(0)), 4);
        assert_eq!(scheduler.backend().reset_violations, 0);
    }

    #[test]
    fn test_out_of_date_acquire_skips_submit() {
        let mut backend = FakeBackend::new(2, 3);
        backend.acquire_script.push_back(Ok(AcquireOutcome::OutOfDate));
        let mut scheduler = FrameScheduler::new(backend, 100);

        assert_eq!(
            scheduler.draw_frame().unwrap(),
            FrameOutcome::SwapchainRecreated
        );

        let backend = scheduler.backend();
        assert_eq!(backend.count(|c| matches!(c, Call::Submit(..))), 0);
        assert_eq!(backend.count(|c| matches!(c, Call::Reset(_))), 0);
        assert_eq!(
            &backend.calls[2..],
            [Call::WaitIdle, Call::Recreate(800, 600)]
        );
        // The slot was not consumed, so the next frame reuses it.
        assert_eq!(scheduler.cursor().frame_slot, 0);
    }

    #[test]
    fn test_suboptimal_acquire_recreates() {
        let mut backend = FakeBackend::new(2, 3);
        backend.acquire_script.push_back(Ok(AcquireOutcome::Ready {
            image_index: 1,
            suboptimal: true,
        }));
        let mut scheduler = FrameScheduler::new(backend, 100);

        assert_eq!(
            scheduler.draw_frame().unwrap(),
            FrameOutcome::SwapchainRecreated
        );
        assert!(scheduler.backend().records().is_empty());
    }

    #[test]
    fn test_resize_at_acquire_recreates_without_submit() {
        let mut scheduler = FrameScheduler::new(FakeBackend::new(2, 2), 100);
        scheduler.draw_frame().unwrap();

        scheduler.resize_signal().raise();
        assert_eq!(
            scheduler.draw_frame().unwrap(),
            FrameOutcome::SwapchainRecreated
        );

        let backend = scheduler.backend();
        assert_eq!(backend.count(|c| matches!(c, Call::Submit(..))), 1);
        assert_eq!(backend.count(|c| matches!(c, Call::Recreate(..))), 1);
        assert!(!scheduler.resize_signal().is_raised());
    }

    #[test]
    fn test_stale_present_recreates_after_advance() {
        let mut backend = FakeBackend::new(2, 3);
        backend.present_script.push_back(PresentOutcome::Suboptimal);
        let mut scheduler = FrameScheduler::new(backend, 100);

        assert_eq!(
            scheduler.draw_frame().unwrap(),
            FrameOutcome::SwapchainRecreated
        );
        assert_eq!(
            scheduler.cursor(),
            FrameCursor {
                frame_slot: 1,
                present_slot: 0,
            }
        );

        assert_eq!(scheduler.draw_frame().unwrap(), FrameOutcome::Presented);
        assert_eq!(scheduler.backend().records(), [(0, 0), (1, 0)]);
        assert_eq!(scheduler.backend().reset_violations, 0);
    }

    #[test]
    fn test_out_of_date_present_recreates_after_advance() {
        let mut backend = FakeBackend::new(2, 3);
        backend.present_script.push_back(PresentOutcome::OutOfDate);
        let mut scheduler = FrameScheduler::new(backend, 100);

        assert_eq!(
            scheduler.draw_frame().unwrap(),
            FrameOutcome::SwapchainRecreated
        );
        assert_eq!(
            scheduler.cursor(),
            FrameCursor {
                frame_slot: 1,
                present_slot: 0,
            }
        );
        assert_eq!(
            &scheduler.backend().calls[5..],
            [Call::Present(0), Call::WaitIdle, Call::Recreate(800, 600)]
        );
        assert_eq!(scheduler.recreations(), 1);
    }

    #[test]
    fn test_resize_during_frame_recreates_after_present() {
        let mut scheduler = FrameScheduler::new(FakeBackend::new(2, 3), 100);
        let resize = scheduler.resize_signal();
        scheduler.backend_mut().resize_on_submit = Some(resize.clone());

        assert_eq!(
            scheduler.draw_frame().unwrap(),
            FrameOutcome::SwapchainRecreated
        );

        let backend = scheduler.backend();
        // The frame that was in progress still went out.
        assert_eq!(backend.count(|c| matches!(c, Call::Present(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, Call::Recreate(..))), 1);
        assert_eq!(scheduler.recreations(), 1);
        assert_eq!(
            scheduler.cursor(),
            FrameCursor {
                frame_slot: 1,
                present_slot: 0,
            }
        );
        assert!(!resize.is_raised());

        assert_eq!(scheduler.draw_frame().unwrap(), FrameOutcome::Presented);
        assert_eq!(scheduler.backend().reset_violations, 0);
    }

    #[test]
    fn test_zero_surface_extent_defers_rebuild() {
        let mut backend = FakeBackend::new(2, 2);
        backend.acquire_script.push_back(Ok(AcquireOutcome::OutOfDate));
        // The window reports a size but the surface is still minimized.
        backend
            .recreate_script
            .extend([RecreateOutcome::ZeroExtent, RecreateOutcome::ZeroExtent]);
        let mut scheduler = FrameScheduler::new(backend, 100);

        let outcomes: Vec<_> = (0..4).map(|_| scheduler.draw_frame().unwrap()).collect();
        assert_eq!(
            outcomes,
            [
                FrameOutcome::Deferred,
                FrameOutcome::Deferred,
                FrameOutcome::SwapchainRecreated,
                FrameOutcome::Presented,
            ]
        );

        let backend = scheduler.backend();
        assert_eq!(backend.count(|c| matches!(c, Call::Recreate(..))), 3);
        // Deferred attempts submit nothing.
        assert_eq!(backend.records(), [(0, 0)]);
        assert_eq!(scheduler.recreations(), 1);
        assert_eq!(scheduler.cursor().frame_slot, 1);
    }

    #[test]
    fn test_zero_size_rebuild_happens_once() {
        let mut backend = FakeBackend::new(2, 2);
        backend.acquire_script.push_back(Ok(AcquireOutcome::OutOfDate));
        backend.framebuffer_size = (0, 0);
        backend.framebuffer_sizes.extend([(0, 0), (1024, 768)]);
        let mut scheduler = FrameScheduler::new(backend, 100);

        let mut outcomes = vec![scheduler.draw_frame().unwrap()];
        for _ in 0..2 {
            scheduler.backend_mut().step_framebuffer();
            outcomes.push(scheduler.draw_frame().unwrap());
        }

        assert_eq!(
            outcomes,
            [
                FrameOutcome::Deferred,
                FrameOutcome::Deferred,
                FrameOutcome::SwapchainRecreated,
            ]
        );
        let backend = scheduler.backend();
        assert_eq!(backend.count(|c| matches!(c, Call::Recreate(..))), 1);
        assert!(backend.calls.contains(&Call::Recreate(1024, 768)));
        // Deferred iterations never touch the GPU.
        assert_eq!(backend.count(|c| *c == Call::WaitIdle), 1);
        assert_eq!(scheduler.recreations(), 1);
    }

    #[test]
    fn test_fatal_acquire_error_propagates() {
        let mut backend = FakeBackend::new(2, 2);
        backend
            .acquire_script
            .push_back(Err(RhiError::VulkanError(ash::vk::Result::ERROR_SURFACE_LOST_KHR)));
        let mut scheduler = FrameScheduler::new(backend, 100);

        let err = scheduler.draw_frame().unwrap_err();
        assert!(matches!(
            err,
            RhiError::VulkanError(ash::vk::Result::ERROR_SURFACE_LOST_KHR)
        ));
        assert!(scheduler.backend().records().is_empty());
    }

    #[test]
    fn test_drain_waits_for_idle() {
        let mut scheduler = FrameScheduler::new(FakeBackend::new(2, 2), 100);
        scheduler.draw_frame().unwrap();
        scheduler.drain().unwrap();

        assert_eq!(scheduler.into_backend().calls.last(), Some(&Call::WaitIdle));
    }
}
