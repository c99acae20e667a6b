//! Synchronization primitives and the per-frame synchronization ring.
//!
//! - [`Semaphore`] - GPU-to-GPU signal between queue operations
//! - [`Fence`] - GPU-to-CPU completion signal
//! - [`SyncRing`] - per-slot and per-image signals for frames in flight
//!
//! # Overview
//!
//! The ring is sized along two independent axes:
//!
//! - **Frame slots** (in-flight depth `F`): each slot owns one completion fence
//!   and one acquire semaphore. A slot is reused every `F` frames, after its
//!   fence confirms the previous submission finished.
//! - **Present slots** (one per swapchain image): each owns the semaphore that
//!   gates presentation of that image. Presentation of image `i` may still be
//!   pending after the frame slot that rendered it has cycled back, so these
//!   cannot be tied to frame slots.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use triangle_rhi::device::Device;
//! use triangle_rhi::sync::{SlotWait, SyncRing};
//!
//! # fn example(device: Arc<Device>) -> Result<(), triangle_rhi::RhiError> {
//! let ring = SyncRing::new(device, 2, 3)?;
//!
//! while ring.wait_for_slot(0, 65_535)? == SlotWait::TimedOut {}
//! ring.reset_slot(0)?;
//! // Acquire with ring.acquire_semaphore(0), then submit signaling
//! // ring.present_semaphore(image) and ring.completion_fence(0).
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Vulkan semaphore wrapper.
///
/// Semaphores are used for GPU-to-GPU synchronization between queue operations,
/// such as image acquisition before rendering or rendering before presentation.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore in the unsignaled state.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        debug!("Created semaphore");

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed semaphore");
    }
}

/// Vulkan fence wrapper.
///
/// Fences let the host wait for GPU work to complete, for example before
/// reusing a frame slot or after a one-shot transfer.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `signaled` - Create the fence already signaled, so the first wait
    ///   returns immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        debug!(
            "Created fence ({})",
            if signaled { "signaled" } else { "unsignaled" }
        );

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Waits for the fence with a bounded timeout.
    ///
    /// # Arguments
    ///
    /// * `timeout` - Timeout in nanoseconds
    ///
    /// # Returns
    ///
    /// `Ok(true)` once signaled, `Ok(false)` if the timeout elapsed first.
    ///
    /// # Errors
    ///
    /// Returns an error for any result other than success or timeout,
    /// e.g. `ERROR_DEVICE_LOST`.
    pub fn wait(&self, timeout: u64) -> RhiResult<bool> {
        let fences = [self.fence];
        match unsafe { self.device.handle().wait_for_fences(&fences, true, timeout) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(RhiError::from(e)),
        }
    }

    /// Resets the fence to the unsignaled state.
    ///
    /// The fence must not be referenced by any pending queue submission.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset operation fails.
    pub fn reset(&self) -> RhiResult<()> {
        let fences = [self.fence];
        unsafe { self.device.handle().reset_fences(&fences)? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
        debug!("Destroyed fence");
    }
}

/// Outcome of a bounded wait on a frame slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotWait {
    /// The slot's previous submission has completed.
    Ready,
    /// The timeout elapsed first. The caller may retry.
    TimedOut,
}

/// Signals owned by one frame slot.
struct SlotSync {
    /// Signaled by image acquisition, waited on by the slot's submission.
    image_acquired: Semaphore,
    /// Signaled when the slot's submission finishes executing.
    work_done: Fence,
}

/// Fixed ring of frame-slot signals plus one present signal per image.
///
/// The ring never resets or destroys a signal on its own: a completion fence
/// is only reset through [`SyncRing::reset_slot`], and semaphores are only
/// replaced by [`SyncRing::recreate`], which must run after a device-wide
/// idle wait.
pub struct SyncRing {
    device: Arc<Device>,
    slots: Vec<SlotSync>,
    render_complete: Vec<Semaphore>,
}

impl SyncRing {
    /// Creates the ring.
    ///
    /// Fences start signaled so the first wait on every slot returns at once.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `frames_in_flight` - Number of frame slots
    /// * `image_count` - Number of swapchain images (present slots)
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if either count is zero, or the
    /// Vulkan error if object creation fails.
    pub fn new(
        device: Arc<Device>,
        frames_in_flight: usize,
        image_count: usize,
    ) -> RhiResult<Self> {
        if frames_in_flight == 0 || image_count == 0 {
            return Err(RhiError::InvalidHandle(format!(
                "sync ring needs at least one slot (frames={frames_in_flight}, images={image_count})"
            )));
        }

        let slots = (0..frames_in_flight)
            .map(|_| {
                Ok(SlotSync {
                    image_acquired: Semaphore::new(device.clone())?,
                    work_done: Fence::new(device.clone(), true)?,
                })
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let render_complete = Self::create_semaphores(&device, image_count)?;

        info!(
            "Created sync ring: {} frame slots, {} present slots",
            frames_in_flight, image_count
        );

        Ok(Self {
            device,
            slots,
            render_complete,
        })
    }

    fn create_semaphores(device: &Arc<Device>, count: usize) -> RhiResult<Vec<Semaphore>> {
        (0..count).map(|_| Semaphore::new(device.clone())).collect()
    }

    /// Number of frame slots.
    #[inline]
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Number of present slots.
    #[inline]
    pub fn image_count(&self) -> usize {
        self.render_complete.len()
    }

    /// Waits until `slot`'s previous submission has completed.
    ///
    /// A single call blocks for at most `timeout` nanoseconds.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= frames_in_flight()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails for a reason other than timeout.
    pub fn wait_for_slot(&self, slot: usize, timeout: u64) -> RhiResult<SlotWait> {
        if self.slots[slot].work_done.wait(timeout)? {
            Ok(SlotWait::Ready)
        } else {
            Ok(SlotWait::TimedOut)
        }
    }

    /// Clears `slot`'s completion fence ahead of the next submission.
    ///
    /// Only call this after [`SyncRing::wait_for_slot`] returned
    /// [`SlotWait::Ready`] for the same slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= frames_in_flight()`.
    pub fn reset_slot(&self, slot: usize) -> RhiResult<()> {
        self.slots[slot].work_done.reset()
    }

    /// Semaphore signaled when the image acquired through `slot` is ready.
    #[inline]
    pub fn acquire_semaphore(&self, slot: usize) -> vk::Semaphore {
        self.slots[slot].image_acquired.handle()
    }

    /// Fence signaled when `slot`'s submission completes.
    #[inline]
    pub fn completion_fence(&self, slot: usize) -> vk::Fence {
        self.slots[slot].work_done.handle()
    }

    /// Semaphore gating presentation of `image_index`.
    #[inline]
    pub fn present_semaphore(&self, image_index: usize) -> vk::Semaphore {
        self.render_complete[image_index].handle()
    }

    /// Rebuilds all semaphores, resizing the present slots to `image_count`.
    ///
    /// Fences are kept. After an idle wait every one of them is signaled or
    /// unsignaled with no pending submission, and the scheduler's wait/reset
    /// ordering stays valid either way.
    ///
    /// The device must be idle: the old semaphores are destroyed
    /// unconditionally.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails. The ring keeps its
    /// previous semaphores in that case.
    pub fn recreate(&mut self, image_count: usize) -> RhiResult<()> {
        if image_count == 0 {
            return Err(RhiError::InvalidHandle(
                "sync ring needs at least one present slot".into(),
            ));
        }

        let acquired = Self::create_semaphores(&self.device, self.slots.len())?;
        let render_complete = Self::create_semaphores(&self.device, image_count)?;

        for (slot, semaphore) in self.slots.iter_mut().zip(acquired) {
            slot.image_acquired = semaphore;
        }
        self.render_complete = render_complete;

        debug!(
            "Recreated sync ring semaphores ({} frame slots, {} present slots)",
            self.slots.len(),
            image_count
        );
        Ok(())
    }
}
